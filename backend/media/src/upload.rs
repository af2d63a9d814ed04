//! Local storage for uploaded images and documentation PDFs.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs;
use tracing::info;

use crate::mime_detect::{detect_mime_type, is_image, is_pdf, sniff_mime_type};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadKind {
    Image,
    Pdf,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredUpload {
    pub key: String,
    pub path: PathBuf,
    pub kind: UploadKind,
    pub mime_type: String,
    pub size: usize,
}

/// Replace every character outside `[A-Za-z0-9.-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

/// `{millis}_{sanitized name}`.
pub fn storage_key(name: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}", at.timestamp_millis(), sanitize_file_name(name))
}

/// Classify an upload by content, falling back to its extension.
pub fn classify(name: &str, bytes: &[u8]) -> Result<(UploadKind, &'static str)> {
    let mime = sniff_mime_type(bytes).unwrap_or_else(|| detect_mime_type(Path::new(name)));
    if is_image(mime) {
        Ok((UploadKind::Image, mime))
    } else if is_pdf(mime) {
        Ok((UploadKind::Pdf, mime))
    } else {
        bail!("Invalid file type: {name} ({mime}); upload an image or a PDF")
    }
}

/// Writes uploads under a root directory, split into `images/` and `docs/`.
pub struct LocalUploadStore {
    root: PathBuf,
}

impl LocalUploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn store(&self, name: &str, bytes: &[u8]) -> Result<StoredUpload> {
        let (kind, mime) = classify(name, bytes)?;
        let bucket = match kind {
            UploadKind::Image => "images",
            UploadKind::Pdf => "docs",
        };
        let dir = self.root.join(bucket);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create upload directory: {}", dir.display()))?;

        let key = storage_key(name, Utc::now());
        let path = dir.join(&key);
        // Never overwrite an existing upload.
        if fs::try_exists(&path).await? {
            bail!("Upload already exists: {}", path.display());
        }
        fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write upload: {}", path.display()))?;

        info!(key = %key, kind = ?kind, size = bytes.len(), "Stored upload");
        Ok(StoredUpload { key, path, kind, mime_type: mime.to_string(), size: bytes.len() })
    }
}
