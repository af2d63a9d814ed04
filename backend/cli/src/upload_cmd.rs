//! `assetlens upload <FILE>`: store an image or PDF, analyzing images right away.

use std::path::Path;

use anyhow::{Context, Result};
use assetlens_media::{LocalUploadStore, UploadKind};
use assetlens_pipeline::AnalysisPipeline;

use crate::analyze_cmd;
use crate::render::note_success;

pub async fn run(pipeline: &AnalysisPipeline, store: &LocalUploadStore, file: &Path) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read upload: {}", file.display()))?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    let stored = store.store(&name, &bytes).await?;
    note_success(&format!("Stored {} as {} ({} bytes)", name, stored.path.display(), stored.size));

    if stored.kind == UploadKind::Image {
        analyze_cmd::analyze_bytes(pipeline, &bytes).await?;
    }
    Ok(())
}
