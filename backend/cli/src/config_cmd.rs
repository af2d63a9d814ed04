//! `assetlens config show|check|init`

use std::path::Path;

use anyhow::{bail, Result};
use assetlens_config::{collect_referenced_vars, load_config, redact, validate, write_config, AssetLensConfig};

use crate::render::{note_error, note_success, note_warn};

/// Print the effective config with secrets masked.
pub fn show(config: &AssetLensConfig) -> Result<()> {
    let value = serde_json::to_value(config)?;
    println!("{}", serde_json::to_string_pretty(&redact(&value))?);
    Ok(())
}

/// Validate the effective config; fails when there are errors.
pub async fn check(path: &Path, config: &AssetLensConfig) -> Result<()> {
    let raw = serde_json::to_value(load_config(path).await?)?;
    for var in collect_referenced_vars(&raw) {
        println!("  uses ${{{var}}}");
    }
    let report = validate(config);
    for warning in &report.warnings {
        note_warn(&format!("{}: {}", warning.path, warning.message));
    }
    for error in &report.errors {
        note_error(&format!("{}: {}", error.path, error.message));
    }
    if !report.is_valid() {
        bail!("{} config error(s) in {}", report.errors.len(), path.display());
    }
    note_success(&format!("{} is valid", path.display()));
    Ok(())
}

/// Write a starter config file, refusing to overwrite one that exists.
pub async fn init(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    let mut starter = AssetLensConfig::default();
    starter.analysis = Some(assetlens_config::AnalysisConfig {
        endpoint_url: Some("${ASSETLENS_ENDPOINT_URL}".to_string()),
        ..Default::default()
    });
    write_config(&starter, path).await?;
    note_success(&format!("Wrote {}", path.display()));
    Ok(())
}
