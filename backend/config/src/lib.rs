//! `assetlens-config`: AssetLens runtime configuration.
//!
//! Provides:
//! - Typed config schema (analysis, pipeline timings, speech, documentation)
//! - YAML read/write with backup rotation
//! - `${ENV_VAR}` substitution
//! - Config redaction for safe display
//! - Default value application
//! - Validation report

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{collect_referenced_vars, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{apply_merge_patch, config_dir, config_file_path, load_config, write_config};
pub use redact::redact;
pub use schema::{
    AnalysisConfig, AnalysisProvider, AssetLensConfig, CameraConfig, DocumentationConfig,
    LoggingConfig, PipelineConfig, SpeechConfig, SpeechProvider, UploadsConfig,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

/// Load, apply env substitution, and apply defaults to a config file.
///
/// This is the main entry point for loading a config at runtime. Validation
/// problems are logged; callers that need to refuse an invalid config run
/// [`validate`] themselves.
pub async fn load_and_prepare(path: &Path) -> Result<AssetLensConfig> {
    let raw_config = load_config(path).await?;
    prepare(raw_config)
}

/// Env substitution, defaults and validation logging for an in-memory config.
pub fn prepare(config: AssetLensConfig) -> Result<AssetLensConfig> {
    let value: Value =
        serde_json::to_value(&config).context("Failed to serialize config for processing")?;
    let value = resolve_env_vars(&value).context("Failed to resolve env vars in config")?;
    let config: AssetLensConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;

    let config = apply_all_defaults(config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn prepared_config_carries_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.yaml"),
            "pipeline:\n  debounceMs: 250\n",
        )
        .unwrap();

        let config = load_and_prepare(&dir.path().join("config.yaml")).await.unwrap();
        let pipeline = config.pipeline.unwrap();
        assert_eq!(pipeline.debounce_ms, Some(250));
        assert_eq!(pipeline.camera_cooldown_ms, Some(defaults::DEFAULT_CAMERA_COOLDOWN_MS));
        assert_eq!(config.speech.unwrap().enabled, Some(false));
    }
}
