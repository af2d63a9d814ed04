use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use assetlens_config::{apply_merge_patch, config_dir, config_file_path, load_config, prepare, AssetLensConfig};
use serde_json::{json, Map, Value};

/// Environment variables that override the config file, and where they land.
const ENV_OVERRIDES: &[(&str, &str, &str)] = &[
    ("ASSETLENS_PROVIDER", "analysis", "provider"),
    ("ASSETLENS_ENDPOINT_URL", "analysis", "endpointUrl"),
    ("ASSETLENS_BEARER_TOKEN", "analysis", "bearerToken"),
    ("ASSETLENS_GEMINI_API_KEY", "analysis", "geminiApiKey"),
    ("ASSETLENS_MODEL", "analysis", "model"),
    ("ASSETLENS_SPEECH_PROVIDER", "speech", "provider"),
    ("ASSETLENS_SPEECH_URL", "speech", "endpointUrl"),
    ("ASSETLENS_SPEECH_API_KEY", "speech", "apiKey"),
    ("ASSETLENS_VOICE", "speech", "voice"),
    ("ASSETLENS_PLAYER", "speech", "player"),
    ("ASSETLENS_DOCS_URL", "documentation", "baseUrl"),
    ("ASSETLENS_DOCS_API_KEY", "documentation", "apiKey"),
    ("ASSETLENS_UPLOAD_DIR", "uploads", "dir"),
    ("ASSETLENS_LOG_LEVEL", "logging", "level"),
    ("ASSETLENS_LOG_DIR", "logging", "dir"),
];

/// Config file location: `--config` if given, else the default directory.
pub fn resolve_path(flag: Option<&Path>) -> PathBuf {
    match flag {
        Some(path) => path.to_path_buf(),
        None => config_file_path(&config_dir()),
    }
}

/// Merge patch built from the `ASSETLENS_*` variables present in `env`.
pub fn env_patch(env: &HashMap<String, String>) -> Value {
    let mut root = Map::new();
    for (var, section, key) in ENV_OVERRIDES {
        let Some(value) = env.get(*var).filter(|v| !v.is_empty()) else { continue };
        let section = root.entry(section.to_string()).or_insert_with(|| json!({}));
        if let Value::Object(map) = section {
            map.insert(key.to_string(), Value::String(value.clone()));
        }
    }
    Value::Object(root)
}

/// Load the file, overlay the environment, then substitute, default and validate.
pub async fn load(path: &Path) -> Result<AssetLensConfig> {
    let file = load_config(path).await?;
    let env: HashMap<String, String> = std::env::vars().collect();
    let merged = apply_merge_patch(&file, &env_patch(&env)).context("Invalid ASSETLENS_* override")?;
    prepare(merged)
}
