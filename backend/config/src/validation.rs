//! Config validation: schema checks with user-friendly error messages.

use crate::schema::{AnalysisProvider, AssetLensConfig, SpeechProvider};
use thiserror::Error;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// All errors and warnings found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError { path: path.into(), message: message.into() });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError { path: path.into(), message: message.into() });
    }
}

/// Validate a config that has been through the defaults pass.
pub fn validate(config: &AssetLensConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_analysis(config, &mut report);
    validate_pipeline(config, &mut report);
    validate_speech(config, &mut report);
    validate_documentation(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

fn validate_analysis(config: &AssetLensConfig, report: &mut ValidationReport) {
    let Some(analysis) = &config.analysis else { return };
    match analysis.provider.unwrap_or_default() {
        AnalysisProvider::Endpoint => match analysis.endpoint_url.as_deref() {
            None | Some("") => report.error("analysis.endpointUrl", "Endpoint provider needs an endpointUrl"),
            Some(url) if !is_http_url(url) => {
                report.error("analysis.endpointUrl", format!("Not an http(s) URL: {url}"))
            }
            Some(_) => {}
        },
        AnalysisProvider::Gemini => {
            if analysis.gemini_api_key.as_deref().unwrap_or("").is_empty() {
                report.error("analysis.geminiApiKey", "Gemini provider needs an API key");
            }
        }
    }
    if analysis.timeout_secs == Some(0) {
        report.error("analysis.timeoutSecs", "Timeout must be at least 1 second; omit it for no timeout");
    }
    if analysis.default_retry_after_secs == Some(0) {
        report.warn("analysis.defaultRetryAfterSecs", "Zero retry delay replays rate-limited requests immediately");
    }
}

fn validate_pipeline(config: &AssetLensConfig, report: &mut ValidationReport) {
    let Some(pipeline) = &config.pipeline else { return };
    if pipeline.history_window == Some(0) {
        report.warn("pipeline.historyWindow", "No conversation history will be sent");
    }
    if let Some(quality) = pipeline.jpeg_quality {
        if !(1..=100).contains(&quality) {
            report.error("pipeline.jpegQuality", "JPEG quality must be between 1 and 100");
        }
    }
    if let (Some(debounce), Some(cooldown)) = (pipeline.debounce_ms, pipeline.camera_cooldown_ms) {
        if debounce > cooldown {
            report.warn("pipeline.debounceMs", "Debounce window is longer than the camera cooldown");
        }
    }
}

fn validate_speech(config: &AssetLensConfig, report: &mut ValidationReport) {
    let Some(speech) = &config.speech else { return };
    if speech.chunk_chars == Some(0) {
        report.error("speech.chunkChars", "Chunk size must be positive");
    }
    if speech.enabled != Some(true) {
        return;
    }
    match speech.provider.unwrap_or_default() {
        SpeechProvider::Remote => {
            if speech.endpoint_url.as_deref().map_or(true, |u| !is_http_url(u)) {
                report.error("speech.endpointUrl", "Remote speech needs an http(s) endpointUrl");
            }
        }
        SpeechProvider::OpenAi | SpeechProvider::ElevenLabs => {
            if speech.api_key.as_deref().unwrap_or("").is_empty() {
                report.error("speech.apiKey", "Speech provider needs an API key");
            }
        }
    }
    if speech.player.is_none() {
        report.warn("speech.player", "No player configured; clips are written to disk only");
    }
}

fn validate_documentation(config: &AssetLensConfig, report: &mut ValidationReport) {
    let Some(docs) = &config.documentation else { return };
    if let Some(url) = docs.base_url.as_deref() {
        if !is_http_url(url) {
            report.error("documentation.baseUrl", format!("Not an http(s) URL: {url}"));
        }
        if docs.api_key.is_none() {
            report.warn("documentation.apiKey", "Documentation lookups will be unauthenticated");
        }
    }
}

fn validate_logging(config: &AssetLensConfig, report: &mut ValidationReport) {
    let Some(level) = config.logging.as_ref().and_then(|l| l.level.as_deref()) else { return };
    if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        report.error("logging.level", format!("Unknown log level '{level}'"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::apply_all_defaults;
    use crate::schema::{AnalysisConfig, PipelineConfig, SpeechConfig};

    fn endpoint_config() -> AssetLensConfig {
        let mut config = AssetLensConfig::default();
        config.analysis = Some(AnalysisConfig {
            endpoint_url: Some("https://example.test/functions/v1/analyze-image".into()),
            ..Default::default()
        });
        apply_all_defaults(config)
    }

    #[test]
    fn defaults_with_endpoint_are_valid() {
        let report = validate(&endpoint_config());
        assert!(report.is_valid(), "{:?}", report.errors);
    }

    #[test]
    fn missing_endpoint_is_an_error() {
        let report = validate(&apply_all_defaults(AssetLensConfig::default()));
        assert!(report.errors.iter().any(|e| e.path == "analysis.endpointUrl"));
    }

    #[test]
    fn gemini_requires_key() {
        let mut config = AssetLensConfig::default();
        config.analysis = Some(AnalysisConfig { provider: Some(AnalysisProvider::Gemini), ..Default::default() });
        let report = validate(&apply_all_defaults(config));
        assert!(report.errors.iter().any(|e| e.path == "analysis.geminiApiKey"));
    }

    #[test]
    fn bad_quality_and_level() {
        let mut config = endpoint_config();
        config.pipeline = Some(PipelineConfig { jpeg_quality: Some(0), ..Default::default() });
        config.logging.as_mut().unwrap().level = Some("loud".into());
        let report = validate(&config);
        let paths: Vec<_> = report.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["pipeline.jpegQuality", "logging.level"]);
    }

    #[test]
    fn enabled_speech_needs_credentials() {
        let mut config = endpoint_config();
        config.speech = Some(SpeechConfig {
            enabled: Some(true),
            provider: Some(SpeechProvider::OpenAi),
            ..Default::default()
        });
        let report = validate(&config);
        assert!(report.errors.iter().any(|e| e.path == "speech.apiKey"));
        assert!(report.warnings.iter().any(|e| e.path == "speech.player"));
    }
}
