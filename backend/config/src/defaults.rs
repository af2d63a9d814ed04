//! Config defaults: applies sensible default values to parsed config.

use crate::schema::{
    AnalysisConfig, AnalysisProvider, AssetLensConfig, CameraConfig, LoggingConfig,
    PipelineConfig, SpeechConfig, SpeechProvider, UploadsConfig,
};

/// Minimum spacing between camera-triggered analyses.
pub const DEFAULT_CAMERA_COOLDOWN_MS: u64 = 5000;

pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;

/// Retry delay when a 429 has no `retryAfter`.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Turns of conversation history sent with each request.
pub const DEFAULT_HISTORY_WINDOW: usize = 5;

pub const DEFAULT_JPEG_QUALITY: u8 = 92;

pub const DEFAULT_VOICE: &str = "alloy";

pub const DEFAULT_CHUNK_CHARS: usize = 4000;

pub const DEFAULT_CAMERA_INTERVAL_MS: u64 = 1000;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: AssetLensConfig) -> AssetLensConfig {
    let config = apply_analysis_defaults(config);
    let config = apply_pipeline_defaults(config);
    let config = apply_speech_defaults(config);
    let config = apply_camera_defaults(config);
    let config = apply_upload_defaults(config);
    apply_logging_defaults(config)
}

fn apply_analysis_defaults(mut config: AssetLensConfig) -> AssetLensConfig {
    let analysis = config.analysis.get_or_insert_with(AnalysisConfig::default);
    let provider = *analysis.provider.get_or_insert(AnalysisProvider::Endpoint);
    analysis.default_retry_after_secs.get_or_insert(DEFAULT_RETRY_AFTER_SECS);
    if provider == AnalysisProvider::Gemini {
        analysis.model.get_or_insert_with(|| DEFAULT_GEMINI_MODEL.to_string());
    }
    config
}

fn apply_pipeline_defaults(mut config: AssetLensConfig) -> AssetLensConfig {
    let pipeline = config.pipeline.get_or_insert_with(PipelineConfig::default);
    pipeline.camera_cooldown_ms.get_or_insert(DEFAULT_CAMERA_COOLDOWN_MS);
    pipeline.debounce_ms.get_or_insert(DEFAULT_DEBOUNCE_MS);
    pipeline.history_window.get_or_insert(DEFAULT_HISTORY_WINDOW);
    pipeline.jpeg_quality.get_or_insert(DEFAULT_JPEG_QUALITY);
    config
}

/// Speech stays off unless configured; the voice and chunk size are filled either way.
fn apply_speech_defaults(mut config: AssetLensConfig) -> AssetLensConfig {
    let speech = config.speech.get_or_insert_with(SpeechConfig::default);
    speech.enabled.get_or_insert(false);
    speech.provider.get_or_insert(SpeechProvider::Remote);
    speech.voice.get_or_insert_with(|| DEFAULT_VOICE.to_string());
    speech.chunk_chars.get_or_insert(DEFAULT_CHUNK_CHARS);
    if speech.output_dir.is_none() {
        speech.output_dir = Some(state_subdir("speech"));
    }
    config
}

fn apply_camera_defaults(mut config: AssetLensConfig) -> AssetLensConfig {
    let camera = config.camera.get_or_insert_with(CameraConfig::default);
    camera.interval_ms.get_or_insert(DEFAULT_CAMERA_INTERVAL_MS);
    config
}

fn apply_upload_defaults(mut config: AssetLensConfig) -> AssetLensConfig {
    let uploads = config.uploads.get_or_insert_with(UploadsConfig::default);
    if uploads.dir.is_none() {
        uploads.dir = Some(state_subdir("uploads"));
    }
    config
}

fn apply_logging_defaults(mut config: AssetLensConfig) -> AssetLensConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    logging.level.get_or_insert_with(|| "info".to_string());
    config
}

fn state_subdir(name: &str) -> String {
    crate::io::config_dir().join(name).to_string_lossy().into_owned()
}
