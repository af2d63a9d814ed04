//! Builds a pipeline session from configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use assetlens_config::{AnalysisProvider, AssetLensConfig, SpeechProvider};
use assetlens_core::{AnalysisBackend, AudioSink, DocumentationSource, Speaker};
use assetlens_pipeline::{AnalysisPipeline, PipelineSettings};
use assetlens_tts::{create_tts, CommandSink, FileSink, SpeechAdapter, TtsProviderKind};
use assetlens_understanding::{EndpointBackend, GeminiBackend, RestDocs};
use tracing::info;

pub fn pipeline_settings(config: &AssetLensConfig) -> PipelineSettings {
    let mut settings = PipelineSettings::default();
    if let Some(p) = &config.pipeline {
        if let Some(ms) = p.camera_cooldown_ms {
            settings.camera_cooldown = Duration::from_millis(ms);
        }
        if let Some(ms) = p.debounce_ms {
            settings.debounce_window = Duration::from_millis(ms);
        }
        if let Some(n) = p.history_window {
            settings.history_window = n;
        }
        if let Some(q) = p.jpeg_quality {
            settings.jpeg_quality = q;
        }
    }
    settings
}

fn documentation(config: &AssetLensConfig) -> Option<Arc<dyn DocumentationSource>> {
    let docs = config.documentation.as_ref()?;
    let base_url = docs.base_url.as_deref()?;
    Some(Arc::new(RestDocs::new(base_url, docs.api_key.clone().unwrap_or_default())))
}

pub fn backend(config: &AssetLensConfig) -> Result<Arc<dyn AnalysisBackend>> {
    let analysis = config.analysis.clone().unwrap_or_default();
    let timeout = analysis.timeout_secs.map(Duration::from_secs);

    match analysis.provider.unwrap_or_default() {
        AnalysisProvider::Endpoint => {
            let Some(url) = analysis.endpoint_url.filter(|u| !u.is_empty()) else {
                bail!("No analysis endpoint configured (analysis.endpointUrl or ASSETLENS_ENDPOINT_URL)");
            };
            let mut backend = EndpointBackend::new(url);
            if let Some(token) = analysis.bearer_token {
                backend = backend.with_bearer(token);
            }
            if let Some(secs) = analysis.default_retry_after_secs {
                backend = backend.with_default_retry_after(Duration::from_secs(secs));
            }
            if let Some(timeout) = timeout {
                backend = backend.with_timeout(timeout)?;
            }
            Ok(Arc::new(backend))
        }
        AnalysisProvider::Gemini => {
            let key = analysis
                .gemini_api_key
                .filter(|k| !k.is_empty())
                .context("Gemini provider selected but analysis.geminiApiKey is not set")?;
            let mut backend = GeminiBackend::new(key);
            if let Some(model) = analysis.model {
                backend = backend.with_model(model);
            }
            if let Some(docs) = documentation(config) {
                backend = backend.with_documentation(docs);
            }
            if let Some(timeout) = timeout {
                backend = backend.with_timeout(timeout)?;
            }
            Ok(Arc::new(backend))
        }
    }
}

/// `None` when speech is disabled.
pub fn speaker(config: &AssetLensConfig) -> Result<Option<Arc<dyn Speaker>>> {
    let Some(speech) = config.speech.clone().filter(|s| s.enabled == Some(true)) else {
        return Ok(None);
    };
    let kind = match speech.provider.unwrap_or_default() {
        SpeechProvider::Remote => TtsProviderKind::Remote {
            url: speech.endpoint_url.context("speech.endpointUrl is not set")?,
            bearer: speech.api_key,
        },
        SpeechProvider::OpenAi => TtsProviderKind::OpenAi {
            api_key: speech.api_key.context("speech.apiKey is not set")?,
        },
        SpeechProvider::ElevenLabs => TtsProviderKind::ElevenLabs {
            api_key: speech.api_key.context("speech.apiKey is not set")?,
            voice_id: speech.voice_id,
        },
    };
    let output_dir = speech.output_dir.unwrap_or_else(|| "speech".to_string());
    let sink: Arc<dyn AudioSink> = match speech.player {
        Some(player) => Arc::new(CommandSink::new(output_dir, player, speech.player_args)),
        None => Arc::new(FileSink::new(output_dir)),
    };
    let mut adapter = SpeechAdapter::new(create_tts(kind), sink);
    if let Some(voice) = speech.voice {
        adapter = adapter.with_voice(voice);
    }
    if let Some(chars) = speech.chunk_chars {
        adapter = adapter.with_chunk_chars(chars);
    }
    Ok(Some(Arc::new(adapter)))
}

pub fn build(config: &AssetLensConfig, machine_id: Option<String>) -> Result<AnalysisPipeline> {
    let backend = backend(config)?;
    let mut builder = AnalysisPipeline::builder(backend).settings(pipeline_settings(config));
    if let Some(speaker) = speaker(config)? {
        builder = builder.speaker(speaker);
    }
    if let Some(id) = machine_id {
        builder = builder.machine_id(id);
    }
    let pipeline = builder.build();
    info!(session_id = %pipeline.session_id(), "Session ready");
    Ok(pipeline)
}
