/// Speech synthesizers: the hosted speech endpoint, OpenAI TTS and ElevenLabs.
use std::sync::Arc;

use assetlens_core::{LensError, SpeechSynthesizer};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

const OPENAI_INPUT_LIMIT: usize = 4096;

fn transport(e: reqwest::Error) -> LensError {
    LensError::Transport(e.to_string())
}

/// First `max` characters of `text`, never splitting a code point.
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((at, _)) => &text[..at],
        None => text,
    }
}

// ---------------------------------------------------------------------------
// Hosted speech endpoint
// ---------------------------------------------------------------------------

/// `POST {text, voice}` → `{audioContent}` (base64 audio) or `{error}`.
pub struct RemoteSpeech {
    url: String,
    bearer: Option<String>,
    client: Client,
}

impl RemoteSpeech {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), bearer: None, client: Client::new() }
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }
}

#[derive(Serialize)]
struct RemoteSpeechBody<'a> {
    text: &'a str,
    voice: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteSpeechReply {
    audio_content: Option<String>,
    error: Option<String>,
}

/// Turn the endpoint's JSON reply into audio bytes.
pub(crate) fn decode_audio_content(status: StatusCode, body: &str) -> Result<Bytes, LensError> {
    let reply: RemoteSpeechReply = serde_json::from_str(body)
        .map_err(|e| LensError::Speech(format!("unreadable speech reply: {e}")))?;
    if !status.is_success() {
        let message = reply.error.unwrap_or_else(|| "Failed to generate speech".into());
        return Err(LensError::Speech(message));
    }
    let encoded = reply
        .audio_content
        .ok_or_else(|| LensError::Speech("speech reply has no audioContent".into()))?;
    let audio = STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| LensError::Speech(format!("audioContent is not base64: {e}")))?;
    Ok(Bytes::from(audio))
}

#[async_trait]
impl SpeechSynthesizer for RemoteSpeech {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Bytes, LensError> {
        info!("[TTS/Remote] Synthesizing {} chars with voice={}", text.chars().count(), voice);
        let mut request = self.client.post(&self.url).json(&RemoteSpeechBody { text, voice });
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        decode_audio_content(status, &body)
    }
}

// ---------------------------------------------------------------------------
// OpenAI TTS
// ---------------------------------------------------------------------------

pub struct OpenAiTts {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl OpenAiTts {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: "tts-1".to_string(),
            base_url: "https://api.openai.com".to_string(),
            client: Client::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
struct OpenAiTtsBody<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'static str,
}

fn openai_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| "Failed to generate speech".to_string())
}

#[async_trait]
impl SpeechSynthesizer for OpenAiTts {
    fn max_chars(&self) -> usize {
        OPENAI_INPUT_LIMIT
    }

    async fn synthesize(&self, text: &str, voice: &str) -> Result<Bytes, LensError> {
        let body = OpenAiTtsBody {
            model: &self.model,
            input: truncate_chars(text, OPENAI_INPUT_LIMIT),
            voice: if voice.is_empty() { "alloy" } else { voice },
            response_format: "mp3",
        };
        info!("[TTS/OpenAI] Synthesizing with model={}", body.model);
        let response = self
            .client
            .post(format!("{}/v1/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LensError::Speech(openai_error_message(&body)));
        }
        response.bytes().await.map_err(transport)
    }
}

// ---------------------------------------------------------------------------
// ElevenLabs TTS
// ---------------------------------------------------------------------------

/// Speaks with a fixed ElevenLabs voice id; the per-call voice name is ignored.
pub struct ElevenLabsTts {
    api_key: String,
    voice_id: String,
    client: Client,
}

impl ElevenLabsTts {
    pub fn new(api_key: String, voice_id: Option<String>) -> Self {
        Self {
            api_key,
            voice_id: voice_id.unwrap_or_else(|| "EXAVITQu4vr4xnSDxMaL".to_string()), // Sarah
            client: Client::new(),
        }
    }
}

#[derive(Serialize)]
struct ElevenLabsBody<'a> {
    text: &'a str,
    model_id: &'static str,
    voice_settings: ElevenLabsVoiceSettings,
}

#[derive(Serialize)]
struct ElevenLabsVoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsTts {
    async fn synthesize(&self, text: &str, _voice: &str) -> Result<Bytes, LensError> {
        let url = format!("https://api.elevenlabs.io/v1/text-to-speech/{}", self.voice_id);
        let body = ElevenLabsBody {
            text,
            model_id: "eleven_multilingual_v2",
            voice_settings: ElevenLabsVoiceSettings { stability: 0.5, similarity_boost: 0.75 },
        };
        info!("[TTS/ElevenLabs] Synthesizing voice_id={}", self.voice_id);
        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            let detail = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| v["detail"]["message"].as_str().map(str::to_string))
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(LensError::Speech(format!("Failed to generate speech: {detail}")));
        }
        response.bytes().await.map_err(transport)
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

pub enum TtsProviderKind {
    Remote { url: String, bearer: Option<String> },
    OpenAi { api_key: String },
    ElevenLabs { api_key: String, voice_id: Option<String> },
}

pub fn create_tts(kind: TtsProviderKind) -> Arc<dyn SpeechSynthesizer> {
    match kind {
        TtsProviderKind::Remote { url, bearer } => {
            let remote = RemoteSpeech::new(url);
            Arc::new(match bearer {
                Some(token) => remote.with_bearer(token),
                None => remote,
            })
        }
        TtsProviderKind::OpenAi { api_key } => Arc::new(OpenAiTts::new(api_key)),
        TtsProviderKind::ElevenLabs { api_key, voice_id } => {
            Arc::new(ElevenLabsTts::new(api_key, voice_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_audio_content() {
        let body = format!(r#"{{"audioContent":"{}"}}"#, STANDARD.encode(b"ID3fake"));
        let audio = decode_audio_content(StatusCode::OK, &body).unwrap();
        assert_eq!(&audio[..], b"ID3fake");
    }

    #[test]
    fn error_body_becomes_speech_error() {
        let err = decode_audio_content(StatusCode::BAD_REQUEST, r#"{"error":"Text is required"}"#)
            .unwrap_err();
        assert!(matches!(err, LensError::Speech(ref m) if m == "Text is required"));
    }

    #[test]
    fn missing_audio_is_an_error() {
        assert!(decode_audio_content(StatusCode::OK, "{}").is_err());
        assert!(decode_audio_content(StatusCode::OK, "not json").is_err());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        let long = "x".repeat(5000);
        assert_eq!(truncate_chars(&long, OPENAI_INPUT_LIMIT).len(), 4096);
    }

    #[test]
    fn openai_error_falls_back() {
        assert_eq!(openai_error_message(r#"{"error":{"message":"bad key"}}"#), "bad key");
        assert_eq!(openai_error_message("<html>"), "Failed to generate speech");
    }

    #[test]
    fn provider_limits() {
        assert_eq!(OpenAiTts::new("k".into()).max_chars(), 4096);
        assert_eq!(ElevenLabsTts::new("k".into(), None).max_chars(), 4096);
    }
}
