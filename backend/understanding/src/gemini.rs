//! Direct Gemini backend. Does the work of the hosted endpoint in-process.
//!
//! Builds the prompt (default inspection prompt for images, analyst framing for
//! text), adds machine documentation as a system instruction, replays the
//! conversation as prior contents, and maps Gemini's 429 to a rate limit.

use std::sync::Arc;

use assetlens_core::{AnalysisBackend, AnalysisRequest, DocumentationSource, LensError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::client::{extract_reply_text, DEFAULT_RETRY_AFTER};
use crate::prompt::{documentation_context, gemini_role, text_prompt, DEFAULT_IMAGE_PROMPT};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

pub struct GeminiBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    docs: Option<Arc<dyn DocumentationSource>>,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            docs: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Result<Self, LensError> {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LensError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(self)
    }

    pub fn with_documentation(mut self, docs: Arc<dyn DocumentationSource>) -> Self {
        self.docs = Some(docs);
        self
    }

    async fn system_instruction(&self, request: &AnalysisRequest) -> Option<String> {
        let (docs, machine_id) = (self.docs.as_ref()?, request.machine_id.as_deref()?);
        match docs.lookup(machine_id).await {
            Ok(records) => documentation_context(machine_id, &records),
            Err(e) => {
                // Analysis still works without documentation.
                warn!(machine_id, error = %e, "Documentation lookup failed");
                None
            }
        }
    }
}

/// Build the `generateContent` body for a request.
pub fn build_body(request: &AnalysisRequest, system: Option<&str>) -> Result<Value, LensError> {
    let mut parts = Vec::new();
    match (&request.image, &request.prompt) {
        (Some(image), prompt) => {
            let (mime_type, data) = split_data_url(image)?;
            parts.push(json!({ "text": prompt.as_deref().unwrap_or(DEFAULT_IMAGE_PROMPT) }));
            parts.push(json!({ "inline_data": { "mime_type": mime_type, "data": data } }));
        }
        (None, Some(prompt)) => {
            let is_voice = request.is_voice_input.unwrap_or(false);
            parts.push(json!({ "text": text_prompt(prompt, is_voice) }));
        }
        (None, None) => {
            return Err(LensError::Other(anyhow::anyhow!(
                "analysis request needs an image or a prompt"
            )));
        }
    }

    let mut contents: Vec<Value> = request
        .conversation_history
        .iter()
        .flatten()
        .map(|turn| json!({ "role": gemini_role(turn.role), "parts": [{ "text": turn.text }] }))
        .collect();
    contents.push(json!({ "role": "user", "parts": parts }));

    let mut body = json!({ "contents": contents });
    if let Some(system) = system {
        body["system_instruction"] = json!({ "parts": [{ "text": system }] });
    }
    Ok(body)
}

/// `data:image/jpeg;base64,XXXX` → (`image/jpeg`, `XXXX`).
fn split_data_url(url: &str) -> Result<(&str, &str), LensError> {
    let (header, data) = url
        .split_once(',')
        .ok_or_else(|| LensError::InvalidFrame("image is not a data URL".into()))?;
    let mime = header
        .strip_prefix("data:")
        .and_then(|h| h.strip_suffix(";base64"))
        .unwrap_or("image/jpeg");
    Ok((mime, data))
}

#[async_trait]
impl AnalysisBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<String, LensError> {
        let system = self.system_instruction(request).await;
        let body = build_body(request, system.as_deref())?;
        info!(model = %self.model, has_image = request.image.is_some(), "[Vision] Sending request to Gemini");

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LensError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| LensError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(map_gemini_error(status, &text));
        }
        let json: Value = serde_json::from_str(&text)
            .map_err(|e| LensError::MalformedResponse(format!("Gemini response is not JSON: {e}")))?;
        extract_reply_text(&json)
    }
}

fn map_gemini_error(status: StatusCode, body: &str) -> LensError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let code = parsed.as_ref().and_then(|v| v["error"]["code"].as_u64());
    if status == StatusCode::TOO_MANY_REQUESTS || code == Some(429) {
        return LensError::RateLimited { retry_after: DEFAULT_RETRY_AFTER };
    }
    LensError::Upstream { status: status.as_u16(), message: format!("Gemini API error: {body}") }
}
