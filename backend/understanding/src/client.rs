//! Client for the hosted `analyze-asset` endpoint.

use std::time::Duration;

use assetlens_core::{AnalysisBackend, AnalysisRequest, LensError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Posts [`AnalysisRequest`] bodies to an analysis endpoint.
pub struct EndpointBackend {
    client: Client,
    url: String,
    bearer: Option<String>,
    default_retry_after: Duration,
}

impl EndpointBackend {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            bearer: None,
            default_retry_after: DEFAULT_RETRY_AFTER,
        }
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// Applies a whole-request timeout. Without one a hung request stays in flight.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, LensError> {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LensError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(self)
    }

    pub fn with_default_retry_after(mut self, after: Duration) -> Self {
        self.default_retry_after = after;
        self
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: Option<String>,
    retry_after: Option<f64>,
}

#[async_trait]
impl AnalysisBackend for EndpointBackend {
    fn name(&self) -> &str {
        "endpoint"
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<String, LensError> {
        debug!(
            url = %self.url,
            has_image = request.image.is_some(),
            history = request.conversation_history.as_ref().map_or(0, Vec::len),
            "Sending analysis request"
        );

        let mut builder = self.client.post(&self.url).json(request);
        if let Some(token) = &self.bearer {
            builder = builder.bearer_auth(token);
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| LensError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| LensError::Transport(e.to_string()))?;
        interpret_response(status, &body, self.default_retry_after)
    }
}

/// Map an endpoint response to reply text or a typed error.
pub fn interpret_response(
    status: StatusCode,
    body: &str,
    default_retry_after: Duration,
) -> Result<String, LensError> {
    if status.is_success() {
        let json: Value = serde_json::from_str(body)
            .map_err(|e| LensError::MalformedResponse(format!("response is not JSON: {e}")))?;
        return extract_reply_text(&json);
    }

    let error_body: Option<ErrorBody> = serde_json::from_str(body).ok();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = error_body
            .as_ref()
            .and_then(|b| b.retry_after)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or(default_retry_after);
        warn!(retry_after_secs = retry_after.as_secs(), "Analysis endpoint rate limited");
        return Err(LensError::RateLimited { retry_after });
    }

    let message = error_body
        .and_then(|b| b.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| "Analysis failed".to_string());
    Err(LensError::Upstream { status: status.as_u16(), message })
}

/// `candidates[0].content.parts[0].text`
pub fn extract_reply_text(json: &Value) -> Result<String, LensError> {
    json["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| LensError::MalformedResponse("Invalid response format from API".into()))
}
