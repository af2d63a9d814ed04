use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

use crate::error::LensError;
use crate::types::{AnalysisRequest, DocumentRecord};

/// Remote vision-language analysis.
///
/// Implementations return the reply text (`candidates[0].content.parts[0].text`)
/// and map HTTP 429 to [`LensError::RateLimited`] so the pipeline can schedule a retry.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Backend name for logs (e.g., "endpoint", "gemini").
    fn name(&self) -> &str;

    async fn analyze(&self, request: &AnalysisRequest) -> Result<String, LensError>;
}

/// Remote text-to-speech synthesis. Returns encoded audio bytes for one chunk.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Largest input the provider accepts per call, in characters.
    fn max_chars(&self) -> usize {
        4096
    }

    async fn synthesize(&self, text: &str, voice: &str) -> Result<Bytes, LensError>;
}

/// Plays one synthesized clip.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Resolves when playback of `audio` has ended.
    async fn play(&self, audio: Bytes) -> Result<(), LensError>;
}

/// Documentation attached to a machine, used to enrich analysis prompts.
#[async_trait]
pub trait DocumentationSource: Send + Sync {
    async fn lookup(&self, machine_id: &str) -> Result<Vec<DocumentRecord>>;
}

/// Speaks a reply aloud. Resolves once playback of the whole text has ended.
#[async_trait]
pub trait Speaker: Send + Sync {
    async fn speak(&self, text: &str) -> Result<(), LensError>;
}
