//! Chunked, strictly sequential speech output.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use assetlens_core::{AudioSink, LensError, Speaker, SpeechSynthesizer};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::process::Command;
use tracing::{debug, info};

use crate::chunk::{DEFAULT_CHUNK_CHARS, split_for_speech};

/// Speaks replies through a synthesizer and a sink, one chunk at a time.
///
/// Chunk `i + 1` is not requested until playback of chunk `i` has ended.
pub struct SpeechAdapter {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    sink: Arc<dyn AudioSink>,
    voice: String,
    chunk_chars: usize,
}

impl SpeechAdapter {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, sink: Arc<dyn AudioSink>) -> Self {
        Self { synthesizer, sink, voice: "alloy".to_string(), chunk_chars: DEFAULT_CHUNK_CHARS }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn with_chunk_chars(mut self, chunk_chars: usize) -> Self {
        self.chunk_chars = chunk_chars;
        self
    }

    fn limit(&self) -> usize {
        self.chunk_chars.min(self.synthesizer.max_chars())
    }
}

#[async_trait]
impl Speaker for SpeechAdapter {
    async fn speak(&self, text: &str) -> Result<(), LensError> {
        let chunks = split_for_speech(text, self.limit());
        let total = chunks.len();
        for (index, chunk) in chunks.iter().enumerate() {
            debug!(chunk = index + 1, total, chars = chunk.chars().count(), "Synthesizing chunk");
            let audio = self.synthesizer.synthesize(chunk, &self.voice).await?;
            self.sink.play(audio).await?;
        }
        info!(chunks = total, voice = %self.voice, "Speech playback finished");
        Ok(())
    }
}

fn io_error(e: std::io::Error) -> LensError {
    LensError::Speech(e.to_string())
}

/// Writes each clip to `<dir>/reply_NNNN.mp3`.
pub struct FileSink {
    dir: PathBuf,
    counter: AtomicU64,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), counter: AtomicU64::new(0) }
    }

    async fn write(&self, audio: &Bytes) -> Result<PathBuf, LensError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(io_error)?;
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let path = self.dir.join(format!("reply_{n:04}.mp3"));
        tokio::fs::write(&path, audio).await.map_err(io_error)?;
        Ok(path)
    }
}

#[async_trait]
impl AudioSink for FileSink {
    async fn play(&self, audio: Bytes) -> Result<(), LensError> {
        let path = self.write(&audio).await?;
        debug!(path = %path.display(), bytes = audio.len(), "Audio clip written");
        Ok(())
    }
}

/// Writes each clip to disk, then runs an external player on it and waits for it to exit.
pub struct CommandSink {
    files: FileSink,
    program: String,
    args: Vec<String>,
}

impl CommandSink {
    pub fn new(dir: impl Into<PathBuf>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self { files: FileSink::new(dir), program: program.into(), args }
    }
}

#[async_trait]
impl AudioSink for CommandSink {
    async fn play(&self, audio: Bytes) -> Result<(), LensError> {
        let path = self.files.write(&audio).await?;
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(&path)
            .status()
            .await
            .map_err(|e| LensError::Speech(format!("cannot start {}: {e}", self.program)))?;
        if !status.success() {
            return Err(LensError::Speech(format!("{} exited with {status}", self.program)));
        }
        Ok(())
    }
}
