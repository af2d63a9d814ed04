//! Scripted test doubles for the analysis backend and speaker.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assetlens_core::{AnalysisBackend, AnalysisRequest, LensError, Speaker};
use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

pub const WELL_FORMED_REPLY: &str = "1) Centrifugal pump P-101\n2) No hazards\n3) Good condition\n4) No concerns";

/// Returns queued outcomes in order, then `fallback` forever.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<String, LensError>>>,
    fallback: String,
    calls: Mutex<Vec<(Instant, AnalysisRequest)>>,
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: WELL_FORMED_REPLY.to_string(),
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn then(self, outcome: Result<String, LensError>) -> Self {
        self.script.lock().unwrap().push_back(outcome);
        self
    }

    /// Each call signals `entered`, then waits for `release`.
    pub fn gated(mut self, entered: Arc<Notify>, release: Arc<Notify>) -> Self {
        self.gate = Some((entered, release));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    pub fn requests(&self) -> Vec<AnalysisRequest> {
        self.calls.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
    }
}

#[async_trait]
impl AnalysisBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<String, LensError> {
        self.calls.lock().unwrap().push((Instant::now(), request.clone()));
        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// Records what it was asked to say and when playback ran; optionally fails every time.
#[derive(Default)]
pub struct RecordingSpeaker {
    pub spoken: Mutex<Vec<String>>,
    /// Start and end of each playback.
    pub spans: Mutex<Vec<(Instant, Instant)>>,
    pub playback: Duration,
    pub fail: bool,
}

#[async_trait]
impl Speaker for RecordingSpeaker {
    async fn speak(&self, text: &str) -> Result<(), LensError> {
        self.spoken.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(LensError::Speech("synthesis returned 401".into()));
        }
        let start = Instant::now();
        tokio::time::sleep(self.playback).await;
        self.spans.lock().unwrap().push((start, Instant::now()));
        Ok(())
    }
}
