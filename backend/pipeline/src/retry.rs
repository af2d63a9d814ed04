//! Single-slot retry timer.
//!
//! `Idle → Scheduled → Firing → Idle`. Scheduling while `Scheduled` (or while
//! `Firing`, when the replay itself is rate limited) aborts the pending timer
//! and replaces it, so at most one retry is ever outstanding.

use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum RetryPhase {
    Idle,
    Scheduled { delay_ms: u64 },
    Firing,
}

/// Holds at most one pending retry and the payload it will replay.
#[derive(Debug)]
pub struct RetrySlot<T> {
    phase: RetryPhase,
    generation: u64,
    payload: Option<T>,
    handle: Option<JoinHandle<()>>,
}

impl<T> Default for RetrySlot<T> {
    fn default() -> Self {
        Self { phase: RetryPhase::Idle, generation: 0, payload: None, handle: None }
    }
}

impl<T> RetrySlot<T> {
    pub fn phase(&self) -> RetryPhase {
        self.phase
    }

    /// Schedule `payload` for replay after `delay`, cancelling any earlier retry.
    ///
    /// `spawn` receives the generation the timer task must present to [`RetrySlot::fire`].
    pub fn schedule<F>(&mut self, delay: Duration, payload: T, spawn: F) -> u64
    where
        F: FnOnce(u64) -> JoinHandle<()>,
    {
        if let Some(previous) = self.handle.take() {
            debug!(generation = self.generation, "Replacing scheduled retry");
            previous.abort();
        }
        self.generation += 1;
        self.payload = Some(payload);
        self.phase = RetryPhase::Scheduled { delay_ms: delay.as_millis() as u64 };
        self.handle = Some(spawn(self.generation));
        self.generation
    }

    /// Called by the timer task once its delay has elapsed.
    ///
    /// Returns the payload only for the current generation; a replaced timer
    /// that slipped past its abort gets `None`.
    pub fn fire(&mut self, generation: u64) -> Option<T> {
        if generation != self.generation || !matches!(self.phase, RetryPhase::Scheduled { .. }) {
            return None;
        }
        self.phase = RetryPhase::Firing;
        // The running task is the one firing; dropping the handle detaches it.
        self.handle = None;
        self.payload.take()
    }

    /// The replayed request reached a terminal outcome.
    pub fn finish(&mut self) {
        if self.phase == RetryPhase::Firing {
            self.phase = RetryPhase::Idle;
        }
    }

    /// Abort any pending timer and drop its payload.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.generation += 1;
        self.payload = None;
        self.phase = RetryPhase::Idle;
    }
}

impl<T> Drop for RetrySlot<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
