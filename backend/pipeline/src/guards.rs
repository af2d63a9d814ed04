//! Admission guards for frame submissions.
//!
//! Each guard is a named predicate that either lets a frame through or names
//! the reason it was skipped. They run in a fixed order; the first one that
//! trips wins. Skips are silent no-ops, not errors.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use assetlens_core::{FrameOrigin, ImageFingerprint};
use serde::Serialize;
use tokio::time::Instant;

use crate::debounce::Debouncer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    InFlight,
    CooldownActive { remaining_ms: u64 },
    AlreadyAnalyzed,
    Debounced,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InFlight => write!(f, "analysis already in flight"),
            SkipReason::CooldownActive { remaining_ms } => {
                write!(f, "camera cooldown active ({remaining_ms} ms left)")
            }
            SkipReason::AlreadyAnalyzed => write!(f, "frame already analyzed"),
            SkipReason::Debounced => write!(f, "superseded by a newer frame"),
        }
    }
}

/// Everything the guards look at.
pub struct GuardContext<'a> {
    pub in_flight: bool,
    pub origin: FrameOrigin,
    pub now: Instant,
    pub last_camera_at: Option<Instant>,
    pub cooldown: Duration,
    pub analyzed: &'a HashSet<ImageFingerprint>,
    /// `None` until the frame has been encoded.
    pub fingerprint: Option<&'a ImageFingerprint>,
}

pub type Guard = fn(&GuardContext<'_>) -> Option<SkipReason>;

/// Guards checked at submission time, in order. `debounced` runs after the window.
pub const ADMISSION_GUARDS: [(&str, Guard); 3] = [
    ("in_flight", in_flight),
    ("cooldown_active", cooldown_active),
    ("already_analyzed", already_analyzed),
];

/// Run the admission guards in order.
pub fn admit(ctx: &GuardContext<'_>) -> Result<(), SkipReason> {
    for (name, guard) in ADMISSION_GUARDS {
        if let Some(reason) = guard(ctx) {
            tracing::debug!(guard = name, %reason, origin = %ctx.origin, "Frame skipped");
            return Err(reason);
        }
    }
    Ok(())
}

pub fn in_flight(ctx: &GuardContext<'_>) -> Option<SkipReason> {
    ctx.in_flight.then_some(SkipReason::InFlight)
}

/// Uploads are never throttled.
pub fn cooldown_active(ctx: &GuardContext<'_>) -> Option<SkipReason> {
    if ctx.origin != FrameOrigin::Camera {
        return None;
    }
    let elapsed = ctx.now.saturating_duration_since(ctx.last_camera_at?);
    (elapsed < ctx.cooldown).then(|| SkipReason::CooldownActive {
        remaining_ms: (ctx.cooldown - elapsed).as_millis() as u64,
    })
}

pub fn already_analyzed(ctx: &GuardContext<'_>) -> Option<SkipReason> {
    let fingerprint = ctx.fingerprint?;
    ctx.analyzed.contains(fingerprint).then_some(SkipReason::AlreadyAnalyzed)
}

/// Trips for every ticket except the newest.
pub fn debounced(debouncer: &Debouncer, ticket: u64) -> Option<SkipReason> {
    (!debouncer.is_latest(ticket)).then_some(SkipReason::Debounced)
}
