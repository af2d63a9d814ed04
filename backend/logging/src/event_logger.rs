//! Session Event Logger
//!
//! Conversation turns and request outcomes, emitted as structured records
//! under the `session_events` target so they land in the NDJSON file.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_sensitive_data;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    TurnAppended {
        role: String,
        content: String,
        is_voice: bool,
    },
    RequestIssued {
        has_image: bool,
        history_len: usize,
    },
    AnalysisCompleted {
        findings: usize,
    },
    RetryScheduled {
        after_secs: u64,
    },
    RequestFailed {
        error: String,
    },
}

impl SessionEvent {
    pub fn user_turn(content: &str, is_voice: bool) -> Self {
        SessionEvent::TurnAppended { role: "user".into(), content: content.into(), is_voice }
    }

    pub fn assistant_turn(content: &str) -> Self {
        SessionEvent::TurnAppended { role: "assistant".into(), content: content.into(), is_voice: false }
    }

    fn redacted(mut self) -> Self {
        match &mut self {
            SessionEvent::TurnAppended { content, .. } => *content = redact_sensitive_data(content),
            SessionEvent::RequestFailed { error } => *error = redact_sensitive_data(error),
            _ => {}
        }
        self
    }
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: SessionEvent,
}

impl EventLogEntry {
    pub fn new(session_id: &str, event: SessionEvent) -> Self {
        Self { session_id: session_id.into(), timestamp: Utc::now(), event: event.redacted() }
    }
}

pub struct EventLogger;

impl EventLogger {
    /// Redact and emit one session event.
    pub fn log_event(session_id: &str, event: SessionEvent) {
        let entry = EventLogEntry::new(session_id, event);
        let json = serde_json::to_string(&entry).unwrap_or_default();
        info!(target: "session_events", event = %json, "Session event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_content_is_redacted() {
        let entry = EventLogEntry::new("s1", SessionEvent::user_turn("use Bearer abc.def.ghi please", false));
        match entry.event {
            SessionEvent::TurnAppended { content, role, .. } => {
                assert_eq!(role, "user");
                assert!(!content.contains("abc.def.ghi"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn serializes_with_type_tag() {
        let entry = EventLogEntry::new("s1", SessionEvent::RetryScheduled { after_secs: 2 });
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["event"]["type"], "retry_scheduled");
        assert_eq!(json["event"]["after_secs"], 2);
        assert_eq!(json["session_id"], "s1");
    }
}
