//! Structured logging for AssetLens.
//!
//! Console plus rolling NDJSON file output, secret/data-URL redaction, and
//! per-session event records.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{EventLogEntry, EventLogger, SessionEvent};
pub use logger::{init_logger, LogTarget};
pub use redact::redact_sensitive_data;
