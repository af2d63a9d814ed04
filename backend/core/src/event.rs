use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Finding;

/// User-facing notifications emitted by a pipeline session.
///
/// Every successful analysis and every terminal failure produces exactly one
/// of `AnalysisComplete`, `AnalysisFailed`, `ReplyReceived` or `RequestFailed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// An image analysis request was issued.
    Analyzing,
    AnalysisComplete { findings: Vec<Finding> },
    /// The endpoint rate-limited us; the same request is replayed after `after`.
    RetryScheduled {
        #[serde(with = "secs")]
        after: Duration,
    },
    AnalysisFailed { message: String },
    ReplyReceived { text: String },
    RequestFailed { message: String },
    SpeechFailed { message: String },
}

impl Notification {
    /// Whether this notification ends an analysis or text request.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Notification::AnalysisComplete { .. }
                | Notification::AnalysisFailed { .. }
                | Notification::ReplyReceived { .. }
                | Notification::RequestFailed { .. }
        )
    }

    pub fn title(&self) -> &'static str {
        match self {
            Notification::Analyzing => "Processing",
            Notification::AnalysisComplete { .. } => "Analysis Complete",
            Notification::RetryScheduled { .. } => "Rate Limit Exceeded",
            Notification::AnalysisFailed { .. } => "Analysis Failed",
            Notification::ReplyReceived { .. } => "Response Received",
            Notification::RequestFailed { .. } => "Request Failed",
            Notification::SpeechFailed { .. } => "Speech Failed",
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Analyzing => write!(f, "{}: Analyzing the image...", self.title()),
            Notification::AnalysisComplete { findings } => {
                write!(f, "{}: {} findings available", self.title(), findings.len())
            }
            Notification::RetryScheduled { after } => write!(
                f,
                "{}: Analysis will automatically retry in {} seconds...",
                self.title(),
                after.as_secs()
            ),
            Notification::ReplyReceived { .. } => {
                write!(f, "{}: New information available", self.title())
            }
            Notification::AnalysisFailed { message }
            | Notification::RequestFailed { message }
            | Notification::SpeechFailed { message } => write!(f, "{}: {}", self.title(), message),
        }
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
