pub mod error;
pub mod event;
pub mod traits;
pub mod types;

pub use error::LensError;
pub use event::Notification;
pub use traits::{AnalysisBackend, AudioSink, DocumentationSource, Speaker, SpeechSynthesizer};
pub use types::{
    AnalysisRequest, Category, ConversationTurn, DocumentRecord, Finding, Frame, FrameOrigin,
    ImageFingerprint, Role, Severity,
};
