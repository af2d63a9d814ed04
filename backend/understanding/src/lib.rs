pub mod client;
pub mod docs;
pub mod gemini;
pub mod parser;
pub mod prompt;

pub use client::{EndpointBackend, DEFAULT_RETRY_AFTER};
pub use docs::{InMemoryDocs, RestDocs};
pub use gemini::GeminiBackend;
pub use parser::{parse_findings, parse_reply, Anomaly, ParsedReply};
pub use prompt::FRAME_PROMPT;
