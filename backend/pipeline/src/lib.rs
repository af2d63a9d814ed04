//! The image-analysis pipeline.
//!
//! Frames and text prompts enter through [`AnalysisPipeline`]; frames pass the
//! guard chain (in-flight, cooldown, dedupe, debounce) before a remote call is
//! made. Replies are parsed into findings and appended to the conversation log.

pub mod conversation;
pub mod debounce;
pub mod guards;
#[cfg(test)]
mod mock;
pub mod pipeline;
pub mod retry;

pub use conversation::ConversationLog;
pub use guards::SkipReason;
pub use pipeline::{Admission, AnalysisPipeline, PipelineBuilder, PipelineSettings};
pub use retry::{RetryPhase, RetrySlot};
