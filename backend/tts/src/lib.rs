pub mod adapter;
pub mod chunk;
pub mod engine;

pub use adapter::{CommandSink, FileSink, SpeechAdapter};
pub use chunk::{split_for_speech, DEFAULT_CHUNK_CHARS};
pub use engine::{create_tts, ElevenLabsTts, OpenAiTts, RemoteSpeech, TtsProviderKind};
