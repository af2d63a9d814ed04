use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LensError;

/// Where a frame came from. Camera frames are throttled, uploads are not.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FrameOrigin {
    Camera,
    Upload,
}

impl fmt::Display for FrameOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameOrigin::Camera => write!(f, "camera"),
            FrameOrigin::Upload => write!(f, "upload"),
        }
    }
}

/// An in-memory RGBA pixel buffer.
///
/// Frames are ephemeral: the pipeline encodes them once into a JPEG payload
/// and a fingerprint, then drops them.
#[derive(Debug, Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    pub origin: FrameOrigin,
}

impl Frame {
    /// Build a frame, checking that the buffer holds exactly `width * height` RGBA pixels.
    pub fn new(width: u32, height: u32, rgba: Vec<u8>, origin: FrameOrigin) -> Result<Self, LensError> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 {
            return Err(LensError::InvalidFrame(format!(
                "frame has zero dimension ({width}x{height})"
            )));
        }
        if rgba.len() != expected {
            return Err(LensError::InvalidFrame(format!(
                "expected {expected} bytes for {width}x{height} RGBA, got {}",
                rgba.len()
            )));
        }
        Ok(Self { width, height, rgba, origin })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    pub fn into_rgba(self) -> Vec<u8> {
        self.rgba
    }
}

/// Content-derived key for an encoded frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageFingerprint(String);

impl ImageFingerprint {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short prefix is enough to correlate log lines.
        let short = self.0.get(..12).unwrap_or(&self.0);
        write!(f, "{short}")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One message in the session's dialogue. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub is_voice_origin: bool,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>, is_voice_origin: bool) -> Self {
        Self::new(Role::User, text, is_voice_origin)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text, false)
    }

    fn new(role: Role, text: impl Into<String>, is_voice_origin: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            timestamp: Utc::now(),
            is_voice_origin,
        }
    }
}

/// Finding categories, in the order the model is asked to answer them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Identification,
    Safety,
    Condition,
    Environmental,
}

impl Category {
    pub const ORDERED: [Category; 4] = [
        Category::Identification,
        Category::Safety,
        Category::Condition,
        Category::Environmental,
    ];

    /// Category for the 1-based section marker `n)`.
    pub fn from_marker(n: usize) -> Option<Self> {
        n.checked_sub(1).and_then(|i| Self::ORDERED.get(i).copied())
    }

    /// Text used when the reply has no section for this category.
    pub fn fallback_text(&self) -> &'static str {
        match self {
            Category::Identification => "Unable to identify the asset",
            Category::Safety => "Unable to assess safety",
            Category::Condition => "Unable to evaluate condition",
            Category::Environmental => "Unable to assess environmental impact",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Identification => "identification",
            Category::Safety => "safety",
            Category::Condition => "condition",
            Category::Environmental => "environmental",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// One categorized, severity-tagged section of a model reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Finding {
    pub category: Category,
    pub text: String,
    pub severity: Severity,
}

impl Finding {
    pub fn fallback(category: Category) -> Self {
        Self {
            category,
            text: category.fallback_text().to_string(),
            severity: Severity::Info,
        }
    }
}

/// Body sent to the analysis endpoint. Absent fields are omitted on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// `data:image/jpeg;base64,...`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_history: Option<Vec<ConversationTurn>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_voice_input: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<String>,
}

/// A documentation record attached to a machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentRecord {
    pub title: String,
    pub content: String,
    pub document_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_short_buffer() {
        let err = Frame::new(2, 2, vec![0; 15], FrameOrigin::Camera).unwrap_err();
        assert!(matches!(err, LensError::InvalidFrame(_)));
    }

    #[test]
    fn frame_accepts_exact_buffer() {
        let frame = Frame::new(2, 1, vec![255; 8], FrameOrigin::Upload).unwrap();
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.rgba().len(), 8);
    }

    #[test]
    fn category_markers_are_one_based() {
        assert_eq!(Category::from_marker(1), Some(Category::Identification));
        assert_eq!(Category::from_marker(4), Some(Category::Environmental));
        assert_eq!(Category::from_marker(0), None);
        assert_eq!(Category::from_marker(5), None);
    }

    #[test]
    fn request_omits_absent_fields() {
        let req = AnalysisRequest {
            prompt: Some("what is this".into()),
            is_voice_input: Some(true),
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["prompt"], "what is this");
        assert_eq!(json["isVoiceInput"], true);
        assert!(json.get("image").is_none());
        assert!(json.get("machineId").is_none());
    }

    #[test]
    fn turn_serializes_camel_case() {
        let turn = ConversationTurn::user("hello", true);
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["isVoiceOrigin"], true);
    }
}
