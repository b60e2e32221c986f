//! Outward Stream Events
//!
//! The units written to the client. Each event becomes one frame: a single
//! line followed by a blank line.
//!
//! ```text
//! {"model_used":"<model id>"}
//! {"chunk":"<text fragment>"}
//! [DONE]
//! {"error":{"kind":"<kind>","detail":"<message>"}}
//! ```

use bytes::Bytes;
use serde_json::json;

use crate::error::RouterError;

/// Literal frame body that marks successful completion
pub const DONE_MARKER: &str = "[DONE]";

/// Separator written after every frame
pub const FRAME_SEPARATOR: &str = "\n\n";

/// One outward event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// Which model will answer. Always first when selection succeeded.
    ModelAnnouncement {
        /// Backend model identifier
        model_id: String,
    },
    /// A fragment of generated text, in backend order
    ContentChunk {
        /// The fragment
        text: String,
    },
    /// Clean end of generation. Always last on success.
    Terminator,
    /// The request failed; nothing follows
    ErrorNotice {
        /// Stable error kind label
        kind: String,
        /// Human-readable detail
        detail: String,
    },
}

impl StreamEvent {
    /// Create a model announcement
    pub fn announce(model_id: impl Into<String>) -> Self {
        Self::ModelAnnouncement {
            model_id: model_id.into(),
        }
    }

    /// Create a content chunk
    pub fn chunk(text: impl Into<String>) -> Self {
        Self::ContentChunk { text: text.into() }
    }

    /// Whether no further events may follow this one
    #[must_use]
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Terminator | Self::ErrorNotice { .. })
    }

    /// Encode the frame body (without separator)
    #[must_use]
    pub fn to_line(&self) -> String {
        match self {
            Self::ModelAnnouncement { model_id } => json!({ "model_used": model_id }).to_string(),
            Self::ContentChunk { text } => json!({ "chunk": text }).to_string(),
            Self::Terminator => DONE_MARKER.to_string(),
            Self::ErrorNotice { kind, detail } => {
                json!({ "error": { "kind": kind, "detail": detail } }).to_string()
            }
        }
    }

    /// Encode the complete frame, ready for the transport
    #[must_use]
    pub fn to_frame(&self) -> Bytes {
        let mut frame = self.to_line();
        frame.push_str(FRAME_SEPARATOR);
        Bytes::from(frame)
    }
}

impl From<&RouterError> for StreamEvent {
    fn from(err: &RouterError) -> Self {
        Self::ErrorNotice {
            kind: err.kind().to_string(),
            detail: err.detail().to_string(),
        }
    }
}
