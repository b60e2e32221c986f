//! Model Backend Traits
//!
//! Trait definitions for the streaming text-generation backend. The request
//! handler only sees this interface, so tests can substitute a scripted
//! backend and production can talk to Bedrock.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use tokio::sync::mpsc;

use crate::error::RouterError;

/// Fixed system instruction sent with every request
pub const SYSTEM_INSTRUCTION: &str = "Respond with a max of 3 paragraphs. Remove any additional characters, like * or # from the response. Keep only whitespaces and line breaks.";

/// Events delivered by a streaming invocation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendEvent {
    /// One raw chunk payload, still undecoded
    Chunk(Bytes),
    /// The backend finished cleanly
    End,
    /// The backend failed mid-stream; nothing follows
    Failed(String),
}

/// Sampling parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InferenceConfig {
    /// Maximum output tokens
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Nucleus sampling threshold
    pub top_p: f32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            temperature: 0.7,
            top_p: 0.9,
        }
    }
}

/// A single streaming generation request
#[derive(Clone, Debug, PartialEq)]
pub struct InvocationRequest {
    /// Backend model identifier
    pub model_id: String,
    /// System instruction
    pub system: String,
    /// The single user message
    pub prompt: String,
    /// Sampling parameters
    pub inference: InferenceConfig,
}

impl InvocationRequest {
    /// Create a request with the fixed system instruction and sampling
    pub fn new(model_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            system: SYSTEM_INSTRUCTION.to_string(),
            prompt: prompt.into(),
            inference: InferenceConfig::default(),
        }
    }

    /// Request body in the messages-v1 schema
    #[must_use]
    pub fn to_body(&self) -> serde_json::Value {
        json!({
            "schemaVersion": "messages-v1",
            "system": [{ "text": self.system }],
            "messages": [{ "role": "user", "content": [{ "text": self.prompt }] }],
            "inferenceConfig": {
                "maxTokens": self.inference.max_tokens,
                "temperature": self.inference.temperature,
                "topP": self.inference.top_p,
            },
        })
    }
}

/// Streaming model backend
///
/// Implement this trait to add support for a different provider.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Get the backend name (e.g., "Bedrock")
    fn name(&self) -> &str;

    /// Open a streaming invocation
    ///
    /// Returns a channel receiver that yields chunk payloads in emission
    /// order, followed by exactly one `End` or `Failed`. Dropping the
    /// receiver cancels the invocation.
    ///
    /// # Errors
    ///
    /// Returns `RouterError::BackendOpenFailure` if the invocation could not
    /// be started.
    async fn invoke_streaming(
        &self,
        request: &InvocationRequest,
    ) -> Result<mpsc::Receiver<BackendEvent>, RouterError>;
}
