//! Request Handler
//!
//! Drives one generation request from raw body to final outward event.
//!
//! # State Machine
//!
//! ```text
//! Start ──► ConfigFetched ──► ModelSelected ──► Announced ──► Streaming ──► Terminated
//!   │             │                                  │            │
//!   └─────────────┴──────────────► Errored ◄─────────┴────────────┘
//! ```
//!
//! On success the client sees the announcement, the content chunks in backend
//! order, then one terminator. On failure it sees exactly one error notice
//! and nothing after it. Chunks already written stay delivered. Nothing is
//! retried.
//!
//! The sink is owned by the invocation and dropped when `handle` returns,
//! which closes the outward transport on every path.

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::backend::{BackendEvent, InvocationRequest, ModelBackend};
use crate::error::RouterError;
use crate::routing::{select_model, ConfigCache, DEFAULT_USE_CASE};
use crate::source::PolicySource;
use crate::streaming::{transcode, StreamEvent};

/// The parsed request body
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestInput {
    /// User prompt, forwarded as-is (may be empty)
    pub prompt: String,
    /// Use-case label for model selection
    pub use_case: String,
}

impl Default for RequestInput {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            use_case: DEFAULT_USE_CASE.to_string(),
        }
    }
}

impl RequestInput {
    /// Parse a request body permissively
    ///
    /// A body that is not a JSON object, or fields that are absent or not
    /// strings, fall back to an empty prompt and the default use case. An
    /// empty use case also falls back.
    #[must_use]
    pub fn from_body(body: &[u8]) -> Self {
        let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(body) else {
            return Self::default();
        };

        let prompt = fields
            .get("prompt")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let use_case = fields
            .get("use_case")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_USE_CASE)
            .to_string();

        Self { prompt, use_case }
    }
}

/// How a request ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandleOutcome {
    /// The terminator was written
    Completed {
        /// The model that answered
        model_id: String,
    },
    /// An error notice was written
    Failed(RouterError),
    /// The client went away before the request finished
    ClientGone,
}

/// Serves generation requests against a policy cache and a backend
pub struct RequestHandler<S, B> {
    cache: ConfigCache<S>,
    backend: B,
}

impl<S: PolicySource, B: ModelBackend> RequestHandler<S, B> {
    /// Create a handler
    pub fn new(cache: ConfigCache<S>, backend: B) -> Self {
        Self { cache, backend }
    }

    /// Get the policy cache
    pub fn cache(&self) -> &ConfigCache<S> {
        &self.cache
    }

    /// Get the backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Handle one request, writing its events to `sink`
    ///
    /// Each event is awaited into the channel before the next backend chunk
    /// is read. A closed sink cancels the backend invocation.
    pub async fn handle(&self, body: &[u8], sink: mpsc::Sender<StreamEvent>) -> HandleOutcome {
        let request_id = Uuid::new_v4();
        let span = info_span!("generate", %request_id);
        let outcome = self.run(body, &sink).instrument(span.clone()).await;

        span.in_scope(|| match &outcome {
            HandleOutcome::Completed { model_id } => {
                info!(model = %model_id, "Request completed");
            }
            HandleOutcome::Failed(err) => {
                warn!(kind = err.kind(), detail = err.detail(), "Request failed");
            }
            HandleOutcome::ClientGone => debug!("Client disconnected"),
        });

        outcome
    }

    async fn run(&self, body: &[u8], sink: &mpsc::Sender<StreamEvent>) -> HandleOutcome {
        let input = RequestInput::from_body(body);
        debug!(use_case = %input.use_case, prompt_len = input.prompt.len(), "Request parsed");

        let policy = match self.cache.get().await {
            Ok(policy) => policy,
            Err(err) => return fail(sink, err).await,
        };

        let model_id = select_model(&policy, &input.use_case).to_string();
        debug!(model = %model_id, use_case = %input.use_case, "Model selected");

        if sink.send(StreamEvent::announce(&model_id)).await.is_err() {
            return HandleOutcome::ClientGone;
        }

        let request = InvocationRequest::new(model_id.clone(), input.prompt);
        let mut rx = match self.backend.invoke_streaming(&request).await {
            Ok(rx) => rx,
            Err(err) => return fail(sink, err).await,
        };

        loop {
            let event = tokio::select! {
                () = sink.closed() => return HandleOutcome::ClientGone,
                event = rx.recv() => event,
            };

            match event {
                Some(BackendEvent::Chunk(payload)) => match transcode(&payload) {
                    Ok(Some(event)) => {
                        if sink.send(event).await.is_err() {
                            return HandleOutcome::ClientGone;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => return fail(sink, err).await,
                },
                Some(BackendEvent::End) => break,
                Some(BackendEvent::Failed(detail)) => {
                    return fail(sink, RouterError::BackendStreamFailure(detail)).await;
                }
                None => {
                    return fail(
                        sink,
                        RouterError::BackendStreamFailure(format!(
                            "{} stream closed before completion",
                            self.backend.name()
                        )),
                    )
                    .await;
                }
            }
        }

        if sink.send(StreamEvent::Terminator).await.is_err() {
            return HandleOutcome::ClientGone;
        }

        HandleOutcome::Completed { model_id }
    }
}

/// Write the single error notice for `err`
async fn fail(sink: &mpsc::Sender<StreamEvent>, err: RouterError) -> HandleOutcome {
    if sink.send(StreamEvent::from(&err)).await.is_err() {
        return HandleOutcome::ClientGone;
    }
    HandleOutcome::Failed(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_body() {
        let input =
            RequestInput::from_body(br#"{"prompt":"What is an APR?","use_case":"cost_optimized"}"#);

        assert_eq!(input.prompt, "What is an APR?");
        assert_eq!(input.use_case, "cost_optimized");
    }

    #[test]
    fn test_missing_use_case_defaults() {
        let input = RequestInput::from_body(br#"{"prompt":"hi"}"#);
        assert_eq!(input.use_case, DEFAULT_USE_CASE);
    }

    #[test]
    fn test_empty_use_case_defaults() {
        let input = RequestInput::from_body(br#"{"prompt":"hi","use_case":""}"#);
        assert_eq!(input.use_case, DEFAULT_USE_CASE);
    }

    #[test]
    fn test_malformed_body_defaults() {
        assert_eq!(RequestInput::from_body(b"not json"), RequestInput::default());
        assert_eq!(RequestInput::from_body(b""), RequestInput::default());
        assert_eq!(RequestInput::from_body(b"[1,2]"), RequestInput::default());
    }

    #[test]
    fn test_non_string_fields_default() {
        let input = RequestInput::from_body(br#"{"prompt":42,"use_case":["x"]}"#);
        assert_eq!(input, RequestInput::default());
    }

    #[test]
    fn test_empty_prompt_kept() {
        let input = RequestInput::from_body(br#"{"prompt":"","use_case":"balanced"}"#);
        assert_eq!(input.prompt, "");
        assert_eq!(input.use_case, "balanced");
    }
}
