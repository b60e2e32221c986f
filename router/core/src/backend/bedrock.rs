//! Bedrock Runtime Backend
//!
//! Streaming invocation against the Bedrock runtime HTTP API.
//!
//! # Bedrock API
//!
//! - `POST /model/{modelId}/invoke-with-response-stream` - streaming generation
//!
//! The response body is an event stream. Each `chunk` event carries
//! `{"bytes": "<base64>"}`; the decoded bytes are one messages-v1 chunk
//! document and are forwarded untouched. Exception frames end the stream.
//! Authentication uses a Bedrock API key as a bearer token.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use bytes::Bytes;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::eventstream::{EventMessage, EventStreamDecoder};
use super::traits::{BackendEvent, InvocationRequest, ModelBackend};
use crate::config::BackendSettings;
use crate::error::RouterError;

/// Events buffered between the HTTP reader task and the handler
const CHANNEL_CAPACITY: usize = 32;

/// Bedrock runtime client
#[derive(Clone)]
pub struct BedrockBackend {
    /// Endpoint base URL
    endpoint: String,
    /// Bearer API key
    api_key: Option<String>,
    /// HTTP client
    http_client: reqwest::Client,
}

#[derive(Deserialize)]
struct ChunkEnvelope {
    bytes: String,
}

#[derive(Deserialize)]
struct ExceptionBody {
    #[serde(default, alias = "Message")]
    message: String,
}

impl BedrockBackend {
    /// Create a backend for `endpoint`
    ///
    /// # Errors
    ///
    /// Returns `RouterError::BackendOpenFailure` if the HTTP client cannot be
    /// constructed.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        connect_timeout: Duration,
    ) -> Result<Self, RouterError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| RouterError::BackendOpenFailure(format!("HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into(),
            api_key,
            http_client,
        })
    }

    /// Create from `BackendSettings`
    ///
    /// # Errors
    ///
    /// Returns `RouterError::BackendOpenFailure` if the HTTP client cannot be
    /// constructed.
    pub fn from_settings(settings: &BackendSettings) -> Result<Self, RouterError> {
        Self::new(
            settings.endpoint_url(),
            settings.api_key.clone(),
            settings.connect_timeout,
        )
    }

    /// Get the streaming invocation URL for a model
    fn stream_url(&self, model_id: &str) -> String {
        format!(
            "{}/model/{}/invoke-with-response-stream",
            self.endpoint,
            urlencoding::encode(model_id)
        )
    }
}

/// Interpret one event-stream frame
///
/// `Ok(Some)` is a chunk payload, `Ok(None)` an ignorable frame, `Err` a
/// terminal failure detail.
fn interpret(message: &EventMessage) -> Result<Option<Bytes>, String> {
    match message.header(":message-type") {
        Some("event") => {
            if message.header(":event-type") != Some("chunk") {
                return Ok(None);
            }
            let envelope: ChunkEnvelope = serde_json::from_slice(&message.payload)
                .map_err(|e| format!("invalid chunk envelope: {e}"))?;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(envelope.bytes.as_bytes())
                .map_err(|e| format!("invalid chunk encoding: {e}"))?;
            Ok(Some(Bytes::from(bytes)))
        }
        Some("exception") => {
            let kind = message.header(":exception-type").unwrap_or("exception");
            let detail = serde_json::from_slice::<ExceptionBody>(&message.payload)
                .map(|body| body.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&message.payload).into_owned());
            Err(format!("{kind}: {detail}"))
        }
        Some("error") => {
            let code = message.header(":error-code").unwrap_or("error");
            let detail = message.header(":error-message").unwrap_or_default();
            Err(format!("{code}: {detail}"))
        }
        other => Err(format!("unexpected message type {other:?}")),
    }
}

#[async_trait]
impl ModelBackend for BedrockBackend {
    fn name(&self) -> &str {
        "Bedrock"
    }

    async fn invoke_streaming(
        &self,
        request: &InvocationRequest,
    ) -> Result<mpsc::Receiver<BackendEvent>, RouterError> {
        let url = self.stream_url(&request.model_id);

        let mut builder = self
            .http_client
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.amazon.eventstream")
            .json(&request.to_body());
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RouterError::BackendOpenFailure(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RouterError::BackendOpenFailure(format!(
                "Bedrock returned {status}: {body}"
            )));
        }

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let mut stream = response.bytes_stream();
        let model_id = request.model_id.clone();

        tokio::spawn(async move {
            let mut decoder = EventStreamDecoder::new();

            loop {
                let next = tokio::select! {
                    () = tx.closed() => {
                        debug!(model = %model_id, "Receiver dropped, abandoning invocation");
                        return;
                    }
                    next = stream.next() => next,
                };

                let bytes = match next {
                    Some(Ok(bytes)) => bytes,
                    Some(Err(e)) => {
                        let _ = tx.send(BackendEvent::Failed(e.to_string())).await;
                        return;
                    }
                    None => break,
                };

                decoder.push(&bytes);
                loop {
                    let message = match decoder.decode() {
                        Ok(Some(message)) => message,
                        Ok(None) => break,
                        Err(e) => {
                            warn!(model = %model_id, error = %e, "Event stream corrupted");
                            let _ = tx.send(BackendEvent::Failed(e.to_string())).await;
                            return;
                        }
                    };

                    match interpret(&message) {
                        Ok(Some(chunk)) => {
                            if tx.send(BackendEvent::Chunk(chunk)).await.is_err() {
                                return;
                            }
                        }
                        Ok(None) => {}
                        Err(detail) => {
                            let _ = tx.send(BackendEvent::Failed(detail)).await;
                            return;
                        }
                    }
                }
            }

            let event = if decoder.available() == 0 {
                BackendEvent::End
            } else {
                BackendEvent::Failed(format!(
                    "stream ended inside a frame ({} bytes pending)",
                    decoder.available()
                ))
            };
            let _ = tx.send(event).await;
        });

        Ok(rx)
    }
}
