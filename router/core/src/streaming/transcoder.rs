//! Stream Transcoder
//!
//! Turns one backend chunk into at most one outward [`StreamEvent`].
//!
//! Backend chunks are JSON documents in the messages-v1 streaming schema:
//!
//! ```text
//! {"messageStart": {"role": "assistant"}}                  -> dropped
//! {"contentBlockDelta": {"delta": {"text": "Hel"}, ...}}   -> ContentChunk("Hel")
//! {"contentBlockStop": {"contentBlockIndex": 0}}           -> dropped
//! {"messageStop": {"stopReason": "end_turn"}}              -> dropped
//! {"metadata": {"usage": {...}}}                           -> dropped
//! ```
//!
//! Anything that is not a JSON object is a decode error. There is no skipping
//! past a bad chunk.

use serde_json::Value;

use super::events::StreamEvent;
use crate::error::RouterError;

/// Transcode a single backend chunk payload
///
/// # Errors
///
/// Returns `RouterError::ChunkDecodeError` if the payload is not UTF-8 JSON
/// or not a JSON object.
pub fn transcode(payload: &[u8]) -> Result<Option<StreamEvent>, RouterError> {
    let value: Value = serde_json::from_slice(payload)
        .map_err(|e| RouterError::ChunkDecodeError(e.to_string()))?;

    let Value::Object(event) = value else {
        return Err(RouterError::ChunkDecodeError(
            "chunk payload is not a JSON object".to_string(),
        ));
    };

    let text = event
        .get("contentBlockDelta")
        .and_then(|block| block.get("delta"))
        .and_then(|delta| delta.get("text"))
        .and_then(Value::as_str);

    Ok(text.map(StreamEvent::chunk))
}
