//! Streaming Protocol
//!
//! Outward event types and the per-chunk transcoder that feeds them.
//!
//! ```text
//! backend chunk ──► transcode() ──► Option<StreamEvent> ──► sink ──► client
//! ```

mod events;
mod transcoder;

pub use events::{StreamEvent, DONE_MARKER, FRAME_SEPARATOR};
pub use transcoder::transcode;
