//! Model Backend Integration
//!
//! Abstracted access to the streaming text-generation service through a
//! common trait interface.
//!
//! # Available Backends
//!
//! - **Bedrock**: Bedrock runtime over HTTP with event-stream responses
//!
//! # Usage
//!
//! ```ignore
//! use router_core::backend::{BedrockBackend, InvocationRequest, ModelBackend};
//!
//! let backend = BedrockBackend::from_settings(&settings.backend)?;
//! let request = InvocationRequest::new("eu.amazon.nova-lite-v1:0", "Hello!");
//! let mut rx = backend.invoke_streaming(&request).await?;
//! ```

mod bedrock;
pub mod eventstream;
mod traits;

pub use bedrock::BedrockBackend;
pub use traits::{
    BackendEvent, InferenceConfig, InvocationRequest, ModelBackend, SYSTEM_INSTRUCTION,
};
