//! Router Core - Use-Case Model Routing and Response Streaming
//!
//! This crate serves text-generation requests: it picks a backend model from
//! an externally managed selection policy, announces the choice, and streams
//! the generated text back to the caller as it arrives.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  body   ┌───────────────────────────────────────────────┐
//! │    Client    │ ──────► │                RequestHandler                 │
//! └──────────────┘         │  ┌─────────────┐        ┌──────────────────┐  │
//!        ▲                 │  │ ConfigCache │ ─────► │  select_model()  │  │
//!        │                 │  └──────┬──────┘        └────────┬─────────┘  │
//!        │                 │         │ PolicySource           │ model id   │
//!        │                 │  ┌──────┴──────┐        ┌────────┴─────────┐  │
//!        │                 │  │  AppConfig  │        │   ModelBackend   │  │
//!        │                 │  │   sidecar   │        │    (Bedrock)     │  │
//!        │                 │  └─────────────┘        └────────┬─────────┘  │
//!        │                 │                                  │ chunks     │
//!        │  StreamEvent    │                         ┌────────┴─────────┐  │
//!        └──────────────── │ ◄────────────────────── │   transcode()    │  │
//!                          │                         └──────────────────┘  │
//!                          └───────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`RequestHandler`]: Drives one request through selection and streaming
//! - [`ConfigCache`]: Read-through cache of the last good [`SelectionPolicy`]
//! - [`StreamEvent`]: One outward frame
//! - [`RouterError`]: Every way a request can fail
//!
//! # Quick Start
//!
//! ```ignore
//! use router_core::{
//!     backend::BedrockBackend, config::load_settings, source::AppConfigSidecar,
//!     ConfigCache, RequestHandler,
//! };
//! use tokio::sync::mpsc;
//!
//! let settings = load_settings()?;
//! let cache = ConfigCache::new(AppConfigSidecar::new(&settings.config_source)?);
//! let handler = RequestHandler::new(cache, BedrockBackend::from_settings(&settings.backend)?);
//!
//! let (tx, mut rx) = mpsc::channel(16);
//! tokio::spawn(async move { handler.handle(br#"{"prompt":"Hi"}"#, tx).await });
//! while let Some(event) = rx.recv().await {
//!     print!("{}", String::from_utf8_lossy(&event.to_frame()));
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod backend;
pub mod config;
pub mod error;
pub mod handler;
pub mod routing;
pub mod source;
pub mod streaming;

pub use error::{RouterError, RouterResult};
pub use handler::{HandleOutcome, RequestHandler, RequestInput};
pub use routing::{select_model, ConfigCache, SelectionPolicy};
pub use streaming::StreamEvent;
