//! Policy Sources
//!
//! Where the raw policy document comes from. The production source is the
//! AppConfig agent sidecar running next to the process: it polls the
//! authoritative store on its own schedule and serves the latest deployed
//! document over a loopback HTTP endpoint. This layer only performs point
//! reads against it.
//!
//! # Usage
//!
//! ```ignore
//! use router_core::source::{AppConfigSidecar, PolicySource};
//!
//! let source = AppConfigSidecar::new(&settings.config_source)?;
//! let bytes = source.fetch().await?;
//! ```

mod appconfig;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::RouterError;

pub use appconfig::AppConfigSidecar;

/// A read-only source of policy documents
#[async_trait]
pub trait PolicySource: Send + Sync {
    /// Human-readable description of where documents are read from
    fn describe(&self) -> String;

    /// Read the current raw policy document
    ///
    /// # Errors
    ///
    /// Returns `RouterError::ConfigUnavailable` when the source cannot be
    /// reached or refuses the read.
    async fn fetch(&self) -> Result<Bytes, RouterError>;
}
