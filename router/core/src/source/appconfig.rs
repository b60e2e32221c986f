//! AppConfig Agent Sidecar Source
//!
//! Reads the deployed configuration document from the AppConfig agent's local
//! HTTP endpoint:
//! `GET /applications/{application}/environments/{environment}/configurations/{configuration}`

use async_trait::async_trait;
use bytes::Bytes;

use super::PolicySource;
use crate::config::ConfigSourceSettings;
use crate::error::RouterError;

/// Policy source backed by the local AppConfig agent
#[derive(Clone, Debug)]
pub struct AppConfigSidecar {
    /// Fully resolved document URL
    url: String,
    /// HTTP client
    http_client: reqwest::Client,
}

impl AppConfigSidecar {
    /// Create a source for the configured triple
    ///
    /// # Errors
    ///
    /// Returns `RouterError::ConfigUnavailable` if the HTTP client cannot be
    /// constructed.
    pub fn new(settings: &ConfigSourceSettings) -> Result<Self, RouterError> {
        let http_client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| RouterError::ConfigUnavailable(format!("HTTP client: {e}")))?;

        Ok(Self {
            url: settings.document_url(),
            http_client,
        })
    }

    /// The document URL this source reads
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PolicySource for AppConfigSidecar {
    fn describe(&self) -> String {
        format!("AppConfig sidecar at {}", self.url)
    }

    async fn fetch(&self) -> Result<Bytes, RouterError> {
        let response = self
            .http_client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| RouterError::ConfigUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RouterError::ConfigUnavailable(format!(
                "sidecar returned {status}: {body}"
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| RouterError::ConfigUnavailable(e.to_string()))
    }
}
