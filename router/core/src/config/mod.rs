//! TOML Configuration File Support
//!
//! Startup settings for the router: where the policy sidecar lives and which
//! (application, environment, configuration) triple to read, how to reach the
//! model backend, and where the HTTP surface binds. These are fixed for the
//! life of the process; the selection policy itself is read per request and
//! is not part of this file.
//!
//! # Configuration Priority
//!
//! Values are loaded with the following priority (highest first):
//! 1. CLI arguments (see [`SettingsOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [config_source]
//! application = "AIAssistantApp"
//! environment = "Production"
//! configuration = "ModelSelectionStrategy"
//! sidecar_host = "localhost"
//! sidecar_port = 2772
//!
//! [backend]
//! region = "eu-central-1"
//!
//! [server]
//! bind_address = "0.0.0.0:8080"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading settings
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[config_source]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigSourceToml {
    pub application: Option<String>,
    pub environment: Option<String>,
    pub configuration: Option<String>,
    pub sidecar_host: Option<String>,
    pub sidecar_port: Option<u16>,
    /// Sidecar read timeout in milliseconds
    pub timeout_ms: Option<u64>,
}

/// `[backend]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    pub region: Option<String>,
    /// Full endpoint URL, overrides the regional default
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub connect_timeout_ms: Option<u64>,
}

/// `[server]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerToml {
    pub bind_address: Option<String>,
    /// Outward events buffered per request before backpressure applies
    pub channel_capacity: Option<usize>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterToml {
    pub config_source: ConfigSourceToml,
    pub backend: BackendToml,
    pub server: ServerToml,
}

// =============================================================================
// Resolved Settings
// =============================================================================

/// Where and what to read from the policy sidecar
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigSourceSettings {
    pub application: String,
    pub environment: String,
    pub configuration: String,
    pub sidecar_host: String,
    pub sidecar_port: u16,
    pub timeout: Duration,
}

impl Default for ConfigSourceSettings {
    fn default() -> Self {
        Self {
            application: String::new(),
            environment: String::new(),
            configuration: String::new(),
            sidecar_host: "localhost".to_string(),
            sidecar_port: 2772,
            timeout: Duration::from_secs(2),
        }
    }
}

impl ConfigSourceSettings {
    /// URL of the configuration document on the sidecar
    #[must_use]
    pub fn document_url(&self) -> String {
        format!(
            "http://{}:{}/applications/{}/environments/{}/configurations/{}",
            self.sidecar_host,
            self.sidecar_port,
            urlencoding::encode(&self.application),
            urlencoding::encode(&self.environment),
            urlencoding::encode(&self.configuration),
        )
    }
}

/// How to reach the model backend
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendSettings {
    pub region: String,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub connect_timeout: Duration,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint: None,
            api_key: None,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl BackendSettings {
    /// Endpoint base URL, derived from the region unless overridden
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://bedrock-runtime.{}.amazonaws.com", self.region),
        }
    }
}

/// HTTP surface settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerSettings {
    pub bind_address: String,
    pub channel_capacity: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            channel_capacity: 16,
        }
    }
}

/// Fully resolved router settings
#[derive(Clone, Debug, Default)]
pub struct RouterSettings {
    pub config_source: ConfigSourceSettings,
    pub backend: BackendSettings,
    pub server: ServerSettings,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Highest-priority source that contributed a value
    source: ConfigSource,
}

impl Default for ConfigSource {
    fn default() -> Self {
        Self::Default
    }
}

impl RouterSettings {
    /// Get the primary source of these settings
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Check that everything needed to serve requests is present
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` naming the first missing or
    /// invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let triple = [
            ("config_source.application", &self.config_source.application),
            ("config_source.environment", &self.config_source.environment),
            ("config_source.configuration", &self.config_source.configuration),
        ];
        for (name, value) in triple {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!("{name} must be set")));
            }
        }

        if self.server.channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "server.channel_capacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/model-router/router.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("model-router").join("router.toml"))
}

/// Load settings from the default path and the process environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
pub fn load_settings() -> Result<RouterSettings, ConfigError> {
    load_settings_from_path(default_config_path())
}

/// Load settings from a specific path and the process environment
///
/// A missing file is not an error; defaults and environment still apply.
///
/// # Errors
///
/// Returns an error if the specified file cannot be read or parsed.
pub fn load_settings_from_path(path: Option<PathBuf>) -> Result<RouterSettings, ConfigError> {
    load_settings_with_env(path, |key| std::env::var(key).ok())
}

/// Load settings with an explicit environment lookup
///
/// # Errors
///
/// Returns an error if the specified file cannot be read or parsed.
pub fn load_settings_with_env<F>(
    path: Option<PathBuf>,
    env: F,
) -> Result<RouterSettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = RouterSettings::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: RouterToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut settings, &toml_config);
            settings.config_file_path = Some(config_path.clone());
            settings.source = ConfigSource::File;

            tracing::info!(path = %config_path.display(), "Loaded configuration from file");
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut settings, env);

    Ok(settings)
}

fn apply_toml_config(settings: &mut RouterSettings, toml: &RouterToml) {
    let source = &toml.config_source;
    if let Some(ref application) = source.application {
        settings.config_source.application.clone_from(application);
    }
    if let Some(ref environment) = source.environment {
        settings.config_source.environment.clone_from(environment);
    }
    if let Some(ref configuration) = source.configuration {
        settings.config_source.configuration.clone_from(configuration);
    }
    if let Some(ref host) = source.sidecar_host {
        settings.config_source.sidecar_host.clone_from(host);
    }
    if let Some(port) = source.sidecar_port {
        settings.config_source.sidecar_port = port;
    }
    if let Some(ms) = source.timeout_ms {
        settings.config_source.timeout = Duration::from_millis(ms);
    }

    let backend = &toml.backend;
    if let Some(ref region) = backend.region {
        settings.backend.region.clone_from(region);
    }
    if backend.endpoint.is_some() {
        settings.backend.endpoint.clone_from(&backend.endpoint);
    }
    if backend.api_key.is_some() {
        settings.backend.api_key.clone_from(&backend.api_key);
    }
    if let Some(ms) = backend.connect_timeout_ms {
        settings.backend.connect_timeout = Duration::from_millis(ms);
    }

    if let Some(ref addr) = toml.server.bind_address {
        settings.server.bind_address.clone_from(addr);
    }
    if let Some(capacity) = toml.server.channel_capacity {
        settings.server.channel_capacity = capacity;
    }
}

fn apply_env_config<F>(settings: &mut RouterSettings, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let mut touched = false;
    let mut set_string = |key: &str, target: &mut String| {
        if let Some(value) = env(key) {
            *target = value;
            touched = true;
        }
    };

    set_string("APP_CONFIG_APPLICATION_NAME", &mut settings.config_source.application);
    set_string("APP_CONFIG_ENVIRONMENT", &mut settings.config_source.environment);
    set_string("APP_CONFIG_CONFIGURATION", &mut settings.config_source.configuration);
    set_string("ROUTER_SIDECAR_HOST", &mut settings.config_source.sidecar_host);
    set_string("AWS_REGION", &mut settings.backend.region);
    set_string("ROUTER_BIND_ADDRESS", &mut settings.server.bind_address);

    if let Some(port) = env("ROUTER_SIDECAR_PORT").and_then(|p| p.parse::<u16>().ok()) {
        settings.config_source.sidecar_port = port;
        touched = true;
    }
    if let Some(endpoint) = env("ROUTER_BACKEND_ENDPOINT") {
        settings.backend.endpoint = Some(endpoint);
        touched = true;
    }
    if let Some(key) = env("AWS_BEARER_TOKEN_BEDROCK") {
        settings.backend.api_key = Some(key);
        touched = true;
    }

    if touched {
        settings.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to settings
#[derive(Clone, Debug, Default)]
pub struct SettingsOverrides {
    pub bind_address: Option<String>,
    pub sidecar_port: Option<u16>,
    pub backend_endpoint: Option<String>,
}

impl SettingsOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bind address override
    #[must_use]
    pub fn with_bind_address(mut self, addr: impl Into<String>) -> Self {
        self.bind_address = Some(addr.into());
        self
    }

    /// Set sidecar port override
    #[must_use]
    pub fn with_sidecar_port(mut self, port: u16) -> Self {
        self.sidecar_port = Some(port);
        self
    }

    /// Set backend endpoint override
    #[must_use]
    pub fn with_backend_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.backend_endpoint = Some(endpoint.into());
        self
    }

    /// Apply overrides to resolved settings
    pub fn apply(&self, settings: &mut RouterSettings) {
        if self.bind_address.is_some()
            || self.sidecar_port.is_some()
            || self.backend_endpoint.is_some()
        {
            settings.source = ConfigSource::Cli;
        }

        if let Some(ref addr) = self.bind_address {
            settings.server.bind_address.clone_from(addr);
        }
        if let Some(port) = self.sidecar_port {
            settings.config_source.sidecar_port = port;
        }
        if self.backend_endpoint.is_some() {
            settings.backend.endpoint.clone_from(&self.backend_endpoint);
        }
    }
}
