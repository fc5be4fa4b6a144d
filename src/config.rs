//! Configuration module for dropload.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

use crate::admission::{normalize_extension, AdmissionPolicy, ExtensionPolicy};
use crate::{DroploadError, Result};

/// Extensions refused by default (executables and large video formats).
pub const DEFAULT_BLOCKED_EXTENSIONS: &[&str] = &[
    "exe", "mp4", "avi", "flv", "mpg", "mpeg", "mov", "mkv", "wmv", "dll", "so",
];

/// Upload client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Full URL of the upload endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// How long the server keeps an upload, shown in the success message.
    #[serde(default = "default_expiry_hours")]
    pub expiry_hours: u32,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8080/api/upload".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_expiry_hours() -> u32 {
    24
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            connect_timeout_secs: default_connect_timeout(),
            expiry_hours: default_expiry_hours(),
        }
    }
}

/// Which way the extension list is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionMode {
    /// Only listed extensions pass.
    Allow,
    /// Listed extensions fail, everything else passes.
    Deny,
}

/// Admission policy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// Allow-list or deny-list mode.
    #[serde(default = "default_mode")]
    pub mode: ExtensionMode,
    /// Extensions the mode applies to.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Maximum size of a single file in bytes.
    #[serde(default = "default_per_file_size_limit")]
    pub per_file_size_limit: u64,
    /// Maximum total size of one upload in bytes.
    #[serde(default = "default_aggregate_size_limit")]
    pub aggregate_size_limit: u64,
    /// Maximum number of eligible files in one upload.
    #[serde(default = "default_file_count_limit")]
    pub file_count_limit: usize,
}

fn default_mode() -> ExtensionMode {
    ExtensionMode::Deny
}

fn default_extensions() -> Vec<String> {
    DEFAULT_BLOCKED_EXTENSIONS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_per_file_size_limit() -> u64 {
    10 * 1024 * 1024 // 10MB
}

fn default_aggregate_size_limit() -> u64 {
    20 * 1024 * 1024 // 20MB
}

fn default_file_count_limit() -> usize {
    250
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            extensions: default_extensions(),
            per_file_size_limit: default_per_file_size_limit(),
            aggregate_size_limit: default_aggregate_size_limit(),
            file_count_limit: default_file_count_limit(),
        }
    }
}

impl PolicyConfig {
    /// Build the admission policy described by this section.
    pub fn to_policy(&self) -> AdmissionPolicy {
        let extensions: BTreeSet<String> = self
            .extensions
            .iter()
            .map(|e| normalize_extension(e))
            .filter(|e| !e.is_empty())
            .collect();
        let extensions = match self.mode {
            ExtensionMode::Allow => ExtensionPolicy::Allow(extensions),
            ExtensionMode::Deny => ExtensionPolicy::Deny(extensions),
        };

        AdmissionPolicy {
            extensions,
            per_file_size_limit: self.per_file_size_limit,
            aggregate_size_limit: self.aggregate_size_limit,
            file_count_limit: self.file_count_limit,
        }
    }
}

/// Upload server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory where uploaded sites are stored.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Maximum request body size in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
    /// Public base URL used in returned links. Empty means derive it from the
    /// request's Host header.
    #[serde(default)]
    pub base_url: String,
    /// Extensions the server refuses to store.
    #[serde(default = "default_extensions")]
    pub blocked_extensions: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> String {
    "data/sites".to_string()
}

/// Request body limit in MB. Leaves room above the default aggregate limit
/// for multipart framing.
fn default_max_upload_size() -> u64 {
    25
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            max_upload_size_mb: default_max_upload_size(),
            base_url: String::new(),
            blocked_extensions: default_extensions(),
        }
    }
}

impl ServerConfig {
    /// Extension policy applied to incoming files.
    pub fn extension_policy(&self) -> ExtensionPolicy {
        ExtensionPolicy::Deny(
            self.blocked_extensions
                .iter()
                .map(|e| normalize_extension(e))
                .filter(|e| !e.is_empty())
                .collect(),
        )
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/dropload.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Upload client configuration.
    #[serde(default)]
    pub client: ClientConfig,
    /// Admission policy.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Upload server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(DroploadError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| DroploadError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `DROPLOAD_ENDPOINT`: Override the upload endpoint
    /// - `DROPLOAD_DATA_DIR`: Override the server's data directory
    pub fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var("DROPLOAD_ENDPOINT") {
            if !endpoint.is_empty() {
                self.client.endpoint = endpoint;
            }
        }
        if let Ok(data_dir) = std::env::var("DROPLOAD_DATA_DIR") {
            if !data_dir.is_empty() {
                self.server.data_dir = data_dir;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - the endpoint is not an http(s) URL
    /// - any policy limit is zero
    /// - the per-file limit is larger than the aggregate limit
    pub fn validate(&self) -> Result<()> {
        let endpoint = url::Url::parse(&self.client.endpoint).map_err(|e| {
            DroploadError::Config(format!("invalid endpoint '{}': {e}", self.client.endpoint))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(DroploadError::Config(format!(
                "unsupported endpoint scheme: {}",
                endpoint.scheme()
            )));
        }

        let policy = &self.policy;
        if policy.per_file_size_limit == 0
            || policy.aggregate_size_limit == 0
            || policy.file_count_limit == 0
        {
            return Err(DroploadError::Config(
                "policy limits must be greater than zero".to_string(),
            ));
        }
        if policy.per_file_size_limit > policy.aggregate_size_limit {
            return Err(DroploadError::Config(format!(
                "per_file_size_limit ({}) is larger than aggregate_size_limit ({})",
                policy.per_file_size_limit, policy.aggregate_size_limit
            )));
        }
        if policy.mode == ExtensionMode::Allow && policy.extensions.is_empty() {
            return Err(DroploadError::Config(
                "allow mode needs at least one extension".to_string(),
            ));
        }
        Ok(())
    }
}
