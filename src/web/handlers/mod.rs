//! API handlers for the upload server.

pub mod site;
pub mod summary;
pub mod upload;

pub use site::*;
pub use summary::*;
pub use upload::*;

use axum::http::{header, HeaderMap};

use crate::admission::ExtensionPolicy;
use crate::config::ServerConfig;
use crate::site::{SiteRegistry, SiteStorage};
use crate::Result;

/// Shared application state.
#[derive(Debug)]
pub struct AppState {
    /// Where site files are written.
    pub storage: SiteStorage,
    /// Sites created since the server started.
    pub registry: SiteRegistry,
    /// Extensions the server refuses to store.
    pub extensions: ExtensionPolicy,
    /// Public base URL for returned links; derived from `Host` when unset.
    pub base_url: Option<String>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(storage: SiteStorage, extensions: ExtensionPolicy) -> Self {
        Self {
            storage,
            registry: SiteRegistry::new(),
            extensions,
            base_url: None,
        }
    }

    /// Create the state described by the `[server]` config section.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let storage = SiteStorage::new(&config.data_dir)?;
        Ok(Self::new(storage, config.extension_policy()).with_base_url(&config.base_url))
    }

    /// Set the public base URL. Empty means derive it from each request.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        self.base_url = (!base_url.is_empty()).then(|| base_url.to_string());
        self
    }

    /// Base URL for links returned to `headers`' sender.
    pub fn base_url_for(&self, headers: &HeaderMap) -> String {
        if let Some(base) = &self.base_url {
            return base.clone();
        }
        let host = headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("localhost");
        format!("http://{host}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn state() -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let storage = SiteStorage::new(dir.path()).unwrap();
        (dir, AppState::new(storage, ExtensionPolicy::deny(["exe"])))
    }

    #[test]
    fn test_base_url_from_host() {
        let (_dir, state) = state();
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("files.local:8080"));

        assert_eq!(state.base_url_for(&headers), "http://files.local:8080");
        assert_eq!(state.base_url_for(&HeaderMap::new()), "http://localhost");
    }

    #[test]
    fn test_configured_base_url_wins() {
        let (_dir, state) = state();
        let state = state.with_base_url("https://drop.example.com/");
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("internal:8080"));

        assert_eq!(state.base_url_for(&headers), "https://drop.example.com");
    }

    #[test]
    fn test_empty_base_url_ignored() {
        let (_dir, state) = state();
        assert!(state.with_base_url("").base_url.is_none());
    }
}
