//! Console configuration and the dependency context handed to every screen.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::api::ResourceApi;

/// Default REST prefix appended to the API URL.
pub const DEFAULT_API_PREFIX: &str = "/api/v2/";
/// Default HTTP timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Default number of rows per list page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Configuration validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Page size must be positive.
    #[error("page size must be greater than zero")]
    ZeroPageSize,
    /// Timeout must be positive.
    #[error("HTTP timeout must be greater than zero")]
    ZeroTimeout,
    /// Prefix must start and end with `/`.
    #[error("API prefix '{prefix}' must start and end with '/'")]
    InvalidPrefix {
        /// Rejected prefix.
        prefix: String,
    },
    /// The API URL cannot serve as a base for relative paths.
    #[error("API URL '{url}' cannot be used as a base URL")]
    InvalidBaseUrl {
        /// Rejected URL.
        url: String,
    },
}

/// Connection and paging settings for the console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Root URL of the controller, e.g. `https://controller.example.com`.
    pub api_url: Url,
    /// REST prefix joined onto `api_url`.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Rows per page when a screen does not say otherwise.
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    /// Bearer token sent with every request.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

fn default_api_prefix() -> String {
    DEFAULT_API_PREFIX.to_string()
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

const fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl ConsoleConfig {
    /// Configuration with defaults for everything but the URL.
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            api_prefix: default_api_prefix(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            default_page_size: DEFAULT_PAGE_SIZE,
            token: None,
        }
    }

    /// Check the invariants the client relies on.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if !(self.api_prefix.starts_with('/') && self.api_prefix.ends_with('/')) {
            return Err(ConfigError::InvalidPrefix {
                prefix: self.api_prefix.clone(),
            });
        }
        if self.api_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.api_url.to_string(),
            });
        }
        Ok(())
    }

    /// Absolute URL every endpoint path is joined onto.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] when the prefix cannot be joined.
    pub fn api_base(&self) -> Result<Url, ConfigError> {
        self.api_url
            .join(&self.api_prefix)
            .map_err(|_| ConfigError::InvalidBaseUrl {
                url: self.api_url.to_string(),
            })
    }

    /// HTTP timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Explicit dependencies shared by sessions and list screens.
#[derive(Clone)]
pub struct ConsoleContext {
    api: Arc<dyn ResourceApi>,
    config: Arc<ConsoleConfig>,
}

impl ConsoleContext {
    /// Bundle an API client with its configuration.
    #[must_use]
    pub fn new(api: Arc<dyn ResourceApi>, config: ConsoleConfig) -> Self {
        Self {
            api,
            config: Arc::new(config),
        }
    }

    /// REST seam.
    #[must_use]
    pub fn api(&self) -> Arc<dyn ResourceApi> {
        Arc::clone(&self.api)
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConsoleConfig {
        ConsoleConfig::new(Url::parse("https://controller.example.com").unwrap())
    }

    #[test]
    fn defaults_validate() {
        let config = config();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(
            config.api_base().unwrap().as_str(),
            "https://controller.example.com/api/v2/"
        );
    }

    #[test]
    fn rejects_bad_values() {
        let mut zero_page = config();
        zero_page.default_page_size = 0;
        assert_eq!(zero_page.validate(), Err(ConfigError::ZeroPageSize));

        let mut zero_timeout = config();
        zero_timeout.timeout_secs = 0;
        assert_eq!(zero_timeout.validate(), Err(ConfigError::ZeroTimeout));

        let mut prefix = config();
        prefix.api_prefix = "api/v2".to_string();
        assert!(matches!(
            prefix.validate(),
            Err(ConfigError::InvalidPrefix { .. })
        ));
    }

    #[test]
    fn deserializes_with_defaults() {
        let parsed: ConsoleConfig =
            serde_json::from_str(r#"{"api_url": "http://localhost:8013", "token": "t"}"#).unwrap();
        assert_eq!(parsed.api_prefix, DEFAULT_API_PREFIX);
        assert_eq!(parsed.default_page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(parsed.token.as_deref(), Some("t"));
        let rendered = serde_json::to_value(&parsed).unwrap();
        assert!(rendered.get("token").is_none());
    }
}
