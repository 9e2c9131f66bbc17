//! Provider configuration
//!
//! Settings can be deserialized from a provider block, built in code, or read
//! from `MSGRAPH_*` environment variables.

use std::time::Duration;

use serde::Deserialize;

/// Default Microsoft Graph endpoint
pub const DEFAULT_ENDPOINT: &str = "https://graph.microsoft.com";

/// Authentication strength policies are only published on the beta API
pub const DEFAULT_API_VERSION: &str = "beta";

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("api_version must not be empty")]
    EmptyApiVersion,

    #[error("invalid value for {name}: {reason}")]
    InvalidVariable { name: String, reason: String },
}

/// Connection settings for the Microsoft Graph provider
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct MsGraphConfig {
    pub endpoint: String,
    pub api_version: String,
    pub tenant_id: Option<String>,
    /// Bearer token sent with every request. Acquiring it is up to the caller.
    pub access_token: Option<String>,
    /// Additional attempts on throttling, server errors and replication lag
    pub max_retries: u32,
    #[serde(with = "duration_millis")]
    pub retry_min_backoff: Duration,
    #[serde(with = "duration_millis")]
    pub retry_max_backoff: Duration,
    #[serde(with = "duration_millis")]
    pub request_timeout: Duration,
    /// Interval between existence probes while waiting for deletion
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,
}

impl Default for MsGraphConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            tenant_id: None,
            access_token: None,
            max_retries: 3,
            retry_min_backoff: Duration::from_secs(1),
            retry_max_backoff: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
        }
    }
}

// The access token never shows up in logs
impl std::fmt::Debug for MsGraphConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MsGraphConfig")
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .field("tenant_id", &self.tenant_id)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("max_retries", &self.max_retries)
            .field("retry_min_backoff", &self.retry_min_backoff)
            .field("retry_max_backoff", &self.retry_max_backoff)
            .field("request_timeout", &self.request_timeout)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl MsGraphConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from `MSGRAPH_ENDPOINT`, `MSGRAPH_API_VERSION`,
    /// `MSGRAPH_TENANT_ID`, `MSGRAPH_ACCESS_TOKEN` and `MSGRAPH_MAX_RETRIES`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(endpoint) = lookup("MSGRAPH_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Some(version) = lookup("MSGRAPH_API_VERSION") {
            config.api_version = version;
        }
        config.tenant_id = lookup("MSGRAPH_TENANT_ID").filter(|s| !s.is_empty());
        config.access_token = lookup("MSGRAPH_ACCESS_TOKEN").filter(|s| !s.is_empty());
        if let Some(retries) = lookup("MSGRAPH_MAX_RETRIES") {
            config.max_retries = retries.parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidVariable {
                    name: "MSGRAPH_MAX_RETRIES".to_string(),
                    reason: e.to_string(),
                }
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_backoff(mut self, min: Duration, max: Duration) -> Self {
        self.retry_min_backoff = min;
        self.retry_max_backoff = max;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Check that the endpoint is an absolute http(s) URL and the API version is set
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.endpoint).map_err(|e| ConfigError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            reason: e.to_string(),
        })?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::InvalidEndpoint {
                endpoint: self.endpoint.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        if self.api_version.trim().is_empty() {
            return Err(ConfigError::EmptyApiVersion);
        }
        Ok(())
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
