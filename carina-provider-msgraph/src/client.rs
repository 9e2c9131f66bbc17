//! Base Microsoft Graph HTTP client
//!
//! Builds request URLs, attaches the bearer token, and performs a bounded
//! retry on throttling, server errors and (optionally) replication lag 404s.
//! Entity clients such as [`crate::policies::AuthenticationStrengthPoliciesClient`]
//! sit on top of it.

use std::time::Duration;

use log::{debug, warn};
use reqwest::{Method, StatusCode, header};

use crate::config::MsGraphConfig;
use crate::waiter::NotFound;

const USER_AGENT: &str = concat!("carina-provider-msgraph/", env!("CARGO_PKG_VERSION"));

/// Errors returned by the Graph client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("network: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("decode: {0}")]
    Decode(String),

    #[error("encode: {0}")]
    Encode(String),
}

impl ClientError {
    /// HTTP status of the failed response, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::UnexpectedStatus { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl NotFound for ClientError {
    fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND.as_u16())
    }
}

/// Transport-level retry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            min_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.max_retries == 0
    }

    /// Delay before retry number `attempt` (0-based), doubling up to `max_backoff`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.min_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// One request against the Graph API
#[derive(Debug)]
pub struct GraphRequest<'a> {
    pub method: Method,
    /// Entity path below the API version (e.g., "/policies/authenticationStrengthPolicies")
    pub entity: String,
    pub body: Option<serde_json::Value>,
    /// The only statuses treated as success
    pub valid_status: &'a [StatusCode],
    /// Retry 404 responses, for entities that may not have replicated yet
    pub retry_not_found: bool,
    /// Prefix the entity path with the configured tenant id
    pub tenant_scoped: bool,
}

impl<'a> GraphRequest<'a> {
    pub fn new(method: Method, entity: impl Into<String>, valid_status: &'a [StatusCode]) -> Self {
        Self {
            method,
            entity: entity.into(),
            body: None,
            valid_status,
            retry_not_found: false,
            tenant_scoped: false,
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn retry_not_found(mut self) -> Self {
        self.retry_not_found = true;
        self
    }

    pub fn tenant_scoped(mut self) -> Self {
        self.tenant_scoped = true;
        self
    }
}

/// A successful Graph response
#[derive(Debug)]
pub struct GraphResponse {
    pub status: StatusCode,
    pub body: String,
}

impl GraphResponse {
    /// Decode the JSON body
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_str(&self.body)
            .map_err(|e| ClientError::Decode(format!("response body: {}", e)))
    }
}

/// Shared HTTP plumbing for the Graph entity clients
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    endpoint: String,
    api_version: String,
    tenant_id: Option<String>,
    access_token: Option<String>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .field("tenant_id", &self.tenant_id)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl GraphClient {
    pub fn new(config: &MsGraphConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_version: config.api_version.trim_matches('/').to_string(),
            tenant_id: config.tenant_id.clone(),
            access_token: config.access_token.clone(),
            retry: RetryPolicy {
                max_retries: config.max_retries,
                min_backoff: config.retry_min_backoff,
                max_backoff: config.retry_max_backoff,
            },
        })
    }

    /// A copy of this client that never retries
    ///
    /// Each request then corresponds to exactly one round trip, which is what
    /// a caller running its own polling loop needs.
    pub fn without_retries(&self) -> Self {
        Self {
            retry: RetryPolicy::disabled(),
            ..self.clone()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Full URL for an entity path
    pub fn url(&self, entity: &str, tenant_scoped: bool) -> String {
        match (&self.tenant_id, tenant_scoped) {
            (Some(tenant), true) => format!(
                "{}/{}/{}{}",
                self.endpoint, self.api_version, tenant, entity
            ),
            _ => format!("{}/{}{}", self.endpoint, self.api_version, entity),
        }
    }

    /// Send a request, retrying according to the retry policy
    pub async fn send(&self, request: GraphRequest<'_>) -> Result<GraphResponse, ClientError> {
        let url = self.url(&request.entity, request.tenant_scoped);
        let mut attempt = 0u32;

        loop {
            let mut builder = self
                .http
                .request(request.method.clone(), &url)
                .header(header::ACCEPT, "application/json");
            if let Some(token) = &self.access_token {
                builder = builder.bearer_auth(token);
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            debug!("{} {} (attempt {})", request.method, url, attempt + 1);

            let resp = match builder.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    if (e.is_connect() || e.is_timeout()) && attempt < self.retry.max_retries {
                        let delay = self.retry.backoff(attempt);
                        warn!("{} {} failed ({}), retrying in {:?}", request.method, url, e, delay);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(ClientError::Http(e));
                }
            };

            let status = resp.status();
            if request.valid_status.contains(&status) {
                let body = resp.text().await?;
                return Ok(GraphResponse { status, body });
            }

            let retry_after = retry_after(resp.headers());
            let body = resp.text().await.unwrap_or_default();
            let retryable = status == StatusCode::TOO_MANY_REQUESTS
                || status.is_server_error()
                || (status == StatusCode::NOT_FOUND && request.retry_not_found);

            if retryable && attempt < self.retry.max_retries {
                let delay = retry_after
                    .unwrap_or_else(|| self.retry.backoff(attempt))
                    .min(self.retry.max_backoff);
                warn!(
                    "{} {} returned {}, retrying in {:?}",
                    request.method, url, status, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            return Err(ClientError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }
    }
}

/// Parse a `Retry-After` header given in seconds
fn retry_after(headers: &header::HeaderMap) -> Option<Duration> {
    headers
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
