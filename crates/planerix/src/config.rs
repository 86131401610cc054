//! Client configuration.

use std::time::Duration;

use crate::error::Error;
use crate::types::ApiUrl;

/// Environment variable holding the API base URL.
pub const API_URL_ENV: &str = "PLANERIX_API_URL";

/// Environment variable overriding the refresh timeout, in seconds.
pub const REFRESH_TIMEOUT_ENV: &str = "PLANERIX_REFRESH_TIMEOUT_SECS";

/// Base URL used when [`API_URL_ENV`] is unset.
pub const DEFAULT_API_URL: &str = "http://localhost:8001/api";

/// Upper bound on a single refresh round-trip.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every request path is appended to.
    pub base_url: ApiUrl,
    /// How long callers may wait on a refresh before it counts as failed.
    pub refresh_timeout: Duration,
    /// Per-request timeout. `None` leaves the transport default in place.
    pub request_timeout: Option<Duration>,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl ClientConfig {
    /// Create a configuration with defaults for everything but the base URL.
    pub fn new(base_url: ApiUrl) -> Self {
        Self {
            base_url,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            request_timeout: None,
            user_agent: concat!("planerix/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Load from the process environment, falling back to [`DEFAULT_API_URL`].
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup(API_URL_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let mut config = Self::new(ApiUrl::new(&url)?);

        if let Some(secs) = lookup(REFRESH_TIMEOUT_ENV) {
            match secs.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.refresh_timeout = Duration::from_secs(secs),
                _ => tracing::warn!(value = %secs, "ignoring invalid {REFRESH_TIMEOUT_ENV}"),
            }
        }

        Ok(config)
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
