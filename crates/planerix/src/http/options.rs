//! Per-request options.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{Error, InvalidInputError};

/// Options for a single [`ApiClient::request`](crate::ApiClient::request).
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub(crate) headers: HeaderMap,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) skip_auth_retry: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header. An explicit `Authorization` header is replaced by the
    /// client's bearer token when one is stored.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, Error> {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| InvalidInputError::Header {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| InvalidInputError::Header {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        self.headers.append(header_name, header_value);
        Ok(self)
    }

    /// Add a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Do not attempt a token refresh if this request is rejected with 401.
    pub fn skip_auth_retry(mut self) -> Self {
        self.skip_auth_retry = true;
        self
    }

    pub fn skips_auth_retry(&self) -> bool {
        self.skip_auth_retry
    }

    /// Extra headers, in insertion order per name.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Query parameters, in insertion order.
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }
}
