//! API base URL type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::{Error, InvalidInputError};

/// A validated API base URL.
///
/// This type ensures the URL is absolute, uses HTTPS (or HTTP for localhost),
/// and is normalized so endpoint paths can be appended to it.
///
/// # Example
///
/// ```
/// use planerix::ApiUrl;
///
/// let api = ApiUrl::new("https://api.planerix.com/api/").unwrap();
/// assert_eq!(api.endpoint_url("/auth/refresh").unwrap(),
///            "https://api.planerix.com/api/auth/refresh");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ApiUrl(Url);

impl ApiUrl {
    /// Create a new API URL from a string, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not valid or doesn't meet requirements.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref();
        let mut url = Url::parse(s).map_err(|e| InvalidInputError::ApiUrl {
            value: s.to_string(),
            reason: e.to_string(),
        })?;

        Self::validate(&url, s)?;

        url.set_query(None);
        url.set_fragment(None);
        let trimmed = url.path().trim_end_matches('/').to_string();
        url.set_path(&trimmed);

        Ok(Self(url))
    }

    /// Returns the full URL for a path relative to this base.
    ///
    /// Leading slashes on `path` are ignored, so `"/projects"` and
    /// `"projects"` resolve to the same endpoint.
    pub fn endpoint_url(&self, path: &str) -> Result<String, Error> {
        if path.contains('?') || path.contains('#') {
            return Err(InvalidInputError::Path {
                value: path.to_string(),
                reason: "query and fragment belong in request options".to_string(),
            }
            .into());
        }

        let base = self.0.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(format!("{}/{}", base, path))
    }

    /// Returns the base URL as a string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the host string.
    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }

    fn validate(url: &Url, original: &str) -> Result<(), Error> {
        if url.cannot_be_a_base() {
            return Err(InvalidInputError::ApiUrl {
                value: original.to_string(),
                reason: "must be an absolute URL".to_string(),
            }
            .into());
        }

        // Must be HTTPS (or HTTP for localhost)
        let scheme = url.scheme();
        let is_localhost = url
            .host_str()
            .is_some_and(|h| h == "localhost" || h == "127.0.0.1" || h == "[::1]");

        if scheme != "https" && !(scheme == "http" && is_localhost) {
            return Err(InvalidInputError::ApiUrl {
                value: original.to_string(),
                reason: "must use HTTPS (HTTP allowed only for localhost)".to_string(),
            }
            .into());
        }

        if url.host_str().is_none() {
            return Err(InvalidInputError::ApiUrl {
                value: original.to_string(),
                reason: "must have a host".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

impl fmt::Display for ApiUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ApiUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for ApiUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for ApiUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ApiUrl::new(&s).map_err(serde::de::Error::custom)
    }
}

impl AsRef<str> for ApiUrl {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_https_url() {
        let api = ApiUrl::new("https://api.planerix.com").unwrap();
        assert_eq!(api.host(), Some("api.planerix.com"));
    }

    #[test]
    fn valid_localhost_http() {
        let api = ApiUrl::new("http://localhost:8001/api").unwrap();
        assert_eq!(api.host(), Some("localhost"));
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let api = ApiUrl::new("http://127.0.0.1:8001/api").unwrap();
        assert_eq!(
            api.endpoint_url("/projects").unwrap(),
            "http://127.0.0.1:8001/api/projects"
        );
        assert_eq!(
            api.endpoint_url("projects").unwrap(),
            "http://127.0.0.1:8001/api/projects"
        );
    }

    #[test]
    fn normalizes_trailing_slash() {
        let api = ApiUrl::new("https://api.planerix.com/api/").unwrap();
        assert_eq!(
            api.endpoint_url("/auth/refresh").unwrap(),
            "https://api.planerix.com/api/auth/refresh"
        );

        let root = ApiUrl::new("https://api.planerix.com/").unwrap();
        assert_eq!(
            root.endpoint_url("/auth/refresh").unwrap(),
            "https://api.planerix.com/auth/refresh"
        );
    }

    #[test]
    fn rejects_query_in_path() {
        let api = ApiUrl::new("https://api.planerix.com").unwrap();
        assert!(api.endpoint_url("/projects?page=2").is_err());
    }

    #[test]
    fn invalid_http_non_localhost() {
        assert!(ApiUrl::new("http://api.planerix.com").is_err());
    }

    #[test]
    fn invalid_relative_url() {
        assert!(ApiUrl::new("/api/projects").is_err());
    }

    #[test]
    fn deserializes_from_string() {
        let api: ApiUrl = serde_json::from_str("\"https://api.planerix.com/api\"").unwrap();
        assert_eq!(api.as_str(), "https://api.planerix.com/api");
    }
}
