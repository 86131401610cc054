//! planerix - Authenticated HTTP client for the Planerix API
//!
//! All API access flows through an [`ApiClient`]. The client attaches the
//! stored access token to each request and, when the server answers 401,
//! obtains a new token from the refresh endpoint and replays the request
//! once. Concurrent failures share one refresh call.
//!
//! # Example
//!
//! ```no_run
//! use planerix::{ApiClient, ClientConfig, Credentials, Method, RequestOptions};
//!
//! # async fn example() -> Result<(), planerix::Error> {
//! let client = ApiClient::new(ClientConfig::from_env()?)?;
//! client.login(&Credentials::new("alice@example.com", "secret")).await?;
//!
//! let options = RequestOptions::new().query("status", "active");
//! let projects: serde_json::Value = client
//!     .request(Method::GET, "/projects", None, &options)
//!     .await?;
//!
//! for project in projects.as_array().into_iter().flatten() {
//!     println!("{}", project["name"]);
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod types;

// Re-export primary types at crate root for convenience
pub use auth::{AccessToken, Credentials, FileTokenStore, MemoryTokenStore, TokenStore};
pub use config::ClientConfig;
pub use error::Error;
pub use http::{ApiClient, LoginResponse, RequestOptions};
pub use reqwest::Method;
pub use types::ApiUrl;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
