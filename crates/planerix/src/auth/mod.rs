//! Authentication primitives.
//!
//! This module holds the access token slot, login credentials and the
//! single-flight refresh coordinator used by [`ApiClient`](crate::ApiClient).

mod credentials;
mod refresh;
mod store;
mod tokens;

pub use credentials::Credentials;
pub(crate) use refresh::{RefreshCoordinator, RefreshTicket};
pub use store::{ACCESS_TOKEN_KEY, FileTokenStore, MemoryTokenStore, TokenStore};
pub use tokens::AccessToken;
