//! Authenticated HTTP client.
//!
//! This module provides [`ApiClient`], which attaches the current access
//! token to every request and transparently recovers from token expiry.

mod client;
mod endpoints;
mod options;

pub use client::ApiClient;
pub use endpoints::{LOGIN, LOGOUT, LoginResponse, REFRESH};
pub use options::RequestOptions;
