//! Authenticated API client with single-flight token refresh.

use std::sync::Arc;

use reqwest::Method;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{Instrument, Span, debug, info, instrument, trace, warn};
use url::Url;

use crate::auth::{
    AccessToken, Credentials, MemoryTokenStore, RefreshCoordinator, RefreshTicket, TokenStore,
};
use crate::config::ClientConfig;
use crate::error::{ApiError, AuthError, Error, InvalidInputError};
use crate::types::ApiUrl;

use super::endpoints::{LOGIN, LOGOUT, LoginRequest, LoginResponse, REFRESH, RefreshResponse};
use super::options::RequestOptions;

/// HTTP client for the Planerix API.
///
/// Every request carries the stored access token as a bearer credential.
/// When a request is rejected with 401 the client refreshes the token once,
/// using the refresh cookie held in its cookie jar, and replays the request
/// with the new token. Concurrent 401s share a single refresh call.
///
/// A request is replayed at most once. If the refresh fails, or the replay is
/// rejected again, the stored token is cleared and the caller receives
/// [`AuthError::SessionExpired`] carrying the original 401 response. All
/// other failures are passed through untouched.
///
/// Clones share the token slot, cookie jar and refresh state.
///
/// # Example
///
/// ```no_run
/// use planerix::{ApiClient, ClientConfig, Credentials};
///
/// # async fn example() -> Result<(), planerix::Error> {
/// let client = ApiClient::new(ClientConfig::from_env()?)?;
/// client.login(&Credentials::new("alice@example.com", "secret")).await?;
///
/// let projects: serde_json::Value = client.get("/projects").await?;
/// println!("{projects}");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    http: reqwest::Client,
    cookies: Arc<Jar>,
    store: Arc<dyn TokenStore>,
    refresh: Arc<RefreshCoordinator>,
}

impl ApiClient {
    /// Create a client with an in-memory token slot.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        Self::with_store(config, Arc::new(MemoryTokenStore::new()))
    }

    /// Create a client backed by the given token slot.
    pub fn with_store(config: ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self, Error> {
        Self::with_cookie_jar(config, store, Arc::new(Jar::default()))
    }

    /// Create a client using an existing cookie jar.
    ///
    /// The jar must already hold the refresh cookie if the session was
    /// established elsewhere.
    pub fn with_cookie_jar(
        config: ClientConfig,
        store: Arc<dyn TokenStore>,
        cookies: Arc<Jar>,
    ) -> Result<Self, Error> {
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .cookie_provider(Arc::clone(&cookies));
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                http,
                cookies,
                store,
                refresh: Arc::new(RefreshCoordinator::new()),
            }),
        })
    }

    /// Returns the configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Returns the API base URL.
    pub fn base_url(&self) -> &ApiUrl {
        &self.inner.config.base_url
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Issue a request and decode the JSON response body.
    ///
    /// `path` is relative to the configured base URL. An empty success body
    /// decodes as JSON `null`, so `()`, `Option<T>` and
    /// [`serde_json::Value`] all accept `204 No Content`.
    ///
    /// # Errors
    ///
    /// - [`Error::Api`] for non-success responses other than a recoverable 401
    /// - [`Error::Auth`] with [`AuthError::SessionExpired`] when a 401 could not
    ///   be recovered; the stored token is cleared
    /// - [`Error::Transport`] when no response was received
    #[instrument(skip(self, body, options), fields(api = %self.inner.config.base_url))]
    pub async fn request<R>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        options: &RequestOptions,
    ) -> Result<R, Error>
    where
        R: DeserializeOwned,
    {
        let bytes = self.execute(method, path, body, options).await?;
        decode_body(&bytes)
    }

    /// GET `path`.
    pub async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, Error> {
        self.request(Method::GET, path, None, &RequestOptions::default())
            .await
    }

    /// POST `body` as JSON to `path`.
    pub async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, Error>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, path, Some(&body), &RequestOptions::default())
            .await
    }

    /// PUT `body` as JSON to `path`.
    pub async fn put<B, R>(&self, path: &str, body: &B) -> Result<R, Error>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        self.request(Method::PUT, path, Some(&body), &RequestOptions::default())
            .await
    }

    /// PATCH `path` with `body` as JSON.
    pub async fn patch<B, R>(&self, path: &str, body: &B) -> Result<R, Error>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        self.request(Method::PATCH, path, Some(&body), &RequestOptions::default())
            .await
    }

    /// DELETE `path`.
    pub async fn delete<R: DeserializeOwned>(&self, path: &str) -> Result<R, Error> {
        self.request(Method::DELETE, path, None, &RequestOptions::default())
            .await
    }

    /// Send with the stored token; on a recoverable 401 refresh and replay once.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        options: &RequestOptions,
    ) -> Result<Vec<u8>, Error> {
        let url = self.inner.config.base_url.endpoint_url(path)?;
        let mut token = self.inner.store.load()?;
        let mut retried = false;

        loop {
            let err = match self.send(&method, &url, body, options, token.as_ref()).await {
                Ok(bytes) => return Ok(bytes),
                Err(Error::Api(err)) if err.is_unauthorized() => err,
                Err(err) => return Err(err),
            };

            if retried || options.skip_auth_retry || is_refresh_path(path) {
                debug!(retried, "unauthorized, not retrying");
                return Err(self.expire_session(err));
            }

            retried = true;
            let fresh = match self.newer_stored_token(token.as_ref())? {
                Some(newer) => {
                    debug!("access token rejected, replaying with newer stored token");
                    Some(newer)
                }
                None => {
                    debug!("access token rejected, waiting for refresh");
                    self.refreshed_token().await
                }
            };
            match fresh {
                Some(fresh) => token = Some(fresh),
                None => return Err(self.expire_session(err)),
            }
        }
    }

    /// The stored token, if a refresh that settled after `used` was sent
    /// already replaced it.
    fn newer_stored_token(&self, used: Option<&AccessToken>) -> Result<Option<AccessToken>, Error> {
        let stored = self.inner.store.load()?;
        Ok(stored.filter(|current| Some(current) != used))
    }

    /// A single round-trip without any retry handling.
    async fn send(
        &self,
        method: &Method,
        url: &str,
        body: Option<&serde_json::Value>,
        options: &RequestOptions,
        token: Option<&AccessToken>,
    ) -> Result<Vec<u8>, Error> {
        let mut headers = options.headers.clone();
        if let Some(token) = token {
            let value =
                HeaderValue::from_str(&token.bearer()).map_err(|e| InvalidInputError::Header {
                    name: AUTHORIZATION.to_string(),
                    reason: e.to_string(),
                })?;
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = self.inner.http.request(method.clone(), url).headers(headers);
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        debug!(%method, url, authenticated = token.is_some(), "sending request");
        let response = builder.send().await?;

        let status = response.status();
        trace!(status = %status, "response");

        let bytes = response.bytes().await?;
        if status.is_success() {
            Ok(bytes.to_vec())
        } else {
            Err(ApiError::from_body(status.as_u16(), &bytes).into())
        }
    }

    /// Clear the token slot and wrap the terminal 401.
    fn expire_session(&self, err: ApiError) -> Error {
        self.clear_stored_token();
        AuthError::SessionExpired(err).into()
    }

    fn clear_stored_token(&self) {
        if let Err(e) = self.inner.store.clear() {
            warn!(error = %e, "failed to clear stored access token");
        }
    }

    // ========================================================================
    // Refresh
    // ========================================================================

    /// Obtain a new access token, joining an in-flight refresh if there is one.
    ///
    /// The refresh itself runs on a spawned task, so dropping the caller that
    /// started it does not abort the refresh for the others waiting on it.
    ///
    /// Returns `None` when the refresh failed; the slot is cleared in that case.
    async fn refreshed_token(&self) -> Option<AccessToken> {
        let guard = match self.inner.refresh.begin() {
            RefreshTicket::Follower(waiter) => return waiter.wait().await,
            RefreshTicket::Leader(guard) => guard,
        };

        let client = self.clone();
        let task = tokio::spawn(
            async move {
                let token = client.run_refresh().await;
                guard.settle(token.clone());
                token
            }
            .instrument(Span::current()),
        );

        match task.await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "token refresh task failed");
                None
            }
        }
    }

    /// Call the refresh endpoint within the configured timeout and update the
    /// slot with the outcome.
    async fn run_refresh(&self) -> Option<AccessToken> {
        let timeout = self.inner.config.refresh_timeout;
        let token = match tokio::time::timeout(timeout, self.call_refresh()).await {
            // Store before waking waiters so replays observe the new token.
            Ok(Ok(token)) => match self.inner.store.save(&token) {
                Ok(()) => {
                    info!("access token refreshed");
                    Some(token)
                }
                Err(e) => {
                    warn!(error = %e, "failed to persist refreshed access token");
                    None
                }
            },
            Ok(Err(e)) => {
                warn!(error = %e, "token refresh failed");
                None
            }
            Err(_) => {
                warn!(?timeout, "token refresh timed out");
                None
            }
        };

        if token.is_none() {
            self.clear_stored_token();
        }
        token
    }

    /// POST to the refresh endpoint. The refresh cookie is attached by the
    /// cookie jar; no bearer token is sent.
    async fn call_refresh(&self) -> Result<AccessToken, Error> {
        let url = self.inner.config.base_url.endpoint_url(REFRESH)?;
        let options = RequestOptions::new().skip_auth_retry();

        let bytes = self.send(&Method::POST, &url, None, &options, None).await?;
        let response: RefreshResponse = decode_body(&bytes)?;

        response
            .access_token
            .filter(|t| !t.is_empty())
            .map(AccessToken::new)
            .ok_or_else(|| AuthError::RefreshFailed.into())
    }

    /// Force a token refresh.
    ///
    /// Shares the single in-flight refresh with any requests currently
    /// recovering from a 401.
    #[instrument(skip(self), fields(api = %self.inner.config.base_url))]
    pub async fn refresh(&self) -> Result<AccessToken, Error> {
        info!("refreshing access token");
        self.refreshed_token()
            .await
            .ok_or_else(|| AuthError::RefreshFailed.into())
    }

    /// Whether a refresh call is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.inner.refresh.is_refreshing()
    }

    // ========================================================================
    // Session
    // ========================================================================

    /// Authenticate and store the returned access token.
    ///
    /// The server also sets the refresh cookie, which the client's cookie jar
    /// keeps for later refresh calls.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] if the server rejects the credentials.
    #[instrument(skip(self, credentials), fields(email = %credentials.email()))]
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, Error> {
        info!("logging in");

        let url = self.inner.config.base_url.endpoint_url(LOGIN)?;
        let body = serde_json::to_value(LoginRequest {
            email: credentials.email(),
            password: credentials.password(),
        })?;
        let options = RequestOptions::new().skip_auth_retry();

        let bytes = self
            .send(&Method::POST, &url, Some(&body), &options, None)
            .await?;
        let response: LoginResponse = decode_body(&bytes)?;

        if response.access_token.is_empty() {
            return Err(AuthError::MissingAccessToken.into());
        }

        self.inner
            .store
            .save(&AccessToken::new(response.access_token.as_str()))?;

        debug!("logged in");
        Ok(response)
    }

    /// End the session.
    ///
    /// The server-side logout is best effort; the stored token is cleared
    /// regardless of its outcome.
    #[instrument(skip(self), fields(api = %self.inner.config.base_url))]
    pub async fn logout(&self) -> Result<(), Error> {
        let url = self.inner.config.base_url.endpoint_url(LOGOUT)?;
        let token = match self.inner.store.load() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "failed to read stored access token");
                None
            }
        };
        let options = RequestOptions::new().skip_auth_retry();

        if let Err(e) = self
            .send(&Method::POST, &url, None, &options, token.as_ref())
            .await
        {
            warn!(error = %e, "server-side logout failed");
        }

        self.inner.store.clear()?;
        info!("logged out");
        Ok(())
    }

    /// Returns the stored access token, if any.
    pub fn access_token(&self) -> Result<Option<AccessToken>, Error> {
        self.inner.store.load()
    }

    /// Replace the stored access token.
    pub fn set_access_token(&self, token: AccessToken) -> Result<(), Error> {
        self.inner.store.save(&token)
    }

    /// Empty the token slot.
    pub fn clear_access_token(&self) -> Result<(), Error> {
        self.inner.store.clear()
    }

    // ========================================================================
    // Refresh cookie
    // ========================================================================

    /// The `Cookie` header the jar would send to the refresh endpoint.
    ///
    /// The value is opaque; it exists so a session can be persisted and later
    /// restored with [`ApiClient::restore_refresh_cookie`].
    pub fn refresh_cookie(&self) -> Result<Option<String>, Error> {
        let url = self.refresh_url()?;
        Ok(self
            .inner
            .cookies
            .cookies(&url)
            .and_then(|value| value.to_str().ok().map(str::to_string)))
    }

    /// Seed the jar with a header previously returned by
    /// [`ApiClient::refresh_cookie`].
    pub fn restore_refresh_cookie(&self, header: &str) -> Result<(), Error> {
        let url = self.refresh_url()?;
        for pair in header.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            self.inner.cookies.add_cookie_str(pair, &url);
        }
        Ok(())
    }

    fn refresh_url(&self) -> Result<Url, Error> {
        let url = self.inner.config.base_url.endpoint_url(REFRESH)?;
        Url::parse(&url).map_err(|e| {
            InvalidInputError::ApiUrl {
                value: url,
                reason: e.to_string(),
            }
            .into()
        })
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.config.base_url)
            .field("store", &self.inner.store)
            .field("tokens", &"[REDACTED]")
            .finish()
    }
}

fn is_refresh_path(path: &str) -> bool {
    path.trim_matches('/') == REFRESH.trim_matches('/')
}

fn decode_body<R: DeserializeOwned>(bytes: &[u8]) -> Result<R, Error> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_slice(b"null")?);
    }
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_path_detection() {
        assert!(is_refresh_path("/auth/refresh"));
        assert!(is_refresh_path("auth/refresh/"));
        assert!(!is_refresh_path("/auth/login"));
        assert!(!is_refresh_path("/auth/refresh/extra"));
    }

    #[test]
    fn empty_body_decodes_as_null() {
        let value: serde_json::Value = decode_body(b"").unwrap();
        assert!(value.is_null());

        let _: () = decode_body(b" \n").unwrap();

        let none: Option<u32> = decode_body(b"").unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn decode_mismatch_is_json_error() {
        let err = decode_body::<Vec<u32>>(br#"{"a":1}"#).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn refresh_cookie_roundtrip() {
        let config = ClientConfig::new(ApiUrl::new("https://api.planerix.com/api").unwrap());
        let client = ApiClient::new(config).unwrap();
        assert!(client.refresh_cookie().unwrap().is_none());

        client.restore_refresh_cookie("refresh_token=abc").unwrap();
        assert_eq!(
            client.refresh_cookie().unwrap().as_deref(),
            Some("refresh_token=abc")
        );
    }

    #[test]
    fn shares_injected_cookie_jar() {
        let base = "https://api.planerix.com/api";
        let jar = Arc::new(Jar::default());
        jar.add_cookie_str(
            "refresh_token=seeded",
            &Url::parse(&format!("{base}{REFRESH}")).unwrap(),
        );

        let config = ClientConfig::new(ApiUrl::new(base).unwrap());
        let client =
            ApiClient::with_cookie_jar(config, Arc::new(MemoryTokenStore::new()), jar).unwrap();
        assert_eq!(
            client.refresh_cookie().unwrap().as_deref(),
            Some("refresh_token=seeded")
        );
    }

    #[test]
    fn debug_redacts_tokens() {
        let config = ClientConfig::new(ApiUrl::new("https://api.planerix.com").unwrap());
        let store = Arc::new(MemoryTokenStore::with_token(AccessToken::new("secret-tok")));
        let client = ApiClient::with_store(config, store).unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("secret-tok"));
    }
}
