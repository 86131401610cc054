//! Session storage for persisting login state between invocations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use directories::ProjectDirs;

use planerix::config::API_URL_ENV;
use planerix::{ApiClient, ApiUrl, ClientConfig, FileTokenStore, TokenStore};

/// Overrides the session file location.
pub const SESSION_FILE_ENV: &str = "PLANERIX_SESSION_FILE";

const API_URL_KEY: &str = "api_url";
const REFRESH_COOKIE_KEY: &str = "refresh_cookie";

/// An API client bound to the on-disk session.
pub struct CliSession {
    pub client: ApiClient,
    store: Arc<FileTokenStore>,
}

/// Get the session file path.
fn session_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(SESSION_FILE_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }

    let dirs =
        ProjectDirs::from("", "", "planerix").context("Could not determine data directory")?;

    Ok(dirs.data_dir().join("session.json"))
}

/// Open the stored session.
///
/// The API URL is taken from `api_url`, then `$PLANERIX_API_URL`, then the
/// URL saved at login, then the built-in default.
pub fn open(api_url: Option<&str>) -> Result<CliSession> {
    let store = Arc::new(FileTokenStore::new(session_path()?));
    let saved_url = store
        .get_entry(API_URL_KEY)
        .context("Failed to read session file")?;

    let config = match api_url {
        Some(url) => ClientConfig::new(ApiUrl::new(url).context("Invalid API URL")?),
        None => ClientConfig::from_lookup(|key| {
            let value = std::env::var(key).ok().filter(|v| !v.is_empty());
            if key == API_URL_ENV {
                value.or_else(|| saved_url.clone())
            } else {
                value
            }
        })
        .context("Invalid API configuration")?,
    };

    let client = ApiClient::with_store(config, store.clone())?;

    if let Some(cookie) = store
        .get_entry(REFRESH_COOKIE_KEY)
        .context("Failed to read session file")?
    {
        client.restore_refresh_cookie(&cookie)?;
    }

    Ok(CliSession { client, store })
}

impl CliSession {
    /// Persist the API URL and the current refresh cookie.
    ///
    /// The access token is written by the client itself whenever it changes.
    pub fn save(&self) -> Result<()> {
        self.store
            .set_entry(API_URL_KEY, self.client.base_url().as_str())
            .context("Failed to write session file")?;

        let written = match self.client.refresh_cookie()? {
            Some(cookie) => self.store.set_entry(REFRESH_COOKIE_KEY, &cookie),
            None => self.store.remove_entry(REFRESH_COOKIE_KEY),
        };
        written.context("Failed to write session file")?;

        Ok(())
    }

    /// Forget the access token and refresh cookie.
    pub fn clear(&self) -> Result<()> {
        self.store.clear().context("Failed to clear session")?;
        self.store
            .remove_entry(REFRESH_COOKIE_KEY)
            .context("Failed to clear session")?;
        Ok(())
    }

    pub fn has_access_token(&self) -> Result<bool> {
        Ok(self.store.load()?.is_some())
    }

    pub fn has_refresh_cookie(&self) -> Result<bool> {
        Ok(self.store.get_entry(REFRESH_COOKIE_KEY)?.is_some())
    }

    pub fn path(&self) -> &std::path::Path {
        self.store.path()
    }
}
