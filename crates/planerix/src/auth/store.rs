//! Access token storage.
//!
//! The client holds exactly one access token slot. [`MemoryTokenStore`] keeps
//! it in-process; [`FileTokenStore`] persists it in a small key-value JSON
//! file so a session survives restarts.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use crate::error::{Error, StorageError};

use super::tokens::AccessToken;

/// Key under which the access token is persisted.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// A single slot holding the current access token.
///
/// Implementations must be cheap to call from async code: every outgoing
/// request reads the slot once.
pub trait TokenStore: Send + Sync + fmt::Debug {
    /// Returns the stored token, if any.
    fn load(&self) -> Result<Option<AccessToken>, Error>;

    /// Replaces the stored token.
    fn save(&self, token: &AccessToken) -> Result<(), Error>;

    /// Empties the slot.
    fn clear(&self) -> Result<(), Error>;
}

/// In-process token slot. Nothing is persisted.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: RwLock<Option<AccessToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with a token.
    pub fn with_token(token: AccessToken) -> Self {
        Self {
            slot: RwLock::new(Some(token)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<AccessToken>, Error> {
        Ok(self
            .slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, token: &AccessToken) -> Result<(), Error> {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), Error> {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// File-backed key-value store.
///
/// The file is a flat JSON object of string entries. The access token lives
/// under [`ACCESS_TOKEN_KEY`]; other entries (for example a persisted refresh
/// cookie) can be kept alongside it. A missing file is an empty store.
pub struct FileTokenStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileTokenStore {
    /// Create a store backed by `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read an arbitrary entry.
    pub fn get_entry(&self, key: &str) -> Result<Option<String>, Error> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_entries()?.remove(key))
    }

    /// Write an arbitrary entry.
    pub fn set_entry(&self, key: &str, value: &str) -> Result<(), Error> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_entries()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_entries(&entries)
    }

    /// Remove an entry. Removing a missing entry is not an error.
    pub fn remove_entry(&self, key: &str) -> Result<(), Error> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_entries()?;
        if entries.remove(key).is_some() {
            self.write_entries(&entries)?;
        }
        Ok(())
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>, Error> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.path.clone(),
                    source,
                }
                .into());
            }
        };

        if json.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&json).map_err(|source| {
            StorageError::Corrupt {
                path: self.path.clone(),
                source,
            }
            .into()
        })
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), Error> {
        let io_err = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, json).map_err(io_err)?;

        // Set restrictive permissions (Unix only)
        #[cfg(unix)]
        {
            let mut perms = fs::metadata(&self.path).map_err(io_err)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.path, perms).map_err(io_err)?;
        }

        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<AccessToken>, Error> {
        Ok(self
            .get_entry(ACCESS_TOKEN_KEY)?
            .filter(|t| !t.is_empty())
            .map(AccessToken::new))
    }

    fn save(&self, token: &AccessToken) -> Result<(), Error> {
        self.set_entry(ACCESS_TOKEN_KEY, token.as_str())
    }

    fn clear(&self) -> Result<(), Error> {
        self.remove_entry(ACCESS_TOKEN_KEY)
    }
}

impl fmt::Debug for FileTokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileTokenStore")
            .field("path", &self.path)
            .finish()
    }
}
