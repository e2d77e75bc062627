//! Session store abstraction.
//!
//! The login flow persists everything it needs across restarts (the pending
//! challenge, the authenticated session, a deferred redirect target) in a flat
//! string key-value store, the same shape as browser `localStorage`.
//!
//! - `MemoryStore` keeps values in a `HashMap` and is what tests use.
//! - `FileStore` keeps a JSON object on disk with owner-only permissions so a
//!   session survives process restarts.

use super::error::OtpError;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Key-value persistence used for sessions and pending challenges.
pub trait SessionStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    /// Returns `OtpError::Storage` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, OtpError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    /// Returns `OtpError::Storage` if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), OtpError>;

    /// Remove a value. Removing a missing key is not an error.
    ///
    /// # Errors
    /// Returns `OtpError::Storage` if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), OtpError>;
}

/// Names of the keys the flow reads and writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageKeys {
    pub token: String,
    pub logged_in: String,
    pub user_email: String,
    pub user_name: String,
    pub login_redirect: String,
    pub otp_code: String,
    pub otp_issued_at: String,
    pub otp_email: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            token: "auth_token".to_string(),
            logged_in: "logged_in".to_string(),
            user_email: "user_email".to_string(),
            user_name: "user_name".to_string(),
            login_redirect: "login_redirect_target".to_string(),
            otp_code: "otp_temp_code".to_string(),
            otp_issued_at: "otp_issued_at".to_string(),
            otp_email: "otp_email".to_string(),
        }
    }
}

impl StorageKeys {
    /// Prefix every key, so several apps can share one store.
    #[must_use]
    pub fn with_prefix(prefix: &str) -> Self {
        let keys = Self::default();
        let prefixed = |key: String| format!("{prefix}{key}");
        Self {
            token: prefixed(keys.token),
            logged_in: prefixed(keys.logged_in),
            user_email: prefixed(keys.user_email),
            user_name: prefixed(keys.user_name),
            login_redirect: prefixed(keys.login_redirect),
            otp_code: prefixed(keys.otp_code),
            otp_issued_at: prefixed(keys.otp_issued_at),
            otp_email: prefixed(keys.otp_email),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, OtpError> {
        self.values
            .lock()
            .map_err(|_| OtpError::Storage("memory store lock poisoned".to_string()))
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.lock().map_or(0, |values| values.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, OtpError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), OtpError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), OtpError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// JSON file backed store. Every operation re-reads the file so several
/// processes observe each other's writes.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Default location under the user's local data directory.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(env!("CARGO_PKG_NAME"))
            .join("session.json")
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, OtpError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let raw = std::fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        Ok(serde_json::from_str(&raw)?)
    }

    // The payload goes to an owner-only sibling file that is renamed over the
    // target, so readers see either the old or the new JSON.
    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<(), OtpError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let payload = serde_json::to_vec_pretty(values)?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            temp.as_file().set_permissions(perms)?;
        }

        temp.write_all(&payload)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path)
            .map_err(|e| OtpError::Storage(format!("failed to replace session store: {e}")))?;

        debug!(path = %self.path.display(), keys = values.len(), "session store written");

        Ok(())
    }

    fn update(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), OtpError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| OtpError::Storage("file store lock poisoned".to_string()))?;
        let mut values = self.read_all()?;
        apply(&mut values);
        self.write_all(&values)
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, OtpError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), OtpError> {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), OtpError> {
        if self.get(key)?.is_none() {
            return Ok(());
        }
        self.update(|values| {
            values.remove(key);
        })
    }
}
