//! Authenticated session and how it is laid out in the session store.

use super::{
    error::OtpError,
    store::{SessionStore, StorageKeys},
};
use secrecy::{ExposeSecret, SecretString};

/// Landing page used when no deferred redirect target was stored.
pub const DEFAULT_LANDING: &str = "index.html";

#[derive(Clone, Debug)]
pub struct Session {
    /// Bearer token issued by the auth API; absent in local mode.
    pub token: Option<SecretString>,
    pub email: String,
    pub display_name: Option<String>,
    pub logged_in: bool,
}

impl Session {
    #[must_use]
    pub fn new(email: &str, token: Option<SecretString>) -> Self {
        Self {
            token,
            email: email.to_string(),
            display_name: None,
            logged_in: true,
        }
    }

    /// Write the session. Any token from an earlier login is dropped when this
    /// session has none, so a local login never inherits a stale bearer token.
    ///
    /// # Errors
    /// Returns `OtpError::Storage` if the store cannot be written.
    pub fn persist(&self, store: &dyn SessionStore, keys: &StorageKeys) -> Result<(), OtpError> {
        match &self.token {
            Some(token) => store.set(&keys.token, token.expose_secret())?,
            None => store.remove(&keys.token)?,
        }
        store.set(&keys.logged_in, if self.logged_in { "true" } else { "false" })?;
        store.set(&keys.user_email, &self.email)?;
        if let Some(name) = &self.display_name {
            store.set(&keys.user_name, name)?;
        }
        Ok(())
    }

    /// Read back a persisted session, `None` unless the logged-in flag is set.
    ///
    /// # Errors
    /// Returns `OtpError::Storage` if the store cannot be read.
    pub fn load(store: &dyn SessionStore, keys: &StorageKeys) -> Result<Option<Self>, OtpError> {
        if store.get(&keys.logged_in)?.as_deref() != Some("true") {
            return Ok(None);
        }

        let Some(email) = store.get(&keys.user_email)? else {
            return Ok(None);
        };

        Ok(Some(Self {
            token: store.get(&keys.token)?.map(SecretString::from),
            email,
            display_name: store.get(&keys.user_name)?,
            logged_in: true,
        }))
    }
}

/// Take the deferred post-login target out of the store, falling back to
/// `default_target`.
///
/// # Errors
/// Returns `OtpError::Storage` if the store cannot be accessed.
pub fn take_redirect(
    store: &dyn SessionStore,
    keys: &StorageKeys,
    default_target: &str,
) -> Result<String, OtpError> {
    let target = store
        .get(&keys.login_redirect)?
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    store.remove(&keys.login_redirect)?;

    Ok(target.unwrap_or_else(|| default_target.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp::store::MemoryStore;

    #[test]
    fn persist_and_load() {
        let store = MemoryStore::new();
        let keys = StorageKeys::default();

        let session = Session::new("user@example.com", Some(SecretString::from("tok".to_string())));
        session.persist(&store, &keys).unwrap();

        assert_eq!(store.get(&keys.logged_in).unwrap(), Some("true".to_string()));
        let loaded = Session::load(&store, &keys).unwrap().unwrap();
        assert_eq!(loaded.email, "user@example.com");
        assert_eq!(
            loaded.token.as_ref().map(|t| t.expose_secret().to_string()),
            Some("tok".to_string())
        );
        assert_eq!(loaded.display_name, None);
    }

    #[test]
    fn local_session_drops_stale_token() {
        let store = MemoryStore::new();
        let keys = StorageKeys::default();
        store.set(&keys.token, "old").unwrap();

        Session::new("user@example.com", None)
            .persist(&store, &keys)
            .unwrap();
        assert_eq!(store.get(&keys.token).unwrap(), None);
    }

    #[test]
    fn load_requires_logged_in_flag() {
        let store = MemoryStore::new();
        let keys = StorageKeys::default();
        store.set(&keys.user_email, "user@example.com").unwrap();
        assert!(Session::load(&store, &keys).unwrap().is_none());
    }

    #[test]
    fn redirect_is_taken_once() {
        let store = MemoryStore::new();
        let keys = StorageKeys::default();
        store.set(&keys.login_redirect, "profile.html").unwrap();

        assert_eq!(
            take_redirect(&store, &keys, DEFAULT_LANDING).unwrap(),
            "profile.html"
        );
        assert_eq!(
            take_redirect(&store, &keys, DEFAULT_LANDING).unwrap(),
            DEFAULT_LANDING
        );
    }
}
