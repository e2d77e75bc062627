//! The pending one-time passcode and its persistence in the session store.

use super::{
    error::OtpError,
    store::{SessionStore, StorageKeys},
};
use rand::Rng;
use std::fmt;

/// Smallest and largest code that can be issued; every code has six digits.
const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

/// Draw a six-digit decimal code uniformly from `100000..=999999`.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(CODE_MIN..=CODE_MAX).to_string()
}

/// The single active challenge. `code` is only known client-side in local
/// mode; in remote mode the record only carries the timing bookkeeping.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpChallenge {
    pub email: String,
    pub code: Option<String>,
    pub issued_at_ms: i64,
}

impl fmt::Debug for OtpChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtpChallenge")
            .field("email", &self.email)
            .field("code", &self.code.as_ref().map(|_| "[REDACTED]"))
            .field("issued_at_ms", &self.issued_at_ms)
            .finish()
    }
}

impl OtpChallenge {
    #[must_use]
    pub fn new(email: &str, code: Option<String>, issued_at_ms: i64) -> Self {
        Self {
            email: email.to_string(),
            code,
            issued_at_ms,
        }
    }

    #[must_use]
    pub fn elapsed_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.issued_at_ms)
    }

    /// A challenge issued at `T` is usable in `[T, T + ttl)`.
    #[must_use]
    pub fn is_expired(&self, now_ms: i64, ttl_ms: i64) -> bool {
        self.elapsed_ms(now_ms) >= ttl_ms
    }

    /// Load the stored challenge. A missing or unparsable issuance timestamp
    /// reads as "no challenge".
    ///
    /// # Errors
    /// Returns `OtpError::Storage` if the store cannot be read.
    pub fn load(store: &dyn SessionStore, keys: &StorageKeys) -> Result<Option<Self>, OtpError> {
        let Some(issued_at_ms) = store
            .get(&keys.otp_issued_at)?
            .and_then(|value| value.trim().parse::<i64>().ok())
        else {
            return Ok(None);
        };

        let email = store.get(&keys.otp_email)?.unwrap_or_default();
        let code = store.get(&keys.otp_code)?;

        Ok(Some(Self {
            email,
            code,
            issued_at_ms,
        }))
    }

    /// Persist this challenge, overwriting whatever was there before.
    ///
    /// # Errors
    /// Returns `OtpError::Storage` if the store cannot be written.
    pub fn save(&self, store: &dyn SessionStore, keys: &StorageKeys) -> Result<(), OtpError> {
        match &self.code {
            Some(code) => store.set(&keys.otp_code, code)?,
            None => store.remove(&keys.otp_code)?,
        }
        store.set(&keys.otp_email, &self.email)?;
        store.set(&keys.otp_issued_at, &self.issued_at_ms.to_string())
    }

    /// Remove every trace of the pending challenge.
    ///
    /// # Errors
    /// Returns `OtpError::Storage` if the store cannot be written.
    pub fn discard(store: &dyn SessionStore, keys: &StorageKeys) -> Result<(), OtpError> {
        store.remove(&keys.otp_code)?;
        store.remove(&keys.otp_issued_at)?;
        store.remove(&keys.otp_email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp::store::MemoryStore;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn generated_codes_have_six_digits() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let code = generate_code(&mut rng);
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert!(!code.starts_with('0'));
        }
    }

    #[test]
    fn expiry_window_is_half_open() {
        let challenge = OtpChallenge::new("user@example.com", None, 1_000);
        assert!(!challenge.is_expired(1_000, 300_000));
        assert!(!challenge.is_expired(300_999, 300_000));
        assert!(challenge.is_expired(301_000, 300_000));
    }

    #[test]
    fn save_load_discard() {
        let store = MemoryStore::new();
        let keys = StorageKeys::default();

        assert_eq!(OtpChallenge::load(&store, &keys).unwrap(), None);

        let challenge = OtpChallenge::new("user@example.com", Some("123456".to_string()), 42);
        challenge.save(&store, &keys).unwrap();
        assert_eq!(OtpChallenge::load(&store, &keys).unwrap(), Some(challenge));

        // a newer remote-mode challenge must not keep the old code around
        let newer = OtpChallenge::new("user@example.com", None, 43);
        newer.save(&store, &keys).unwrap();
        assert_eq!(store.get(&keys.otp_code).unwrap(), None);

        OtpChallenge::discard(&store, &keys).unwrap();
        assert_eq!(OtpChallenge::load(&store, &keys).unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn unparsable_timestamp_reads_as_absent() {
        let store = MemoryStore::new();
        let keys = StorageKeys::default();
        store.set(&keys.otp_code, "123456").unwrap();
        store.set(&keys.otp_issued_at, "yesterday").unwrap();
        assert_eq!(OtpChallenge::load(&store, &keys).unwrap(), None);
    }

    #[test]
    fn debug_redacts_code() {
        let challenge = OtpChallenge::new("user@example.com", Some("123456".to_string()), 0);
        let rendered = format!("{challenge:?}");
        assert!(!rendered.contains("123456"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
