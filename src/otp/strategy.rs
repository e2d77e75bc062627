//! Verification strategies.
//!
//! The controller owns the lifecycle (expiry, email binding, resend gate,
//! persistence); a strategy only knows how to get a code to the user and how
//! to decide whether a submitted code is right.

use super::{
    challenge::{generate_code, OtpChallenge},
    dispatch::EmailDispatcher,
    error::OtpError,
    remote::{AuthClient, VerifyOutcome},
};
use async_trait::async_trait;
use rand::{rngs::StdRng, SeedableRng};
use secrecy::SecretString;
use std::{fmt, str::FromStr, sync::Arc, sync::Mutex};
use tracing::debug;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VerificationMode {
    #[default]
    Local,
    Remote,
}

impl VerificationMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for VerificationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(format!("unknown verification mode: {other}")),
        }
    }
}

#[async_trait]
pub trait VerificationStrategy: Send + Sync {
    fn mode(&self) -> VerificationMode;

    /// Get a fresh code to `email`. Returns the code when the client must
    /// remember it (local mode).
    ///
    /// # Errors
    /// Returns the dispatcher's error when delivery fails.
    async fn issue(&self, email: &str) -> Result<Option<String>, OtpError>;

    /// Check `code` against the live, unexpired `challenge`. Returns the
    /// session token when the verifier issues one.
    ///
    /// # Errors
    /// Returns `OtpError::IncorrectCode` when the code does not match.
    async fn verify(
        &self,
        challenge: &OtpChallenge,
        email: &str,
        code: &str,
    ) -> Result<Option<SecretString>, OtpError>;
}

/// Client-generated code, compared locally.
pub struct LocalStrategy {
    dispatcher: Arc<dyn EmailDispatcher>,
    rng: Mutex<StdRng>,
}

impl LocalStrategy {
    #[must_use]
    pub fn new(dispatcher: Arc<dyn EmailDispatcher>) -> Self {
        Self {
            dispatcher,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic codes, for tests.
    #[must_use]
    pub fn with_seed(dispatcher: Arc<dyn EmailDispatcher>, seed: u64) -> Self {
        Self {
            dispatcher,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn next_code(&self) -> Result<String, OtpError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| OtpError::ServiceError("code generator lock poisoned".to_string()))?;
        Ok(generate_code(&mut *rng))
    }
}

#[async_trait]
impl VerificationStrategy for LocalStrategy {
    fn mode(&self) -> VerificationMode {
        VerificationMode::Local
    }

    async fn issue(&self, email: &str) -> Result<Option<String>, OtpError> {
        let code = self.next_code()?;
        self.dispatcher.send(email, Some(&code)).await?;
        Ok(Some(code))
    }

    async fn verify(
        &self,
        challenge: &OtpChallenge,
        _email: &str,
        code: &str,
    ) -> Result<Option<SecretString>, OtpError> {
        match challenge.code.as_deref() {
            None => Err(OtpError::NoActiveChallenge),
            Some(stored) if stored == code => Ok(None),
            Some(_) => {
                debug!("submitted code does not match");
                Err(OtpError::IncorrectCode(None))
            }
        }
    }
}

/// Server-issued code, verified by the auth API.
#[derive(Clone, Debug)]
pub struct RemoteStrategy {
    client: AuthClient,
}

impl RemoteStrategy {
    #[must_use]
    pub const fn new(client: AuthClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl VerificationStrategy for RemoteStrategy {
    fn mode(&self) -> VerificationMode {
        VerificationMode::Remote
    }

    async fn issue(&self, email: &str) -> Result<Option<String>, OtpError> {
        self.client.send(email, None).await?;
        Ok(None)
    }

    async fn verify(
        &self,
        _challenge: &OtpChallenge,
        email: &str,
        code: &str,
    ) -> Result<Option<SecretString>, OtpError> {
        match self.client.verify_email_otp(email, code).await? {
            VerifyOutcome::Verified(token) => Ok(Some(token)),
            VerifyOutcome::Rejected(message) => Err(OtpError::IncorrectCode(message)),
        }
    }
}
