pub mod activity;
pub mod challenge;
pub mod clock;
pub mod controller;
pub mod countdown;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod http;
pub mod remote;
pub mod session;
pub mod status;
pub mod store;
pub mod strategy;

pub use self::activity::ActivityLogger;
pub use self::challenge::OtpChallenge;
pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::controller::{Authenticated, OtpConfig, OtpSessionController, OtpState};
pub use self::dispatch::{EmailApiConfig, EmailDispatcher, HttpEmailDispatcher, LogEmailDispatcher};
pub use self::error::OtpError;
pub use self::remote::AuthClient;
pub use self::session::Session;
pub use self::status::{StatusBoard, StatusKind, StatusMessage};
pub use self::store::{FileStore, MemoryStore, SessionStore, StorageKeys};
pub use self::strategy::{LocalStrategy, RemoteStrategy, VerificationMode, VerificationStrategy};

use regex::Regex;
use std::time::Duration;

/// How long an issued code stays valid.
pub const CODE_TTL: Duration = Duration::from_secs(5 * 60);
/// Minimum spacing between two code requests.
pub const RESEND_COOLDOWN_SECONDS: u64 = 30;

/// `local-part@domain.tld` made of ASCII word characters, dots and hyphens.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9_.-]+@[A-Za-z0-9_.-]+\.[A-Za-z0-9_-]+$")
        .map_or(false, |re| re.is_match(email))
}

/// Trim and validate an email address.
///
/// # Errors
/// Returns `OtpError::InvalidEmail` for empty or malformed input.
pub fn normalize_email(email: &str) -> Result<String, OtpError> {
    let email = email.trim();
    if email.is_empty() || !valid_email(email) {
        return Err(OtpError::InvalidEmail);
    }
    Ok(email.to_string())
}
