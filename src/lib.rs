//! # otpgate (One-Time Passcode Email Login)
//!
//! `otpgate` drives a passwordless email login: it requests a one-time
//! passcode for an address, verifies the code the user types back, enforces a
//! resend cooldown and persists the authenticated session in a key-value
//! session store.
//!
//! ## Lifecycle
//!
//! `Idle` -> `AwaitingCode` -> `Authenticated`. A challenge is valid for five
//! minutes after issuance and a new code can only be requested once the
//! 30-second resend gate has elapsed. Expired challenges are discarded the
//! first time they are looked at.
//!
//! ## Verification modes
//!
//! - **Local:** the client generates the code, hands it to the email
//!   dispatcher and compares the submitted code itself.
//! - **Remote:** the auth API issues and emails the code; verification is a
//!   `POST /auth/verify-email-otp` round trip and the server is authoritative.
//!
//! Both modes sit behind the same [`otp::VerificationStrategy`] trait and are
//! driven by one [`otp::OtpSessionController`].

pub mod cli;
pub mod otp;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
