//! Shared reqwest plumbing with a consistent timeout and error policy, so a
//! hung call can never leave a control disabled forever.

use super::error::OtpError;
use crate::APP_USER_AGENT;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Default bound applied to every network call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Maximum number of error body characters surfaced to the user.
const MAX_ERROR_CHARS: usize = 200;

/// Build a client with the crate user agent and a request timeout.
///
/// # Errors
/// Returns `OtpError::ServiceError` if the TLS backend cannot be initialized.
pub fn build_client(timeout: Duration) -> Result<Client, OtpError> {
    Client::builder()
        .user_agent(APP_USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|err| OtpError::ServiceError(format!("Failed to build HTTP client: {err}")))
}

/// Join a base URL and a path without doubling or dropping slashes.
#[must_use]
pub fn build_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim();

    if base.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}

/// Map transport errors, keeping timeouts distinct. The URL is stripped from
/// the message since reqwest includes it verbatim.
#[must_use]
pub fn map_request_error(err: &reqwest::Error) -> OtpError {
    debug!("request error: {err:?}");
    if err.is_timeout() {
        return OtpError::Timeout;
    }

    let mut message = err.to_string();
    if let Some(url) = err.url() {
        message = message.replace(url.as_str(), "<endpoint>");
    }
    OtpError::ServiceError(message)
}

/// Trim and truncate an error body for display.
#[must_use]
pub fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}
