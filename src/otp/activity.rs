//! Best-effort login activity notification. Runs detached; failures are
//! logged at debug level and otherwise ignored.

use super::{
    error::OtpError,
    http::{build_client, build_url},
};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, Instrument};

pub const ACTIVITY_PATH: &str = "/profile/activity";

#[derive(Clone, Debug)]
pub struct ActivityLogger {
    client: Client,
    base_url: String,
}

impl ActivityLogger {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, OtpError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim().to_string(),
        })
    }

    /// Fire and forget. The handle is returned only so tests can wait on it.
    pub fn log_login(&self, token: &SecretString) -> JoinHandle<()> {
        let request = self
            .client
            .post(build_url(&self.base_url, ACTIVITY_PATH))
            .bearer_auth(token.expose_secret())
            .json(&json!({
                "type": "login",
                "description": "Logged in via OTP",
            }));

        tokio::spawn(
            async move {
                match request.send().await {
                    Ok(response) if response.status().is_success() => {
                        debug!("login activity recorded");
                    }
                    Ok(response) => {
                        debug!(status = %response.status(), "login activity rejected");
                    }
                    Err(err) => {
                        debug!("login activity failed: {err}");
                    }
                }
            }
            .instrument(tracing::debug_span!("activity_log")),
        )
    }
}
