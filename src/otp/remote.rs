//! Client for the auth API endpoints used in remote mode. The server is
//! authoritative for code validity; payloads carry codes and tokens and must
//! never be logged.

use super::{
    dispatch::EmailDispatcher,
    error::OtpError,
    http::{build_client, build_url, map_request_error, sanitize_body},
};
use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::SecretString;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

pub const VERIFY_PATH: &str = "/auth/verify-email-otp";
pub const RESEND_PATH: &str = "/auth/resend-otp";

#[derive(Serialize)]
struct VerifyRequest<'a> {
    email: &'a str,
    otp: &'a str,
}

#[derive(Serialize)]
struct ResendRequest<'a> {
    email: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    success: bool,
    token: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ResendResponse {
    #[serde(default)]
    success: bool,
    message: Option<String>,
}

/// Result of a verification round trip that reached the server.
#[derive(Debug)]
pub enum VerifyOutcome {
    Verified(SecretString),
    Rejected(Option<String>),
}

#[derive(Clone, Debug)]
pub struct AuthClient {
    client: Client,
    base_url: String,
}

impl AuthClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, OtpError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim().to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the server to check `otp` for `email`.
    ///
    /// # Errors
    /// Returns `OtpError::ServiceError` on transport failures or malformed
    /// responses and `OtpError::Timeout` when the call does not complete.
    #[instrument(skip(self, otp))]
    pub async fn verify_email_otp(&self, email: &str, otp: &str) -> Result<VerifyOutcome, OtpError> {
        let response = self
            .client
            .post(build_url(&self.base_url, VERIFY_PATH))
            .json(&VerifyRequest { email, otp })
            .send()
            .await
            .map_err(|err| map_request_error(&err))?;

        let body: VerifyResponse = parse_body(response).await?;

        if !body.success {
            debug!("verification rejected by server");
            return Ok(VerifyOutcome::Rejected(body.message));
        }

        match body.token.filter(|token| !token.trim().is_empty()) {
            Some(token) => Ok(VerifyOutcome::Verified(SecretString::from(token))),
            None => Err(OtpError::ServiceError(
                "verification succeeded without a session token".to_string(),
            )),
        }
    }

    /// Ask the server to issue and email a fresh code.
    ///
    /// # Errors
    /// Returns `OtpError::DispatchFailed` when the server refuses,
    /// `OtpError::ServiceError` on transport failures and `OtpError::Timeout`
    /// when the call does not complete.
    #[instrument(skip(self))]
    pub async fn resend_otp(&self, email: &str) -> Result<(), OtpError> {
        let response = self
            .client
            .post(build_url(&self.base_url, RESEND_PATH))
            .json(&ResendRequest { email })
            .send()
            .await
            .map_err(|err| map_request_error(&err))?;

        let body: ResendResponse = parse_body(response).await?;

        if body.success {
            Ok(())
        } else {
            Err(OtpError::DispatchFailed(
                body.message
                    .unwrap_or_else(|| "Failed to send OTP.".to_string()),
            ))
        }
    }
}

#[async_trait]
impl EmailDispatcher for AuthClient {
    async fn send(&self, recipient: &str, _code: Option<&str>) -> Result<(), OtpError> {
        self.resend_otp(recipient).await
    }
}

/// The API answers `{success, message}` on 4xx as well, so the body is parsed
/// before the status is looked at.
async fn parse_body<T: DeserializeOwned>(response: Response) -> Result<T, OtpError> {
    let status = response.status();
    let text = response.text().await.map_err(|err| map_request_error(&err))?;

    match serde_json::from_str::<T>(&text) {
        Ok(body) => Ok(body),
        Err(_) if !status.is_success() => Err(OtpError::ServiceError(format!(
            "{} - {}",
            status.as_u16(),
            sanitize_body(&text)
        ))),
        Err(err) => Err(OtpError::ServiceError(format!(
            "Failed to decode response: {err}"
        ))),
    }
}
