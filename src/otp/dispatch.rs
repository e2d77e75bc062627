//! Email delivery of one-time passcodes.
//!
//! In local mode the client generates the code and hands it to an
//! `EmailDispatcher`. In remote mode the auth API generates and emails the
//! code itself; `AuthClient` implements the same trait and is called without
//! a code.

use super::{
    error::OtpError,
    http::{build_client, map_request_error, sanitize_body},
};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

pub const EMAILJS_ENDPOINT: &str = "https://api.emailjs.com/api/v1.0/email/send";

#[async_trait]
pub trait EmailDispatcher: Send + Sync {
    /// Deliver `code` to `recipient`, or trigger server-side issuance when
    /// `code` is `None`.
    ///
    /// # Errors
    /// Returns `OtpError::DispatchFailed` when delivery is refused and
    /// `OtpError::Timeout` when the call does not complete in time.
    async fn send(&self, recipient: &str, code: Option<&str>) -> Result<(), OtpError>;
}

/// Development dispatcher that logs the code instead of emailing it.
#[derive(Clone, Debug, Default)]
pub struct LogEmailDispatcher;

#[async_trait]
impl EmailDispatcher for LogEmailDispatcher {
    async fn send(&self, recipient: &str, code: Option<&str>) -> Result<(), OtpError> {
        info!(
            to_email = %recipient,
            otp = code.unwrap_or("<server issued>"),
            "email dispatch stub"
        );
        Ok(())
    }
}

/// Settings for an EmailJS-style template mail API.
#[derive(Clone, Debug)]
pub struct EmailApiConfig {
    pub endpoint: Url,
    pub service_id: String,
    pub template_id: String,
    pub public_key: SecretString,
}

#[derive(Serialize)]
struct TemplateParams<'a> {
    email: &'a str,
    otp: &'a str,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    template_params: TemplateParams<'a>,
}

#[derive(Clone, Debug)]
pub struct HttpEmailDispatcher {
    client: Client,
    config: EmailApiConfig,
}

impl HttpEmailDispatcher {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: EmailApiConfig, timeout: Duration) -> Result<Self, OtpError> {
        Ok(Self {
            client: build_client(timeout)?,
            config,
        })
    }
}

#[async_trait]
impl EmailDispatcher for HttpEmailDispatcher {
    #[instrument(skip(self, code), fields(service_id = %self.config.service_id))]
    async fn send(&self, recipient: &str, code: Option<&str>) -> Result<(), OtpError> {
        let Some(code) = code else {
            return Err(OtpError::DispatchFailed(
                "template mail API needs a client generated code".to_string(),
            ));
        };

        let request = SendRequest {
            service_id: &self.config.service_id,
            template_id: &self.config.template_id,
            user_id: self.config.public_key.expose_secret(),
            template_params: TemplateParams {
                email: recipient,
                otp: code,
            },
        };

        let response = self
            .client
            .post(self.config.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|err| match map_request_error(&err) {
                OtpError::Timeout => OtpError::Timeout,
                other => OtpError::DispatchFailed(other.to_string()),
            })?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(OtpError::DispatchFailed(format!(
            "{} - {}",
            status.as_u16(),
            sanitize_body(&body)
        )))
    }
}
