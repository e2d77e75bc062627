use thiserror::Error;

/// Failures surfaced by the login flow. None of them is fatal: every variant
/// leaves the controller in a state where the user can retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OtpError {
    #[error("Please enter a valid email address.")]
    InvalidEmail,
    #[error("Please enter the code from your email.")]
    MissingCode,
    #[error("Failed to send OTP: {0}")]
    DispatchFailed(String),
    #[error("No active code. Please request a new one.")]
    NoActiveChallenge,
    #[error("Code expired. Please request a new one.")]
    Expired,
    #[error("{}", .0.as_deref().unwrap_or("Incorrect code."))]
    IncorrectCode(Option<String>),
    #[error("Please wait {0}s before requesting another code.")]
    CooldownActive(u64),
    #[error("Unable to reach the server: {0}")]
    ServiceError(String),
    #[error("Request timed out. Please try again.")]
    Timeout,
    #[error("A request is already in progress.")]
    InFlight,
    #[error("Session storage error: {0}")]
    Storage(String),
}

impl OtpError {
    /// Errors caused by missing input or an active cooldown are warnings; they
    /// clear on their own like info messages do.
    #[must_use]
    pub const fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::MissingCode | Self::CooldownActive(_) | Self::InFlight
        )
    }
}

impl From<serde_json::Error> for OtpError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<std::io::Error> for OtpError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
