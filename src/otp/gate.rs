//! Resend cooldown.

use super::error::OtpError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResendGate {
    last_issued_at_ms: Option<i64>,
    cooldown_ms: i64,
}

impl ResendGate {
    #[must_use]
    pub fn new(cooldown_seconds: u64) -> Self {
        Self {
            last_issued_at_ms: None,
            cooldown_ms: i64::try_from(cooldown_seconds.saturating_mul(1_000)).unwrap_or(i64::MAX),
        }
    }

    #[must_use]
    pub const fn last_issued_at_ms(&self) -> Option<i64> {
        self.last_issued_at_ms
    }

    /// Seconds left before another code may be requested, rounded up.
    #[must_use]
    pub fn remaining_seconds(&self, now_ms: i64) -> u64 {
        let Some(last) = self.last_issued_at_ms else {
            return 0;
        };
        let remaining_ms = self
            .cooldown_ms
            .saturating_sub(now_ms.saturating_sub(last));
        if remaining_ms <= 0 {
            0
        } else {
            u64::try_from(remaining_ms / 1_000 + i64::from(remaining_ms % 1_000 != 0)).unwrap_or(0)
        }
    }

    /// # Errors
    /// Returns `OtpError::CooldownActive` while the cooldown has not elapsed.
    pub fn check(&self, now_ms: i64) -> Result<(), OtpError> {
        match self.remaining_seconds(now_ms) {
            0 => Ok(()),
            remaining => Err(OtpError::CooldownActive(remaining)),
        }
    }

    pub fn start(&mut self, now_ms: i64) {
        self.last_issued_at_ms = Some(now_ms);
    }

    pub fn reset(&mut self) {
        self.last_issued_at_ms = None;
    }
}
