//! OTP session controller: the login lifecycle state machine.
//!
//! `Idle` --request--> `AwaitingCode` --verify--> `Authenticated`
//!
//! - Dispatch completes before any state changes; a failed dispatch leaves the
//!   controller where it was and the resend gate untouched.
//! - An expired challenge is discarded the first time it is looked at.
//! - A wrong code in local mode keeps the challenge so the user can retry.
//! - Request, resend and verify share one in-flight flag; overlapping calls
//!   fail fast with `OtpError::InFlight`.
//! - Every network call is bounded by `OtpConfig::request_timeout`.

use super::{
    activity::ActivityLogger,
    challenge::OtpChallenge,
    clock::Clock,
    countdown::Countdown,
    error::OtpError,
    gate::ResendGate,
    http::DEFAULT_TIMEOUT,
    normalize_email,
    session::{take_redirect, Session, DEFAULT_LANDING},
    store::{SessionStore, StorageKeys},
    strategy::{VerificationMode, VerificationStrategy},
    valid_email, CODE_TTL, RESEND_COOLDOWN_SECONDS,
};
use std::future::Future;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};
use std::time::Duration;
use tokio::{sync::watch, time::timeout};
use tracing::{info, instrument, warn};

#[derive(Clone, Debug)]
pub struct OtpConfig {
    code_ttl: Duration,
    resend_cooldown_seconds: u64,
    request_timeout: Duration,
    landing_page: String,
    keys: StorageKeys,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl OtpConfig {
    /// Five-minute codes, 30-second resend cooldown, 10-second network bound.
    #[must_use]
    pub fn new() -> Self {
        Self {
            code_ttl: CODE_TTL,
            resend_cooldown_seconds: RESEND_COOLDOWN_SECONDS,
            request_timeout: DEFAULT_TIMEOUT,
            landing_page: DEFAULT_LANDING.to_string(),
            keys: StorageKeys::default(),
        }
    }

    #[must_use]
    pub fn with_code_ttl(mut self, ttl: Duration) -> Self {
        self.code_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_resend_cooldown_seconds(mut self, seconds: u64) -> Self {
        self.resend_cooldown_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    #[must_use]
    pub fn with_landing_page(mut self, landing_page: String) -> Self {
        self.landing_page = landing_page;
        self
    }

    #[must_use]
    pub fn with_keys(mut self, keys: StorageKeys) -> Self {
        self.keys = keys;
        self
    }

    #[must_use]
    pub fn code_ttl(&self) -> Duration {
        self.code_ttl
    }

    #[must_use]
    pub fn resend_cooldown_seconds(&self) -> u64 {
        self.resend_cooldown_seconds
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub fn landing_page(&self) -> &str {
        &self.landing_page
    }

    #[must_use]
    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    fn code_ttl_ms(&self) -> i64 {
        i64::try_from(self.code_ttl.as_millis()).unwrap_or(i64::MAX)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OtpState {
    Idle,
    AwaitingCode,
    Authenticated,
}

/// A successful login: the stored session and where to go next.
#[derive(Clone, Debug)]
pub struct Authenticated {
    pub session: Session,
    pub redirect_to: String,
}

#[derive(Debug)]
struct Inner {
    state: OtpState,
    gate: ResendGate,
}

/// Releases the in-flight flag on every exit path.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct OtpSessionController {
    config: OtpConfig,
    strategy: Arc<dyn VerificationStrategy>,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    activity: Option<ActivityLogger>,
    inner: Mutex<Inner>,
    countdown: Countdown,
    countdown_pending: AtomicBool,
    in_flight: AtomicBool,
}

impl OtpSessionController {
    /// Build a controller. A live challenge left in the store by an earlier
    /// run is picked up: the state resumes at `AwaitingCode` and the resend
    /// gate counts from its issuance time. Its countdown starts on the first
    /// use inside a tokio runtime.
    ///
    /// # Errors
    /// Returns `OtpError::Storage` if the store cannot be read.
    pub fn new(
        config: OtpConfig,
        strategy: Arc<dyn VerificationStrategy>,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, OtpError> {
        let mut inner = Inner {
            state: OtpState::Idle,
            gate: ResendGate::new(config.resend_cooldown_seconds),
        };

        let mut resumed = false;
        if let Some(challenge) = OtpChallenge::load(store.as_ref(), &config.keys)? {
            if !challenge.is_expired(clock.now_ms(), config.code_ttl_ms()) {
                inner.gate.start(challenge.issued_at_ms);
                inner.state = OtpState::AwaitingCode;
                resumed = true;
            }
        }

        Ok(Self {
            config,
            strategy,
            store,
            clock,
            activity: None,
            inner: Mutex::new(inner),
            countdown: Countdown::new(),
            countdown_pending: AtomicBool::new(resumed),
            in_flight: AtomicBool::new(false),
        })
    }

    /// Notify the activity endpoint after remote-mode logins.
    #[must_use]
    pub fn with_activity_logger(mut self, activity: ActivityLogger) -> Self {
        self.activity = Some(activity);
        self
    }

    #[must_use]
    pub fn mode(&self) -> VerificationMode {
        self.strategy.mode()
    }

    #[must_use]
    pub fn config(&self) -> &OtpConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> OtpState {
        self.lock_inner().map_or(OtpState::Idle, |inner| inner.state)
    }

    /// Whether a request, resend or verify call is currently running.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Visible resend countdown in seconds.
    #[must_use]
    pub fn countdown(&self) -> watch::Receiver<u64> {
        self.resume_countdown();
        self.countdown.subscribe()
    }

    #[must_use]
    pub fn resend_remaining_seconds(&self) -> u64 {
        let now = self.clock.now_ms();
        self.lock_inner()
            .map_or(0, |inner| inner.gate.remaining_seconds(now))
    }

    #[must_use]
    pub fn resend_available(&self) -> bool {
        self.resend_remaining_seconds() == 0
    }

    /// Email bound to the pending challenge, if any.
    ///
    /// # Errors
    /// Returns `OtpError::Storage` if the store cannot be read.
    pub fn pending_email(&self) -> Result<Option<String>, OtpError> {
        Ok(self
            .live_challenge()?
            .map(|challenge| challenge.email)
            .filter(|email| !email.is_empty()))
    }

    /// The persisted session, if the user is logged in.
    ///
    /// # Errors
    /// Returns `OtpError::Storage` if the store cannot be read.
    pub fn current_session(&self) -> Result<Option<Session>, OtpError> {
        Session::load(self.store.as_ref(), &self.config.keys)
    }

    /// Request a code for `email`.
    ///
    /// # Errors
    /// `InvalidEmail` for malformed input, `InFlight` when another call is
    /// running, `DispatchFailed`, `ServiceError` or `Timeout` when delivery
    /// fails, `Storage` when the challenge cannot be persisted.
    #[instrument(skip(self))]
    pub async fn request_otp(&self, email: &str) -> Result<(), OtpError> {
        let email = normalize_email(email)?;
        let _guard = self.begin()?;
        self.issue(&email).await
    }

    /// Request another code once the resend cooldown has elapsed.
    ///
    /// # Errors
    /// `CooldownActive` while the gate is closed; otherwise as `request_otp`.
    #[instrument(skip(self))]
    pub async fn resend_otp(&self, email: &str) -> Result<(), OtpError> {
        let _guard = self.begin()?;

        let now = self.clock.now_ms();
        self.lock_inner()?.gate.check(now)?;

        let email = normalize_email(email)?;
        self.issue(&email).await
    }

    /// Verify a submitted code. In local mode `email` may be empty, in which
    /// case the email bound to the challenge is used.
    ///
    /// # Errors
    /// `MissingCode`, `InvalidEmail`, `InFlight`, `NoActiveChallenge`,
    /// `Expired`, `IncorrectCode`, `ServiceError`, `Timeout` or `Storage`.
    #[instrument(skip(self, code))]
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<Authenticated, OtpError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(OtpError::MissingCode);
        }

        let email = email.trim();
        if email.is_empty() {
            if self.mode() == VerificationMode::Remote {
                return Err(OtpError::InvalidEmail);
            }
        } else if !valid_email(email) {
            return Err(OtpError::InvalidEmail);
        }

        let _guard = self.begin()?;

        let store = self.store.as_ref();
        let keys = &self.config.keys;

        let Some(challenge) = OtpChallenge::load(store, keys)? else {
            return Err(OtpError::NoActiveChallenge);
        };

        if challenge.is_expired(self.clock.now_ms(), self.config.code_ttl_ms()) {
            OtpChallenge::discard(store, keys)?;
            self.lock_inner()?.state = OtpState::Idle;
            self.countdown.cancel();
            info!("discarded expired challenge");
            return Err(OtpError::Expired);
        }

        let email = if email.is_empty() {
            challenge.email.clone()
        } else {
            email.to_string()
        };
        if email.is_empty()
            || (!challenge.email.is_empty() && !challenge.email.eq_ignore_ascii_case(&email))
        {
            warn!("verification email does not match the pending challenge");
            return Err(OtpError::NoActiveChallenge);
        }

        let token = self
            .bounded(self.strategy.verify(&challenge, &email, code))
            .await?;

        OtpChallenge::discard(store, keys)?;

        let mut session = Session::new(&email, token);
        session.display_name = store.get(&keys.user_name)?;
        session.persist(store, keys)?;

        let redirect_to = take_redirect(store, keys, &self.config.landing_page)?;

        {
            let mut inner = self.lock_inner()?;
            inner.gate.reset();
            inner.state = OtpState::Authenticated;
        }
        self.countdown.cancel();

        if let (Some(activity), Some(token)) = (&self.activity, &session.token) {
            activity.log_login(token);
        }

        info!(mode = %self.mode(), "login successful");

        Ok(Authenticated {
            session,
            redirect_to,
        })
    }

    /// Whether the UI should offer to collect a display name.
    ///
    /// # Errors
    /// Returns `OtpError::Storage` if the store cannot be read.
    pub fn needs_display_name(&self) -> Result<bool, OtpError> {
        Ok(self
            .store
            .get(&self.config.keys.user_name)?
            .map_or(true, |name| name.trim().is_empty()))
    }

    /// Store a display name; blank input is ignored. Returns whether a name
    /// was stored.
    ///
    /// # Errors
    /// Returns `OtpError::Storage` if the store cannot be written.
    pub fn set_display_name(&self, name: &str) -> Result<bool, OtpError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(false);
        }
        self.store.set(&self.config.keys.user_name, name)?;
        Ok(true)
    }

    /// Back to `Idle`: countdown stopped, gate open, pending challenge gone.
    /// A persisted session is left alone.
    ///
    /// # Errors
    /// Returns `OtpError::Storage` if the store cannot be written.
    pub fn reset(&self) -> Result<(), OtpError> {
        self.countdown_pending.store(false, Ordering::SeqCst);
        self.countdown.cancel();
        {
            let mut inner = self.lock_inner()?;
            inner.gate.reset();
            inner.state = OtpState::Idle;
        }
        OtpChallenge::discard(self.store.as_ref(), &self.config.keys)
    }

    async fn issue(&self, email: &str) -> Result<(), OtpError> {
        let code = self
            .bounded(self.strategy.issue(email))
            .await
            .inspect_err(|err| warn!("otp dispatch failed: {err}"))?;

        let now = self.clock.now_ms();
        OtpChallenge::new(email, code, now).save(self.store.as_ref(), &self.config.keys)?;

        {
            let mut inner = self.lock_inner()?;
            inner.gate.start(now);
            inner.state = OtpState::AwaitingCode;
        }
        self.countdown.start(self.config.resend_cooldown_seconds);

        info!(mode = %self.mode(), "otp issued");

        Ok(())
    }

    fn live_challenge(&self) -> Result<Option<OtpChallenge>, OtpError> {
        let now = self.clock.now_ms();
        Ok(OtpChallenge::load(self.store.as_ref(), &self.config.keys)?
            .filter(|challenge| !challenge.is_expired(now, self.config.code_ttl_ms())))
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, OtpError>>,
    ) -> Result<T, OtpError> {
        timeout(self.config.request_timeout, call)
            .await
            .map_err(|_| OtpError::Timeout)?
    }

    // Spawning the ticker needs a runtime, which `new` may not have.
    fn resume_countdown(&self) {
        if tokio::runtime::Handle::try_current().is_err() {
            return;
        }
        if self.countdown_pending.swap(false, Ordering::SeqCst) {
            let remaining = self.resend_remaining_seconds();
            info!(remaining, "resumed resend countdown");
            self.countdown.start(remaining);
        }
    }

    fn begin(&self) -> Result<InFlightGuard<'_>, OtpError> {
        self.resume_countdown();
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| OtpError::InFlight)?;
        Ok(InFlightGuard(&self.in_flight))
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, Inner>, OtpError> {
        self.inner
            .lock()
            .map_err(|_| OtpError::Storage("controller state lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp::{
        clock::ManualClock, dispatch::EmailDispatcher, store::MemoryStore,
        strategy::LocalStrategy,
    };
    use async_trait::async_trait;
    use tokio::time::sleep;

    #[derive(Default)]
    struct RecordingDispatcher {
        sent: Mutex<Vec<(String, Option<String>)>>,
        fail: AtomicBool,
        delay: Option<Duration>,
    }

    impl RecordingDispatcher {
        fn sent(&self) -> Vec<(String, Option<String>)> {
            self.sent.lock().unwrap().clone()
        }

        fn last_code(&self) -> String {
            self.sent().last().and_then(|(_, code)| code.clone()).unwrap()
        }
    }

    #[async_trait]
    impl EmailDispatcher for RecordingDispatcher {
        async fn send(&self, recipient: &str, code: Option<&str>) -> Result<(), OtpError> {
            if let Some(delay) = self.delay {
                sleep(delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(OtpError::DispatchFailed("mailbox unavailable".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((recipient.to_string(), code.map(ToString::to_string)));
            Ok(())
        }
    }

    struct Harness {
        controller: Arc<OtpSessionController>,
        dispatcher: Arc<RecordingDispatcher>,
        store: Arc<MemoryStore>,
        clock: ManualClock,
    }

    fn harness_with(dispatcher: RecordingDispatcher, config: OtpConfig) -> Harness {
        let dispatcher = Arc::new(dispatcher);
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(0);
        let strategy = LocalStrategy::with_seed(dispatcher.clone(), 42);
        let controller = OtpSessionController::new(
            config,
            Arc::new(strategy),
            store.clone(),
            Arc::new(clock.clone()),
        )
        .unwrap();
        Harness {
            controller: Arc::new(controller),
            dispatcher,
            store,
            clock,
        }
    }

    fn harness() -> Harness {
        harness_with(RecordingDispatcher::default(), OtpConfig::new())
    }

    #[tokio::test]
    async fn malformed_emails_never_dispatch() {
        let h = harness();
        for email in ["", "   ", "userexample.com", "user@example", "@example.com"] {
            assert_eq!(
                h.controller.request_otp(email).await,
                Err(OtpError::InvalidEmail),
                "{email:?}"
            );
        }
        assert!(h.dispatcher.sent().is_empty());
        assert_eq!(h.controller.state(), OtpState::Idle);
    }

    #[tokio::test]
    async fn request_records_challenge_and_starts_gate() {
        let h = harness();
        h.clock.set(5_000);
        h.controller.request_otp(" user@example.com ").await.unwrap();

        assert_eq!(h.controller.state(), OtpState::AwaitingCode);
        assert_eq!(h.controller.resend_remaining_seconds(), 30);
        assert_eq!(*h.controller.countdown().borrow(), 30);

        let keys = StorageKeys::default();
        let challenge = OtpChallenge::load(h.store.as_ref(), &keys).unwrap().unwrap();
        assert_eq!(challenge.email, "user@example.com");
        assert_eq!(challenge.issued_at_ms, 5_000);
        assert_eq!(challenge.code, Some(h.dispatcher.last_code()));
        assert_eq!(
            h.controller.pending_email().unwrap(),
            Some("user@example.com".to_string())
        );
    }

    #[tokio::test]
    async fn dispatch_failure_leaves_idle_and_gate_open() {
        let h = harness();
        h.dispatcher.fail.store(true, Ordering::SeqCst);

        let err = h.controller.request_otp("user@example.com").await.unwrap_err();
        assert_eq!(err, OtpError::DispatchFailed("mailbox unavailable".to_string()));
        assert_eq!(h.controller.state(), OtpState::Idle);
        assert!(h.controller.resend_available());
        assert!(h.store.is_empty());
        assert!(!h.controller.is_busy());

        h.dispatcher.fail.store(false, Ordering::SeqCst);
        h.controller.resend_otp("user@example.com").await.unwrap();
        assert_eq!(h.dispatcher.sent().len(), 1);
    }

    #[tokio::test]
    async fn new_request_overwrites_previous_challenge() {
        let h = harness();
        h.controller.request_otp("user@example.com").await.unwrap();
        let first = h.dispatcher.last_code();

        h.clock.advance(31_000);
        h.controller.resend_otp("user@example.com").await.unwrap();
        let second = h.dispatcher.last_code();

        let keys = StorageKeys::default();
        let challenge = OtpChallenge::load(h.store.as_ref(), &keys).unwrap().unwrap();
        assert_eq!(challenge.code, Some(second.clone()));
        assert_eq!(challenge.issued_at_ms, 31_000);

        if first != second {
            assert_eq!(
                h.controller
                    .verify_otp("user@example.com", &first)
                    .await
                    .unwrap_err(),
                OtpError::IncorrectCode(None)
            );
        }
        assert!(h.controller.verify_otp("", &second).await.is_ok());
    }

    #[tokio::test]
    async fn verify_rejects_other_email() {
        let h = harness();
        h.controller.request_otp("user@example.com").await.unwrap();
        let code = h.dispatcher.last_code();

        assert_eq!(
            h.controller
                .verify_otp("other@example.com", &code)
                .await
                .unwrap_err(),
            OtpError::NoActiveChallenge
        );
        // the challenge stays for its owner
        assert!(h
            .controller
            .verify_otp("USER@example.com", &code)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn verify_input_checks() {
        let h = harness();
        assert_eq!(
            h.controller.verify_otp("user@example.com", "  ").await.unwrap_err(),
            OtpError::MissingCode
        );
        assert_eq!(
            h.controller.verify_otp("nope", "123456").await.unwrap_err(),
            OtpError::InvalidEmail
        );
        assert_eq!(
            h.controller.verify_otp("", "123456").await.unwrap_err(),
            OtpError::NoActiveChallenge
        );
    }

    #[tokio::test]
    async fn expired_challenge_is_discarded() {
        let h = harness();
        h.controller.request_otp("user@example.com").await.unwrap();
        let code = h.dispatcher.last_code();

        h.clock.set(300_000);
        assert_eq!(
            h.controller.verify_otp("", &code).await.unwrap_err(),
            OtpError::Expired
        );
        assert_eq!(h.controller.state(), OtpState::Idle);
        assert_eq!(*h.controller.countdown().borrow(), 0);
        assert!(h.store.is_empty());
        assert_eq!(
            h.controller.verify_otp("", &code).await.unwrap_err(),
            OtpError::NoActiveChallenge
        );
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_calls_are_rejected() {
        let h = harness_with(
            RecordingDispatcher {
                delay: Some(Duration::from_secs(1)),
                ..RecordingDispatcher::default()
            },
            OtpConfig::new(),
        );

        let controller = h.controller.clone();
        let first = tokio::spawn(async move { controller.request_otp("user@example.com").await });
        tokio::task::yield_now().await;
        assert!(h.controller.is_busy());

        assert_eq!(
            h.controller.request_otp("user@example.com").await,
            Err(OtpError::InFlight)
        );
        assert_eq!(
            h.controller.verify_otp("user@example.com", "123456").await.unwrap_err(),
            OtpError::InFlight
        );

        first.await.unwrap().unwrap();
        assert!(!h.controller.is_busy());
        assert_eq!(h.dispatcher.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_dispatch_times_out_and_releases_guard() {
        let h = harness_with(
            RecordingDispatcher {
                delay: Some(Duration::from_secs(3_600)),
                ..RecordingDispatcher::default()
            },
            OtpConfig::new().with_request_timeout(Duration::from_secs(10)),
        );

        assert_eq!(
            h.controller.request_otp("user@example.com").await,
            Err(OtpError::Timeout)
        );
        assert!(!h.controller.is_busy());
        assert_eq!(h.controller.state(), OtpState::Idle);
        assert!(h.controller.resend_available());
    }

    #[tokio::test]
    async fn display_name_is_optional() {
        let h = harness();
        assert!(h.controller.needs_display_name().unwrap());
        assert!(!h.controller.set_display_name("   ").unwrap());
        assert!(h.controller.needs_display_name().unwrap());
        assert!(h.controller.set_display_name(" Ada ").unwrap());
        assert!(!h.controller.needs_display_name().unwrap());

        h.controller.request_otp("user@example.com").await.unwrap();
        let code = h.dispatcher.last_code();
        let login = h.controller.verify_otp("", &code).await.unwrap();
        assert_eq!(login.session.display_name, Some("Ada".to_string()));
    }

    #[tokio::test]
    async fn redirect_target_is_consumed() {
        let h = harness_with(
            RecordingDispatcher::default(),
            OtpConfig::new().with_landing_page("home.html".to_string()),
        );
        let keys = StorageKeys::default();
        h.store.set(&keys.login_redirect, "settings.html").unwrap();

        h.controller.request_otp("user@example.com").await.unwrap();
        let code = h.dispatcher.last_code();
        let login = h.controller.verify_otp("", &code).await.unwrap();
        assert_eq!(login.redirect_to, "settings.html");
        assert_eq!(h.store.get(&keys.login_redirect).unwrap(), None);

        h.controller.request_otp("user@example.com").await.unwrap();
        let code = h.dispatcher.last_code();
        let login = h.controller.verify_otp("", &code).await.unwrap();
        assert_eq!(login.redirect_to, "home.html");
    }

    #[tokio::test]
    async fn pending_challenge_survives_restart() {
        let h = harness();
        h.clock.set(1_000);
        h.controller.request_otp("user@example.com").await.unwrap();
        let code = h.dispatcher.last_code();

        h.clock.set(11_000);
        let strategy = LocalStrategy::new(h.dispatcher.clone());
        let restarted = OtpSessionController::new(
            OtpConfig::new(),
            Arc::new(strategy),
            h.store.clone(),
            Arc::new(h.clock.clone()),
        )
        .unwrap();

        assert_eq!(restarted.state(), OtpState::AwaitingCode);
        assert_eq!(restarted.resend_remaining_seconds(), 20);
        assert_eq!(
            *restarted.countdown().borrow(),
            restarted.resend_remaining_seconds()
        );
        assert!(restarted.verify_otp("", &code).await.is_ok());
        assert_eq!(*restarted.countdown().borrow(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn resumed_countdown_reenables_resend() {
        let h = harness();
        h.controller.request_otp("user@example.com").await.unwrap();

        h.clock.set(25_000);
        let restarted = OtpSessionController::new(
            OtpConfig::new(),
            Arc::new(LocalStrategy::new(h.dispatcher.clone())),
            h.store.clone(),
            Arc::new(h.clock.clone()),
        )
        .unwrap();

        let mut rx = restarted.countdown();
        assert_eq!(*rx.borrow_and_update(), 5);
        assert_eq!(
            restarted.resend_otp("user@example.com").await,
            Err(OtpError::CooldownActive(5))
        );

        while *rx.borrow_and_update() > 0 {
            rx.changed().await.unwrap();
        }
        h.clock.set(30_000);
        assert!(restarted.resend_available());
        restarted.resend_otp("user@example.com").await.unwrap();
        assert_eq!(*restarted.countdown().borrow(), 30);
    }

    #[tokio::test]
    async fn reset_returns_to_idle() {
        let h = harness();
        h.controller.request_otp("user@example.com").await.unwrap();
        h.controller.reset().unwrap();

        assert_eq!(h.controller.state(), OtpState::Idle);
        assert!(h.controller.resend_available());
        assert_eq!(*h.controller.countdown().borrow(), 0);
        assert!(h.store.is_empty());
    }
}
