use crate::cli::{globals::GlobalArgs, telemetry};
use crate::otp::{
    ActivityLogger, AuthClient, Authenticated, EmailApiConfig, EmailDispatcher,
    HttpEmailDispatcher, LocalStrategy, LogEmailDispatcher, OtpConfig, OtpError,
    OtpSessionController, OtpState, RemoteStrategy, SessionStore, StatusBoard, StatusKind,
    StatusMessage, SystemClock, VerificationMode, VerificationStrategy,
};
use anyhow::{Context, Result};
use std::{io::Write, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines},
    sync::watch,
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub mode: VerificationMode,
    pub email: Option<String>,
    pub api_base_url: Option<Url>,
    pub email_api: Option<EmailApiConfig>,
    pub request_timeout: Duration,
    pub landing_page: String,
}

/// Run the interactive login on the terminal.
/// # Errors
/// Returns an error if the controller cannot be built or the terminal closes
/// unexpectedly.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let controller = Arc::new(build_controller(&args)?);
    let status = Arc::new(StatusBoard::new());

    let printer = spawn_status_printer(status.subscribe());
    let notice = spawn_resend_notice(controller.clone(), status.clone());

    if args.mode == VerificationMode::Local && args.email_api.is_none() {
        status.show(
            "No mail API configured: codes are only written to the log (run with -vv).",
            StatusKind::Warning,
        );
    }

    if let Some(session) = controller.current_session()? {
        status.show(
            format!(
                "Already logged in as {}; a new login replaces that session.",
                session.email
            ),
            StatusKind::Info,
        );
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut out = std::io::stdout();

    let outcome = run_flow(&controller, &status, args.email.clone(), &mut lines, &mut out).await;

    // let the printer drain the last message
    tokio::task::yield_now().await;
    notice.abort();
    printer.abort();

    let outcome = outcome?;
    match outcome {
        Some(login) => {
            writeln!(
                out,
                "Logged in as {}. Continue to {}",
                login.session.email, login.redirect_to
            )?;
        }
        None => writeln!(out, "Login cancelled.")?,
    }

    telemetry::shutdown_tracer();

    Ok(())
}

fn log_startup_args(args: &Args) {
    info!(
        mode = %args.mode,
        store = %args.globals.store_path.display(),
        mail_api = args.email_api.is_some(),
        api_base_url = args.api_base_url.as_ref().map(Url::as_str),
        "starting login"
    );
}

/// Wire the strategy, dispatcher and store selected on the command line.
///
/// # Errors
/// Returns an error if an HTTP client cannot be built or the store cannot be
/// read.
pub fn build_controller(args: &Args) -> Result<OtpSessionController> {
    let timeout = args.request_timeout;
    let store: Arc<dyn SessionStore> = Arc::new(args.globals.store());
    let config = OtpConfig::new()
        .with_request_timeout(timeout)
        .with_landing_page(args.landing_page.clone())
        .with_keys(args.globals.keys());

    let (strategy, activity): (Arc<dyn VerificationStrategy>, Option<ActivityLogger>) =
        match args.mode {
            VerificationMode::Local => {
                let dispatcher: Arc<dyn EmailDispatcher> = match &args.email_api {
                    Some(email_api) => {
                        Arc::new(HttpEmailDispatcher::new(email_api.clone(), timeout)?)
                    }
                    None => {
                        warn!("no mail API configured, codes are only logged");
                        Arc::new(LogEmailDispatcher)
                    }
                };
                (Arc::new(LocalStrategy::new(dispatcher)), None)
            }
            VerificationMode::Remote => {
                let base_url = args
                    .api_base_url
                    .as_ref()
                    .context("remote mode needs --api-base-url")?;
                let client = AuthClient::new(base_url.as_str(), timeout)?;
                let activity = ActivityLogger::new(base_url.as_str(), timeout)?;
                (Arc::new(RemoteStrategy::new(client)), Some(activity))
            }
        };

    let controller = OtpSessionController::new(config, strategy, store, Arc::new(SystemClock))
        .context("could not read the session store")?;

    Ok(match activity {
        Some(activity) => controller.with_activity_logger(activity),
        None => controller,
    })
}

/// Drive one login: pick the email, get a code out, then read codes until
/// one verifies. Returns `None` when the user quits or input ends.
///
/// # Errors
/// Returns an error on terminal I/O failures or when the session store
/// cannot be accessed.
pub async fn run_flow<R, W>(
    controller: &OtpSessionController,
    status: &StatusBoard,
    email: Option<String>,
    lines: &mut Lines<R>,
    out: &mut W,
) -> Result<Option<Authenticated>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let pending = controller.pending_email()?;
    let mut email = match email.or_else(|| pending.clone()) {
        Some(email) => email,
        None => match prompt(lines, out, "Email: ").await? {
            Some(email) => email,
            None => return Ok(None),
        },
    };

    let resumed = pending
        .as_deref()
        .is_some_and(|pending| pending.eq_ignore_ascii_case(email.trim()));

    if resumed {
        status.show(
            format!("A code was already sent to {email}."),
            StatusKind::Info,
        );
    } else {
        loop {
            match controller.request_otp(&email).await {
                Ok(()) => {
                    status.show(sent_message(controller, &email), StatusKind::Success);
                    break;
                }
                Err(err) => {
                    status.show_error(&err);
                    match prompt(lines, out, "Email: ").await? {
                        Some(next) => email = next,
                        None => return Ok(None),
                    }
                }
            }
        }
    }

    let login = loop {
        let Some(input) = prompt(lines, out, "Code ('resend' for a new one, 'quit' to stop): ").await?
        else {
            return Ok(None);
        };

        match input.to_lowercase().as_str() {
            "quit" | "q" => return Ok(None),
            "resend" | "r" => match controller.resend_otp(&email).await {
                Ok(()) => status.show(sent_message(controller, &email), StatusKind::Success),
                Err(err) => status.show_error(&err),
            },
            _ => match controller.verify_otp(&email, &input).await {
                Ok(login) => {
                    status.show("Login successful.", StatusKind::Success);
                    break login;
                }
                Err(err) => {
                    debug!("verification failed: {err}");
                    status.show_error(&err);
                    if err == OtpError::Expired {
                        status.show(
                            "The code expired. Type 'resend' for a new one.",
                            StatusKind::Warning,
                        );
                    }
                }
            },
        }
    };

    let mut login = login;
    if controller.needs_display_name()? {
        if let Some(name) = prompt(lines, out, "Display name (optional): ").await? {
            if controller.set_display_name(&name)? {
                login.session.display_name = Some(name);
            }
        }
    }

    Ok(Some(login))
}

fn sent_message(controller: &OtpSessionController, email: &str) -> String {
    let minutes = controller.config().code_ttl().as_secs() / 60;
    format!("Code sent to {}. It is valid for {minutes} minutes.", email.trim())
}

async fn prompt<R, W>(lines: &mut Lines<R>, out: &mut W, text: &str) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    write!(out, "{text}")?;
    out.flush()?;
    Ok(lines.next_line().await?.map(|line| line.trim().to_string()))
}

fn format_status(message: &StatusMessage) -> String {
    let tag = match message.kind {
        StatusKind::Info => "info",
        StatusKind::Success => "ok",
        StatusKind::Warning => "warn",
        StatusKind::Error => "error",
    };
    format!("[{tag}] {}", message.text)
}

fn spawn_status_printer(mut rx: watch::Receiver<Option<StatusMessage>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let message = rx.borrow_and_update().clone();
            if let Some(message) = message {
                eprintln!("{}", format_status(&message));
            }
        }
    })
}

/// Announce when the resend countdown runs out while a code is pending.
fn spawn_resend_notice(
    controller: Arc<OtpSessionController>,
    status: Arc<StatusBoard>,
) -> JoinHandle<()> {
    let mut rx = controller.countdown();
    tokio::spawn(async move {
        let mut last = *rx.borrow_and_update();
        while rx.changed().await.is_ok() {
            let remaining = *rx.borrow_and_update();
            if last > 0 && remaining == 0 && controller.state() == OtpState::AwaitingCode {
                status.show("You can request a new code now.", StatusKind::Info);
            }
            last = remaining;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp::{challenge::generate_code, ManualClock, MemoryStore, StorageKeys};
    use rand::{rngs::StdRng, SeedableRng};

    const SEED: u64 = 7;

    fn controller(store: Arc<MemoryStore>) -> OtpSessionController {
        let strategy = LocalStrategy::with_seed(Arc::new(LogEmailDispatcher), SEED);
        OtpSessionController::new(
            OtpConfig::new(),
            Arc::new(strategy),
            store,
            Arc::new(ManualClock::new(0)),
        )
        .unwrap()
    }

    fn expected_code() -> String {
        generate_code(&mut StdRng::seed_from_u64(SEED))
    }

    fn wrong_code(code: &str) -> &'static str {
        if code == "111111" {
            "222222"
        } else {
            "111111"
        }
    }

    #[test]
    fn test_format_status() {
        let message = StatusMessage::from(&OtpError::CooldownActive(12));
        assert!(format_status(&message).starts_with("[warn] "));
        assert!(format_status(&message).contains("12"));
    }

    #[tokio::test]
    async fn test_flow_wrong_code_then_resend_then_correct() {
        let store = Arc::new(MemoryStore::new());
        let controller = controller(store.clone());
        let status = StatusBoard::new();

        let code = expected_code();
        let script = format!("{}\nresend\n{code}\n  Ada  \n", wrong_code(&code));
        let mut lines = BufReader::new(script.as_bytes()).lines();
        let mut out = Vec::new();

        let login = run_flow(
            &controller,
            &status,
            Some("user@example.com".to_string()),
            &mut lines,
            &mut out,
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(login.session.email, "user@example.com");
        assert_eq!(login.session.display_name, Some("Ada".to_string()));
        assert_eq!(login.redirect_to, "index.html");
        assert_eq!(controller.state(), OtpState::Authenticated);

        let keys = StorageKeys::default();
        assert_eq!(store.get(&keys.logged_in).unwrap(), Some("true".to_string()));
        assert_eq!(store.get(&keys.user_name).unwrap(), Some("Ada".to_string()));

        let prompts = String::from_utf8(out).unwrap();
        assert_eq!(prompts.matches("Code (").count(), 3);
        assert!(prompts.contains("Display name"));
    }

    #[tokio::test]
    async fn test_flow_reprompts_invalid_email() {
        let store = Arc::new(MemoryStore::new());
        let controller = controller(store);
        let status = StatusBoard::new();

        let mut lines = BufReader::new(&b"not-an-email\nuser@example.com\nquit\n"[..]).lines();
        let mut out = Vec::new();

        let login = run_flow(&controller, &status, None, &mut lines, &mut out)
            .await
            .unwrap();

        assert!(login.is_none());
        assert_eq!(controller.state(), OtpState::AwaitingCode);
        assert_eq!(
            controller.pending_email().unwrap(),
            Some("user@example.com".to_string())
        );
        let prompts = String::from_utf8(out).unwrap();
        assert_eq!(prompts.matches("Email: ").count(), 2);
    }

    #[tokio::test]
    async fn test_flow_resumes_pending_challenge() {
        let store = Arc::new(MemoryStore::new());
        let first = controller(store.clone());
        first.request_otp("user@example.com").await.unwrap();

        let second = controller(store);
        let status = StatusBoard::new();
        let script = format!("{}\n\n", expected_code());
        let mut lines = BufReader::new(script.as_bytes()).lines();
        let mut out = Vec::new();

        let login = run_flow(&second, &status, None, &mut lines, &mut out)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(login.session.email, "user@example.com");
        assert_eq!(login.session.display_name, None);
        let prompts = String::from_utf8(out).unwrap();
        assert!(!prompts.contains("Email: "));
    }

    #[tokio::test]
    async fn test_flow_end_of_input() {
        let controller = controller(Arc::new(MemoryStore::new()));
        let status = StatusBoard::new();
        let mut lines = BufReader::new(&b""[..]).lines();
        let mut out = Vec::new();

        assert!(run_flow(&controller, &status, None, &mut lines, &mut out)
            .await
            .unwrap()
            .is_none());
    }
}
