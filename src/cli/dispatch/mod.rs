use crate::cli::{
    actions::{login, session, Action},
    commands::{login as login_args, ARG_KEY_PREFIX, ARG_STORE_PATH},
    globals::GlobalArgs,
};
use crate::otp::{EmailApiConfig, VerificationMode};
use anyhow::{anyhow, Context, Result};
use clap::ArgMatches;
use secrecy::SecretString;
use std::{path::PathBuf, time::Duration};
use url::Url;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some(("login", sub)) => login_action(sub).map(Action::Login),
        Some(("session", sub)) => Ok(Action::Session(session::Args {
            globals: globals(sub),
        })),
        _ => Err(anyhow!("missing subcommand, see --help")),
    }
}

// Global args propagate down, so they are read from the subcommand.
fn globals(matches: &ArgMatches) -> GlobalArgs {
    let mut globals = GlobalArgs::new(matches.get_one::<PathBuf>(ARG_STORE_PATH).cloned());
    if let Some(prefix) = matches.get_one::<String>(ARG_KEY_PREFIX) {
        globals.set_key_prefix(prefix.clone());
    }
    globals
}

fn login_action(matches: &ArgMatches) -> Result<login::Args> {
    login_args::validate(matches).map_err(|e| anyhow!(e))?;

    let mode = matches
        .get_one::<String>(login_args::ARG_MODE)
        .map_or("local", String::as_str)
        .parse::<VerificationMode>()
        .map_err(|e| anyhow!(e))?;

    let api_base_url = matches
        .get_one::<String>(login_args::ARG_API_BASE_URL)
        .map(|url| Url::parse(url))
        .transpose()
        .context("invalid --api-base-url")?;

    let email_api = email_api_config(matches)?;

    let request_timeout = Duration::from_secs(
        matches
            .get_one::<u64>(login_args::ARG_REQUEST_TIMEOUT)
            .copied()
            .unwrap_or(10),
    );

    let landing_page = matches
        .get_one::<String>(login_args::ARG_LANDING_PAGE)
        .cloned()
        .context("missing required argument: --landing-page")?;

    Ok(login::Args {
        globals: globals(matches),
        mode,
        email: matches.get_one::<String>(login_args::ARG_EMAIL).cloned(),
        api_base_url,
        email_api,
        request_timeout,
        landing_page,
    })
}

fn email_api_config(matches: &ArgMatches) -> Result<Option<EmailApiConfig>> {
    let get = |id: &str| matches.get_one::<String>(id).cloned();

    let (Some(service_id), Some(template_id), Some(public_key)) = (
        get(login_args::ARG_EMAILJS_SERVICE_ID),
        get(login_args::ARG_EMAILJS_TEMPLATE_ID),
        get(login_args::ARG_EMAILJS_PUBLIC_KEY),
    ) else {
        return Ok(None);
    };

    let endpoint = get(login_args::ARG_EMAILJS_ENDPOINT)
        .context("missing required argument: --emailjs-endpoint")?;

    Ok(Some(EmailApiConfig {
        endpoint: Url::parse(&endpoint).context("invalid --emailjs-endpoint")?,
        service_id,
        template_id,
        public_key: SecretString::from(public_key),
    }))
}
