use crate::otp::{dispatch::EMAILJS_ENDPOINT, session::DEFAULT_LANDING};
use clap::{builder::PossibleValuesParser, Arg, ArgMatches, Command};

pub const ARG_MODE: &str = "mode";
pub const ARG_EMAIL: &str = "email";
pub const ARG_API_BASE_URL: &str = "api-base-url";
pub const ARG_EMAILJS_ENDPOINT: &str = "emailjs-endpoint";
pub const ARG_EMAILJS_SERVICE_ID: &str = "emailjs-service-id";
pub const ARG_EMAILJS_TEMPLATE_ID: &str = "emailjs-template-id";
pub const ARG_EMAILJS_PUBLIC_KEY: &str = "emailjs-public-key";
pub const ARG_REQUEST_TIMEOUT: &str = "request-timeout";
pub const ARG_LANDING_PAGE: &str = "landing-page";

const EMAILJS_ARGS: [&str; 3] = [
    ARG_EMAILJS_SERVICE_ID,
    ARG_EMAILJS_TEMPLATE_ID,
    ARG_EMAILJS_PUBLIC_KEY,
];

/// Remote mode needs the auth API; EmailJS credentials come as a set.
///
/// # Errors
/// Returns an error string describing the missing argument.
pub fn validate(matches: &ArgMatches) -> Result<(), String> {
    let mode = matches
        .get_one::<String>(ARG_MODE)
        .map_or("local", String::as_str);

    if mode == "remote" && !matches.contains_id(ARG_API_BASE_URL) {
        return Err(
            "Missing required argument: --api-base-url (required for remote mode)".to_string(),
        );
    }

    let given = EMAILJS_ARGS
        .iter()
        .filter(|id| matches.contains_id(id))
        .count();
    if given != 0 && given != EMAILJS_ARGS.len() {
        return Err(
            "--emailjs-service-id, --emailjs-template-id and --emailjs-public-key must be given together"
                .to_string(),
        );
    }

    Ok(())
}

#[must_use]
pub fn command() -> Command {
    Command::new("login")
        .about("Log in with a one-time passcode sent by email")
        .arg(
            Arg::new(ARG_MODE)
                .short('m')
                .long("mode")
                .help("Where codes are generated and checked")
                .env("OTPGATE_MODE")
                .default_value("local")
                .value_parser(PossibleValuesParser::new(["local", "remote"])),
        )
        .arg(
            Arg::new(ARG_EMAIL)
                .short('e')
                .long("email")
                .help("Email address to log in with, prompted for when absent")
                .env("OTPGATE_EMAIL"),
        )
        .arg(
            Arg::new(ARG_API_BASE_URL)
                .long("api-base-url")
                .help("Auth API base URL, example: https://api.example.com")
                .env("OTPGATE_API_BASE_URL"),
        )
        .arg(
            Arg::new(ARG_EMAILJS_ENDPOINT)
                .long("emailjs-endpoint")
                .help("Template mail API endpoint used in local mode")
                .env("OTPGATE_EMAILJS_ENDPOINT")
                .default_value(EMAILJS_ENDPOINT),
        )
        .arg(
            Arg::new(ARG_EMAILJS_SERVICE_ID)
                .long("emailjs-service-id")
                .help("Mail API service id; without it codes are only logged")
                .env("OTPGATE_EMAILJS_SERVICE_ID"),
        )
        .arg(
            Arg::new(ARG_EMAILJS_TEMPLATE_ID)
                .long("emailjs-template-id")
                .help("Mail API template id")
                .env("OTPGATE_EMAILJS_TEMPLATE_ID"),
        )
        .arg(
            Arg::new(ARG_EMAILJS_PUBLIC_KEY)
                .long("emailjs-public-key")
                .help("Mail API public key")
                .env("OTPGATE_EMAILJS_PUBLIC_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_REQUEST_TIMEOUT)
                .long("request-timeout")
                .help("Upper bound in seconds for every network call")
                .env("OTPGATE_REQUEST_TIMEOUT")
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..=300)),
        )
        .arg(
            Arg::new(ARG_LANDING_PAGE)
                .long("landing-page")
                .help("Where to go after login when no redirect target was stored")
                .env("OTPGATE_LANDING_PAGE")
                .default_value(DEFAULT_LANDING),
        )
}
