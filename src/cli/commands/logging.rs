//! `-v` / `OTPGATE_LOG_LEVEL`: how much of the login flow is logged to stderr.

use clap::{builder::ValueParser, Arg, ArgAction, Command};

pub const ARG_VERBOSITY: &str = "verbosity";

/// Level names in verbosity order, so a name maps to the same value as that
/// many `-v` flags.
const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

const MAX_VERBOSITY: u8 = 5;

fn parse_verbosity(level: &str) -> Result<u8, String> {
    let level = level.trim();
    if let Ok(count) = level.parse::<u8>() {
        return if count <= MAX_VERBOSITY {
            Ok(count)
        } else {
            Err(format!("verbosity must be between 0 and {MAX_VERBOSITY}"))
        };
    }

    LEVELS
        .iter()
        .position(|name| name.eq_ignore_ascii_case(level))
        .and_then(|index| u8::try_from(index).ok())
        .ok_or_else(|| format!("unknown log level '{level}', expected one of: {}", LEVELS.join(", ")))
}

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(parse_verbosity)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Log the login flow to stderr; repeat -v or name a level: error, warn, info, debug, trace")
            .long_help(
                "Log the login flow to stderr. Repeat -v for more detail (-vv shows issued \
                 codes in local mode without a mail API), or set OTPGATE_LOG_LEVEL to a \
                 level name or count.",
            )
            .env("OTPGATE_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}
