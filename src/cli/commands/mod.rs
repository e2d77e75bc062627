pub mod logging;
pub mod login;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_STORE_PATH: &str = "store-path";
pub const ARG_KEY_PREFIX: &str = "key-prefix";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("otpgate")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new(ARG_STORE_PATH)
                .short('s')
                .long("store-path")
                .help("Session store file (default: <data dir>/otpgate/session.json)")
                .env("OTPGATE_STORE_PATH")
                .global(true)
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(
            Arg::new(ARG_KEY_PREFIX)
                .long("key-prefix")
                .help("Prefix for every session store key")
                .env("OTPGATE_KEY_PREFIX")
                .global(true),
        )
        .subcommand(login::command())
        .subcommand(Command::new("session").about("Show the persisted session"));

    logging::with_args(command)
}
