use crate::cli::globals::GlobalArgs;
use crate::otp::Session;
use anyhow::{Context, Result};
use std::io::Write;

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
}

/// Print the persisted session, if any.
/// # Errors
/// Returns an error if the session store cannot be read.
pub fn execute(args: &Args) -> Result<()> {
    let store = args.globals.store();
    let keys = args.globals.keys();

    let session = Session::load(&store, &keys)
        .with_context(|| format!("could not read {}", store.path().display()))?;

    let mut out = std::io::stdout().lock();
    render(&mut out, session.as_ref())?;
    Ok(())
}

fn render(out: &mut impl Write, session: Option<&Session>) -> std::io::Result<()> {
    let Some(session) = session else {
        return writeln!(out, "Not logged in.");
    };

    writeln!(out, "Logged in as {}", session.email)?;
    if let Some(name) = &session.display_name {
        writeln!(out, "Name: {name}")?;
    }
    writeln!(
        out,
        "Token: {}",
        if session.token.is_some() {
            "present (remote login)"
        } else {
            "none (local login)"
        }
    )
}
