use crate::cli::actions::{login, session, Action};
use anyhow::Result;

/// Execute the provided action.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Login(args) => login::execute(args).await,
        Action::Session(args) => session::execute(&args),
    }
}
