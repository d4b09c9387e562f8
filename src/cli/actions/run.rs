use crate::cli::actions::{auth, gateway, Action};
use anyhow::Result;

/// Execute the provided action.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Auth(args) => auth::execute(args).await,
        Action::Gateway(args) => gateway::execute(args).await,
    }
}
