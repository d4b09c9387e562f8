pub mod auth;
pub mod gateway;

// Single dispatch point, see `run::execute`.
mod run;

#[derive(Debug)]
pub enum Action {
    Auth(auth::Args),
    Gateway(gateway::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
