use crate::cli::actions::{Action, server};
use anyhow::Result;
use tracing::debug;

/// Run the parsed action to completion.
/// # Errors
/// Returns whatever error the action itself reports.
pub async fn execute(action: Action) -> Result<()> {
    debug!(action = action.name(), "Running action");
    match action {
        Action::Server(args) => server::execute(args).await,
    }
}
