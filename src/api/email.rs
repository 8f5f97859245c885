//! Password-reset delivery.
//!
//! The default mailer for local runs is `LogPasswordResetMailer`, which records that a
//! reset was issued without writing the token itself to the logs.

use anyhow::Result;
use tracing::info;

use crate::auth::service::PasswordResetTicket;

/// Delivery abstraction for password-reset tokens.
pub trait PasswordResetMailer: Send + Sync {
    /// Deliver the ticket to the account owner or return an error.
    fn send(&self, ticket: &PasswordResetTicket) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct LogPasswordResetMailer;

impl PasswordResetMailer for LogPasswordResetMailer {
    fn send(&self, ticket: &PasswordResetTicket) -> Result<()> {
        info!(
            user_id = %ticket.user.id,
            expires_in_seconds = ticket.expires_in_seconds,
            "Password reset issued"
        );
        Ok(())
    }
}
