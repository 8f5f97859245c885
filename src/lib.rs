//! # Credo (authentication and session service)
//!
//! `credo` registers accounts, verifies passwords, and issues short-lived access tokens
//! alongside longer-lived refresh tokens.
//!
//! ## Layout
//!
//! - [`auth`]: the core. Argon2id password hashing, HMAC-SHA256 signed tokens, a
//!   fixed-window per-client rate limiter with named tiers, the credential store and the
//!   [`auth::AuthService`] orchestrator that ties them together.
//! - [`api`]: the axum surface. Handlers translate core results into the JSON envelope
//!   `{ success, message, data?, errors? }` and enforce the rate-limit tiers per route.
//! - [`cli`]: clap arguments, tracing setup and the server action.
//!
//! ## Rate limiting
//!
//! Every request passes the `general` tier. Auth routes add `auth`, and the
//! credential-bearing routes also pass `sensitive`. Password reset flows go through
//! `password_reset`, with `email` on the forgot-password request. In the `test`
//! environment nothing is limited.

pub mod api;
pub mod auth;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
