//! The authentication and session core.
//!
//! Leaves first: [`store`] persists credentials, [`password`] hashes them, [`token`] mints
//! and checks signed tokens, [`rate_limit`] throttles clients per tier, and [`service`]
//! composes them into the account flows. Nothing here knows about HTTP.

pub mod password;
pub mod rate_limit;
pub mod service;
pub mod store;
pub mod token;

pub use password::PasswordHasher;
pub use rate_limit::{
    Environment, FixedWindowRateLimiter, NoopRateLimiter, RateLimitConfig, RateLimitDecision,
    RateLimiter, Tier,
};
pub use service::{AuthError, AuthService, AuthSession, ProfileUpdate, Registration};
pub use store::{
    CredentialStore, MemoryCredentialStore, PgCredentialStore, PublicUser, Role, StoreError,
};
pub use token::{TokenConfig, TokenError, TokenKind, TokenService};
