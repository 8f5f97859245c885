//! Auth handlers and supporting modules.
//!
//! Every request first passes the general rate limiter ([`rate_limit::general_limit`]),
//! which records the caller's [`utils::ClientIdentity`]. Handlers then apply their own tiers:
//!
//! - all `/api/auth/*` routes count against `auth`;
//! - `register`, `login` and `change-password` also count against `sensitive`;
//! - `forgot-password` counts against `email` and `password_reset`;
//! - `reset-password` counts against `password_reset`.
//!
//! Protected routes take an `Authorization: Bearer <access token>` header. Only access
//! tokens are accepted there; refresh and password-reset tokens are rejected.

pub(crate) mod login;
pub(crate) mod password;
pub(crate) mod principal;
pub(crate) mod profile;
pub(crate) mod rate_limit;
pub(crate) mod refresh;
pub(crate) mod register;
pub(crate) mod session;
mod state;
pub(crate) mod types;
pub(crate) mod utils;
pub(crate) mod validation;

pub use principal::{Principal, require_auth, require_role};
pub use rate_limit::general_limit;
pub use state::{AuthConfig, AuthState};
pub use utils::ClientIdentity;
