//! API route handlers.
//!
//! `auth` holds the account flows and everything they share (state, rate limiting,
//! bearer authentication, validation). `users` is the role-gated admin surface.

pub mod auth;
pub mod health;
pub mod root;
pub mod users;
