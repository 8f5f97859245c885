//! Auth orchestration: register, login, refresh, change-password, profile and reset flows.
//!
//! Every flow returns `Result<_, AuthError>`. Expected negatives (duplicate email, wrong
//! credentials, bad tokens) are ordinary variants; only unexpected persistence or crypto
//! failures end up in [`AuthError::Internal`].

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    password::PasswordHasher,
    store::{
        CredentialStore, NewUser, ProfileChanges, PublicUser, Role, StoreError, User,
        normalize_email,
    },
    token::{TokenKind, TokenService},
};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("invalid token")]
    InvalidToken,
    #[error("current password is incorrect")]
    IncorrectPassword,
    #[error("user not found")]
    UserNotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::UserNotFound,
            StoreError::Conflict => Self::DuplicateEmail,
            StoreError::Internal(err) => Self::Internal(err),
        }
    }
}

/// A signed-in user with a fresh token pair.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user: PublicUser,
    pub access_token: String,
    pub refresh_token: String,
}

pub struct Registration {
    pub email: String,
    pub name: Option<String>,
    pub password: String,
    pub role: Option<Role>,
}

/// Raw profile update as submitted by a user.
///
/// `password`, `role` and `id` are captured only so they can be detected and dropped; they
/// are never applied through this path.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<Value>,
    pub role: Option<Value>,
    pub id: Option<Value>,
}

impl ProfileUpdate {
    /// Keep only the fields a user may change about themselves.
    #[must_use]
    pub fn into_changes(self) -> ProfileChanges {
        let dropped: Vec<&str> = [
            ("password", self.password.is_some()),
            ("role", self.role.is_some()),
            ("id", self.id.is_some()),
        ]
        .into_iter()
        .filter_map(|(field, present)| present.then_some(field))
        .collect();
        if !dropped.is_empty() {
            warn!(fields = ?dropped, "Ignoring protected fields in profile update");
        }

        ProfileChanges {
            name: self.name.map(|name| name.trim().to_string()),
            email: self.email.as_deref().map(normalize_email),
        }
    }
}

/// Issued when a known email asks for a password reset.
#[derive(Clone, Debug)]
pub struct PasswordResetTicket {
    pub user: PublicUser,
    pub token: String,
    pub expires_in_seconds: i64,
}

/// Hashed once per service. Logins for unknown emails verify against this digest.
const DECOY_PASSWORD: &str = "credo-decoy-password";

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    tokens: TokenService,
    decoy_digest: String,
}

impl AuthService {
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        tokens: TokenService,
    ) -> Self {
        let decoy_digest = hasher.hash(DECOY_PASSWORD).unwrap_or_else(|err| {
            warn!("Failed to prepare decoy password digest: {err}");
            String::new()
        });
        Self {
            store,
            hasher,
            tokens,
            decoy_digest,
        }
    }

    #[must_use]
    pub fn store(&self) -> &dyn CredentialStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    fn session_for(&self, user: User) -> Result<AuthSession, AuthError> {
        let pair = self
            .tokens
            .issue_pair(&user.identity())
            .context("Failed to issue token pair")?;
        Ok(AuthSession {
            user: user.into_public(),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        })
    }

    async fn hash(&self, plaintext: String) -> Result<String, AuthError> {
        let digest = self
            .hasher
            .hash_blocking(plaintext)
            .await
            .context("Failed to hash password")?;
        Ok(digest)
    }

    /// Create an account and sign it in.
    ///
    /// # Errors
    /// [`AuthError::DuplicateEmail`] if the email is taken, `Internal` on store failures.
    pub async fn register(&self, registration: Registration) -> Result<AuthSession, AuthError> {
        let email = normalize_email(&registration.email);
        if self.store.find_by_email(&email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        let password_hash = self.hash(registration.password).await?;
        // A concurrent registration can still win the race; the store reports it as a conflict.
        let user = self
            .store
            .create(NewUser {
                email,
                name: registration.name,
                password_hash,
                role: registration.role.unwrap_or_default(),
            })
            .await?;

        info!(user_id = %user.id, role = %user.role, "User registered");
        self.session_for(user)
    }

    /// Authenticate with email and password.
    ///
    /// # Errors
    /// [`AuthError::InvalidCredentials`] both for unknown emails and wrong passwords.
    pub async fn login(&self, email: &str, password: String) -> Result<AuthSession, AuthError> {
        let Some(user) = self.store.find_by_email(&normalize_email(email)).await? else {
            debug!("Login for unknown email");
            self.hasher
                .verify_blocking(password, self.decoy_digest.clone())
                .await;
            return Err(AuthError::InvalidCredentials);
        };

        if !self
            .hasher
            .verify_blocking(password, user.password_hash.clone())
            .await
        {
            debug!(user_id = %user.id, "Login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id = %user.id, "User logged in");
        self.session_for(user)
    }

    /// Trade a refresh token for a new token pair built from the user's current state.
    ///
    /// # Errors
    /// [`AuthError::InvalidToken`] for any verification failure or a deleted user.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        let claims = match self.tokens.verify(refresh_token, TokenKind::Refresh) {
            Ok(claims) => claims,
            Err(err) => {
                debug!("Refresh token rejected: {err}");
                return Err(AuthError::InvalidToken);
            }
        };

        let Some(user) = self.store.find_by_id(claims.sub).await? else {
            debug!(user_id = %claims.sub, "Refresh token for missing user");
            return Err(AuthError::InvalidToken);
        };

        self.session_for(user)
    }

    /// Replace the password after confirming the current one.
    ///
    /// # Errors
    /// [`AuthError::IncorrectPassword`] leaves the stored hash untouched.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: String,
        new_password: String,
    ) -> Result<(), AuthError> {
        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !self
            .hasher
            .verify_blocking(current_password, user.password_hash)
            .await
        {
            return Err(AuthError::IncorrectPassword);
        }

        let password_hash = self.hash(new_password).await?;
        self.store
            .update_password_hash(user_id, &password_hash)
            .await?;

        info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Apply the permitted subset of a profile update.
    ///
    /// # Errors
    /// [`AuthError::UserNotFound`] or [`AuthError::DuplicateEmail`] from the store.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> Result<PublicUser, AuthError> {
        let changes = update.into_changes();
        let user = self.store.update(user_id, changes).await?;
        info!(user_id = %user_id, "Profile updated");
        Ok(user.into_public())
    }

    /// Public view of a user.
    ///
    /// # Errors
    /// [`AuthError::UserNotFound`] when no such user exists.
    pub async fn profile(&self, user_id: Uuid) -> Result<PublicUser, AuthError> {
        self.store
            .find_by_id(user_id)
            .await?
            .map(User::into_public)
            .ok_or(AuthError::UserNotFound)
    }

    /// Issue a password-reset token for `email`. Unknown emails yield `Ok(None)`.
    ///
    /// # Errors
    /// `Internal` on store or signing failures.
    pub async fn request_password_reset(
        &self,
        email: &str,
    ) -> Result<Option<PasswordResetTicket>, AuthError> {
        let Some(user) = self.store.find_by_email(&normalize_email(email)).await? else {
            debug!("Password reset requested for unknown email");
            return Ok(None);
        };

        let token = self
            .tokens
            .issue(&user.identity(), TokenKind::PasswordReset)
            .context("Failed to issue password reset token")?;
        info!(user_id = %user.id, "Password reset requested");

        Ok(Some(PasswordResetTicket {
            user: user.into_public(),
            token,
            expires_in_seconds: self.tokens.ttl_seconds(TokenKind::PasswordReset),
        }))
    }

    /// Set a new password using a password-reset token.
    ///
    /// # Errors
    /// [`AuthError::InvalidToken`] unless the token is a valid, unexpired reset token for an
    /// existing user.
    pub async fn reset_password(&self, token: &str, new_password: String) -> Result<(), AuthError> {
        let claims = match self.tokens.verify(token, TokenKind::PasswordReset) {
            Ok(claims) => claims,
            Err(err) => {
                debug!("Password reset token rejected: {err}");
                return Err(AuthError::InvalidToken);
            }
        };

        let Some(user) = self.store.find_by_id(claims.sub).await? else {
            return Err(AuthError::InvalidToken);
        };

        let password_hash = self.hash(new_password).await?;
        match self.store.update_password_hash(user.id, &password_hash).await {
            Ok(()) => {}
            Err(StoreError::NotFound) => return Err(AuthError::InvalidToken),
            Err(err) => return Err(err.into()),
        }

        info!(user_id = %user.id, "Password reset");
        Ok(())
    }
}
