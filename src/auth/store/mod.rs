//! Credential store: the persistence seam of the auth core.
//!
//! [`User`] is the stored record and carries the password hash; it is never serialized.
//! Everything that leaves the process goes through [`PublicUser`].

mod memory;
mod postgres;

pub use memory::MemoryCredentialStore;
pub use postgres::{PgCredentialStore, apply_schema};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use super::token::Identity;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "USER" => Ok(Self::User),
            "ADMIN" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.id,
            email: self.email.clone(),
            role: self.role,
        }
    }

    #[must_use]
    pub fn into_public(self) -> PublicUser {
        PublicUser {
            id: self.id,
            email: self.email,
            name: self.name,
            role: self.role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("password_hash", &"***")
            .field("role", &self.role)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a user about to be created. `email` must already be normalized.
#[derive(Clone)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub role: Role,
}

/// Profile fields a user may change about themselves. `None` leaves a field untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl ProfileChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("record conflicts with an existing one")]
    Conflict,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Case-insensitive lookup by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Persist a new user. Fails with [`StoreError::Conflict`] when the email is taken.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    /// Apply profile changes and bump `updated_at`.
    async fn update(&self, id: Uuid, changes: ProfileChanges) -> Result<User, StoreError>;

    async fn update_password_hash(&self, id: Uuid, password_hash: &str)
    -> Result<(), StoreError>;

    async fn list(&self) -> Result<Vec<User>, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// Liveness check used by the health endpoint.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Canonical form used for storage and lookup.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_wire_format() -> anyhow::Result<()> {
        assert_eq!(serde_json::to_string(&Role::Admin)?, r#""ADMIN""#);
        assert_eq!(serde_json::from_str::<Role>(r#""USER""#)?, Role::User);
        assert_eq!("ADMIN".parse::<Role>(), Ok(Role::Admin));
        assert!("admin".parse::<Role>().is_err());
        assert_eq!(Role::default(), Role::User);
        Ok(())
    }

    #[test]
    fn public_user_has_no_password_hash() -> anyhow::Result<()> {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            name: Some("Alice".to_string()),
            password_hash: "$argon2id$secret".to_string(),
            role: Role::User,
            created_at: now,
            updated_at: now,
        };
        assert!(!format!("{user:?}").contains("argon2id"));

        let json = serde_json::to_value(user.into_public())?;
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "alice@example.com");
        assert!(json.get("createdAt").is_some());
        Ok(())
    }

    #[test]
    fn normalizes_email() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }
}
