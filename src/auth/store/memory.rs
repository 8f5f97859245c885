use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CredentialStore, NewUser, ProfileChanges, StoreError, User, normalize_email};

/// Process-local store with the same conflict and not-found semantics as the database.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_taken(users: &HashMap<Uuid, User>, email: &str, except: Option<Uuid>) -> bool {
    users
        .values()
        .any(|user| Some(user.id) != except && normalize_email(&user.email) == email)
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = normalize_email(email);
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|user| normalize_email(&user.email) == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let email = normalize_email(&user.email);
        let mut users = self.users.write().await;
        if email_taken(&users, &email, None) {
            return Err(StoreError::Conflict);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email,
            name: user.name,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, id: Uuid, changes: ProfileChanges) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        let email = changes.email.as_deref().map(normalize_email);
        if let Some(email) = &email {
            if email_taken(&users, email, Some(id)) {
                return Err(StoreError::Conflict);
            }
        }

        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(name) = changes.name {
            user.name = Some(name);
        }
        if let Some(email) = email {
            user.email = email;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by_key(|user| user.created_at);
        Ok(users)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.users
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}
