use anyhow::{Context, anyhow};
use async_trait::async_trait;
use sqlx::{Connection, PgPool, Row, postgres::PgRow};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use super::{CredentialStore, NewUser, ProfileChanges, Role, StoreError, User, normalize_email};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const USER_COLUMNS: &str = "id, email, name, password_hash, role, created_at, updated_at";

/// Create the `users` table and its indexes if they do not exist yet.
///
/// # Errors
/// Returns an error if the schema statements fail.
pub async fn apply_schema(pool: &PgPool) -> anyhow::Result<()> {
    let span = info_span!("db.query", db.system = "postgresql", db.operation = "DDL");
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .instrument(span)
        .await
        .context("Failed to apply users schema")?;
    Ok(())
}

#[derive(Clone, Debug)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    if is_unique_violation(&err) {
        return StoreError::Conflict;
    }
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        other => StoreError::Internal(other.into()),
    }
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let role: String = row.try_get("role").map_err(map_sqlx_error)?;
    let role = role
        .parse::<Role>()
        .map_err(|err| StoreError::Internal(anyhow!(err)))?;

    Ok(User {
        id: row.try_get("id").map_err(map_sqlx_error)?,
        email: row.try_get("email").map_err(map_sqlx_error)?,
        name: row.try_get("name").map_err(map_sqlx_error)?,
        password_hash: row.try_get("password_hash").map_err(map_sqlx_error)?,
        role,
        created_at: row.try_get("created_at").map_err(map_sqlx_error)?,
        updated_at: row.try_get("updated_at").map_err(map_sqlx_error)?,
    })
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = $1");
        let span = info_span!("db.query", db.system = "postgresql", db.operation = "SELECT");
        let row = sqlx::query(&query)
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(map_sqlx_error)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let span = info_span!("db.query", db.system = "postgresql", db.operation = "SELECT");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(map_sqlx_error)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let query = format!(
            "INSERT INTO users (id, email, name, password_hash, role) VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );
        let span = info_span!("db.query", db.system = "postgresql", db.operation = "INSERT");
        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(normalize_email(&user.email))
            .bind(user.name)
            .bind(user.password_hash)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .map_err(map_sqlx_error)?;
        user_from_row(&row)
    }

    async fn update(&self, id: Uuid, changes: ProfileChanges) -> Result<User, StoreError> {
        let query = format!(
            "UPDATE users SET name = COALESCE($2, name), email = COALESCE($3, email), updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let span = info_span!("db.query", db.system = "postgresql", db.operation = "UPDATE");
        let row = sqlx::query(&query)
            .bind(id)
            .bind(changes.name)
            .bind(changes.email.as_deref().map(normalize_email))
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(map_sqlx_error)?
            .ok_or(StoreError::NotFound)?;
        user_from_row(&row)
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let query = "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1";
        let span = info_span!("db.query", db.system = "postgresql", db.operation = "UPDATE");
        let result = sqlx::query(query)
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at");
        let span = info_span!("db.query", db.system = "postgresql", db.operation = "SELECT");
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(user_from_row).collect()
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let span = info_span!("db.query", db.system = "postgresql", db.operation = "DELETE");
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        async {
            let mut conn = self.pool.acquire().await?;
            conn.ping().await
        }
        .instrument(span)
        .await
        .map_err(map_sqlx_error)
    }
}
