//! User repository.
//!
//! Users are created on first contact and refreshed from the platform profile
//! on every later contact. They are never deleted.

use super::{DbError, from_millis, now};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// A bot user, keyed by the platform user id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Display attributes reported by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

type UserRow = (
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    bool,
    i64,
    i64,
);

fn from_row(
    (id, first_name, last_name, username, is_admin, created_at, updated_at): UserRow,
) -> User {
    User {
        id,
        first_name,
        last_name,
        username,
        is_admin,
        created_at: from_millis(created_at),
        updated_at: from_millis(updated_at),
    }
}

/// Repository for user operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Find a user by platform id.
    pub async fn find(&self, id: &str) -> Result<Option<User>, DbError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, first_name, last_name, username, is_admin, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(from_row))
    }

    /// Create the user or refresh its display attributes.
    ///
    /// The admin flag is never touched here.
    pub async fn upsert(&self, id: &str, profile: &UserProfile) -> Result<User, DbError> {
        let ts = now().timestamp_millis();
        sqlx::query(
            r#"
            INSERT INTO users (id, first_name, last_name, username, is_admin, created_at, updated_at)
            VALUES (?, ?, ?, ?, 0, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                username = excluded.username,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.username)
        .bind(ts)
        .bind(ts)
        .execute(self.pool)
        .await?;

        self.find(id)
            .await?
            .ok_or_else(|| DbError::UserNotFound(id.to_string()))
    }

    /// Make sure a row exists without overwriting known attributes.
    pub async fn ensure(&self, id: &str) -> Result<User, DbError> {
        let ts = now().timestamp_millis();
        sqlx::query(
            r#"
            INSERT INTO users (id, is_admin, created_at, updated_at)
            VALUES (?, 0, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(ts)
        .bind(ts)
        .execute(self.pool)
        .await?;

        self.find(id)
            .await?
            .ok_or_else(|| DbError::UserNotFound(id.to_string()))
    }

    /// Set or clear the admin flag. Returns `false` when the user is unknown.
    pub async fn set_admin(&self, id: &str, is_admin: bool) -> Result<bool, DbError> {
        let result = sqlx::query("UPDATE users SET is_admin = ?, updated_at = ? WHERE id = ?")
            .bind(is_admin)
            .bind(now().timestamp_millis())
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Create each listed user if needed and flag it as admin.
    ///
    /// Returns how many users were not admins before.
    pub async fn grant_admins(&self, ids: &[String]) -> Result<usize, DbError> {
        let mut promoted = 0;
        for id in ids {
            if !self.ensure(id).await?.is_admin {
                self.set_admin(id, true).await?;
                promoted += 1;
            }
        }
        Ok(promoted)
    }
}
