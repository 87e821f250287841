//! Participant repository.
//!
//! A participant links a user to a room. It carries the room-scoped username
//! (never the user's platform name) and the activity flag that decides
//! whether the user sends and receives room broadcasts.

use super::{DbError, from_millis, is_unique_violation, now};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Membership of one user in one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub room_id: String,
    pub user_id: String,
    pub username: Option<String>,
    pub is_active: bool,
    #[serde(with = "crate::cache::codec::timestamp_opt")]
    pub exited_at: Option<DateTime<Utc>>,
    #[serde(with = "crate::cache::codec::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::cache::codec::timestamp")]
    pub updated_at: DateTime<Utc>,
}

type ParticipantRow = (
    String,
    String,
    Option<String>,
    bool,
    Option<i64>,
    i64,
    i64,
);

const PARTICIPANT_COLUMNS: &str =
    "room_id, user_id, username, is_active, exited_at, created_at, updated_at";

fn from_row(
    (room_id, user_id, username, is_active, exited_at, created_at, updated_at): ParticipantRow,
) -> Participant {
    Participant {
        room_id,
        user_id,
        username,
        is_active,
        exited_at: exited_at.map(from_millis),
        created_at: from_millis(created_at),
        updated_at: from_millis(updated_at),
    }
}

/// Repository for participant operations.
pub struct ParticipantRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ParticipantRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Find the `(room, user)` participant.
    pub async fn find(&self, room_id: &str, user_id: &str) -> Result<Option<Participant>, DbError> {
        let row = sqlx::query_as::<_, ParticipantRow>(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE room_id = ? AND user_id = ?"
        ))
        .bind(room_id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(from_row))
    }

    /// Insert the participant or reset an existing one to inactive.
    ///
    /// The username survives the reset.
    pub async fn upsert_inactive(&self, room_id: &str, user_id: &str) -> Result<Participant, DbError> {
        let ts = now().timestamp_millis();
        sqlx::query(
            r#"
            INSERT INTO participants (room_id, user_id, is_active, created_at, updated_at)
            VALUES (?, ?, 0, ?, ?)
            ON CONFLICT(room_id, user_id) DO UPDATE SET
                is_active = 0,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .bind(ts)
        .bind(ts)
        .execute(self.pool)
        .await?;

        self.require(room_id, user_id).await
    }

    /// Activate the participant under `username`, creating it if needed.
    ///
    /// Fails with [`DbError::UsernameTaken`] when another active participant
    /// of the room holds the name.
    pub async fn activate(
        &self,
        room_id: &str,
        user_id: &str,
        username: &str,
    ) -> Result<Participant, DbError> {
        let ts = now().timestamp_millis();
        sqlx::query(
            r#"
            INSERT INTO participants (room_id, user_id, username, is_active, created_at, updated_at)
            VALUES (?, ?, ?, 1, ?, ?)
            ON CONFLICT(room_id, user_id) DO UPDATE SET
                username = excluded.username,
                is_active = 1,
                exited_at = NULL,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .bind(username)
        .bind(ts)
        .bind(ts)
        .execute(self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return DbError::UsernameTaken(username.to_string());
            }
            DbError::from(e)
        })?;

        self.require(room_id, user_id).await
    }

    /// Mark the participant as exited. Returns `false` if it was not active.
    pub async fn deactivate(&self, room_id: &str, user_id: &str) -> Result<bool, DbError> {
        let ts = now().timestamp_millis();
        let result = sqlx::query(
            r#"
            UPDATE participants
            SET is_active = 0, exited_at = ?, updated_at = ?
            WHERE room_id = ? AND user_id = ? AND is_active = 1
            "#,
        )
        .bind(ts)
        .bind(ts)
        .bind(room_id)
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// The active participant of `room_id` holding `username`, if any.
    ///
    /// Names compare case-insensitively.
    pub async fn find_active_by_username(
        &self,
        room_id: &str,
        username: &str,
    ) -> Result<Option<Participant>, DbError> {
        let row = sqlx::query_as::<_, ParticipantRow>(&format!(
            r#"
            SELECT {PARTICIPANT_COLUMNS} FROM participants
            WHERE room_id = ? AND username = ? COLLATE NOCASE AND is_active = 1
            "#
        ))
        .bind(room_id)
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(from_row))
    }

    /// The row that best describes where the user is now: an active
    /// membership if there is one, else the most recently touched.
    pub async fn find_latest_for_user(&self, user_id: &str) -> Result<Option<Participant>, DbError> {
        let row = sqlx::query_as::<_, ParticipantRow>(&format!(
            r#"
            SELECT {PARTICIPANT_COLUMNS} FROM participants
            WHERE user_id = ?
            ORDER BY is_active DESC, updated_at DESC
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(from_row))
    }

    /// All active participants of a room.
    pub async fn list_active(&self, room_id: &str) -> Result<Vec<Participant>, DbError> {
        let rows = sqlx::query_as::<_, ParticipantRow>(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE room_id = ? AND is_active = 1"
        ))
        .bind(room_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(from_row).collect())
    }

    async fn require(&self, room_id: &str, user_id: &str) -> Result<Participant, DbError> {
        self.find(room_id, user_id)
            .await?
            .ok_or_else(|| DbError::Corrupt(format!("participant {room_id}:{user_id} vanished")))
    }
}
