//! Room repository.
//!
//! Rooms are created by admins, joined by code, and soft-deactivated; a room
//! row is never deleted.

use super::{DbError, Participant, from_millis, is_unique_violation, now};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

/// A chat room reachable by its join code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub is_active: bool,
    #[serde(with = "crate::cache::codec::timestamp_opt")]
    pub blocked_at: Option<DateTime<Utc>>,
    #[serde(with = "crate::cache::codec::timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create a room.
#[derive(Debug, Clone)]
pub struct NewRoom {
    pub code: String,
    pub title: String,
    pub description: Option<String>,
}

/// One page of a user's rooms.
#[derive(Debug, Clone)]
pub struct RoomPage {
    pub rooms: Vec<Room>,
    pub total: u64,
    pub skip: u64,
    pub take: u64,
}

impl RoomPage {
    /// Number of pages of `take` rooms needed to show `total`.
    pub fn total_pages(&self) -> u64 {
        if self.take == 0 {
            return 0;
        }
        self.total.div_ceil(self.take)
    }
}

type RoomRow = (
    String,
    String,
    String,
    Option<String>,
    bool,
    Option<i64>,
    i64,
);

const ROOM_COLUMNS: &str = "id, code, title, description, is_active, blocked_at, created_at";

fn from_row(
    (id, code, title, description, is_active, blocked_at, created_at): RoomRow,
) -> Room {
    Room {
        id,
        code,
        title,
        description,
        is_active,
        blocked_at: blocked_at.map(from_millis),
        created_at: from_millis(created_at),
    }
}

/// Repository for room operations.
pub struct RoomRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RoomRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Find a room by id, active or not.
    pub async fn find(&self, id: &str) -> Result<Option<Room>, DbError> {
        let row = sqlx::query_as::<_, RoomRow>(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(from_row))
    }

    /// Find a room by code, active or not.
    pub async fn find_by_code(&self, code: &str) -> Result<Option<Room>, DbError> {
        let row = sqlx::query_as::<_, RoomRow>(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms WHERE code = ?"
        ))
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(from_row))
    }

    /// Find an active room by code.
    pub async fn find_active_by_code(&self, code: &str) -> Result<Option<Room>, DbError> {
        let row = sqlx::query_as::<_, RoomRow>(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms WHERE code = ? AND is_active = 1"
        ))
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(from_row))
    }

    /// Create a new active room with a generated id.
    pub async fn create(&self, new: &NewRoom) -> Result<Room, DbError> {
        let room = Room {
            id: Uuid::new_v4().to_string(),
            code: new.code.clone(),
            title: new.title.clone(),
            description: new.description.clone(),
            is_active: true,
            blocked_at: None,
            created_at: now(),
        };

        sqlx::query(
            r#"
            INSERT INTO rooms (id, code, title, description, is_active, created_at)
            VALUES (?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(&room.id)
        .bind(&room.code)
        .bind(&room.title)
        .bind(&room.description)
        .bind(room.created_at.timestamp_millis())
        .execute(self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return DbError::RoomCodeTaken(new.code.clone());
            }
            DbError::from(e)
        })?;

        Ok(room)
    }

    /// Deactivate a room and every active participant in it.
    ///
    /// Returns the room as stored plus the ids of the users that were active
    /// in it. Deactivating an already inactive room is a no-op that returns no
    /// users.
    pub async fn deactivate(&self, id: &str) -> Result<(Room, Vec<String>), DbError> {
        let ts = now().timestamp_millis();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, RoomRow>(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Err(DbError::RoomNotFound(id.to_string()));
        };
        let mut room = from_row(row);
        if !room.is_active {
            return Ok((room, Vec::new()));
        }

        sqlx::query("UPDATE rooms SET is_active = 0, blocked_at = ? WHERE id = ?")
            .bind(ts)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let user_ids = sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM participants WHERE room_id = ? AND is_active = 1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE participants
            SET is_active = 0, exited_at = ?, updated_at = ?
            WHERE room_id = ? AND is_active = 1
            "#,
        )
        .bind(ts)
        .bind(ts)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        room.is_active = false;
        room.blocked_at = Some(from_millis(ts));
        Ok((room, user_ids))
    }

    /// Join-by-code.
    ///
    /// Returns `None` when no active room has `code`. Otherwise upserts the
    /// `(room, user)` participant with `is_active = false`, whatever its
    /// previous state, so a username must always be confirmed again. A
    /// previously chosen username is kept and returned.
    pub async fn add_participant(
        &self,
        code: &str,
        user_id: &str,
    ) -> Result<Option<Participant>, DbError> {
        let Some(room) = self.find_active_by_code(code).await? else {
            return Ok(None);
        };

        let participant = super::ParticipantRepository::new(self.pool)
            .upsert_inactive(&room.id, user_id)
            .await?;
        Ok(Some(participant))
    }

    /// Rooms the user has ever joined, newest membership first.
    pub async fn user_rooms(&self, user_id: &str, skip: u64, take: u64) -> Result<RoomPage, DbError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM participants WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(self.pool)
                .await?;

        let rows = sqlx::query_as::<_, RoomRow>(
            r#"
            SELECT r.id, r.code, r.title, r.description, r.is_active, r.blocked_at, r.created_at
            FROM participants p
            JOIN rooms r ON r.id = p.room_id
            WHERE p.user_id = ?
            ORDER BY p.updated_at DESC, r.created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(i64::try_from(take).unwrap_or(i64::MAX))
        .bind(i64::try_from(skip).unwrap_or(i64::MAX))
        .fetch_all(self.pool)
        .await?;

        Ok(RoomPage {
            rooms: rows.into_iter().map(from_row).collect(),
            total: u64::try_from(total).unwrap_or(0),
            skip,
            take,
        })
    }
}
