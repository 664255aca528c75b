//! SQLite-Implementierung des RoomRepository

use async_trait::async_trait;
use sqlx::Row as _;
use treffpunkt_core::types::{RoomId, UserId};

use crate::models::RaumRecord;
use crate::repository::{DbResult, RoomRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{parse_id, parse_timestamp};

#[async_trait]
impl RoomRepository for SqliteDb {
    async fn get_room(&self, room_id: RoomId) -> DbResult<Option<RaumRecord>> {
        let row = sqlx::query(
            "SELECT id, name, description, is_public, is_active, max_users, created_at
             FROM rooms WHERE id = ?",
        )
        .bind(room_id.inner().to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_raum(&r)).transpose()
    }

    async fn list_rooms_for_user(&self, user_id: UserId) -> DbResult<Vec<RaumRecord>> {
        let rows = sqlx::query(
            "SELECT r.id, r.name, r.description, r.is_public, r.is_active, r.max_users, r.created_at
             FROM rooms r
             WHERE r.is_active = 1
               AND (r.is_public = 1
                    OR EXISTS (SELECT 1 FROM room_memberships m
                               WHERE m.room_id = r.id AND m.user_id = ? AND m.is_active = 1))
             ORDER BY r.is_public DESC, r.name ASC",
        )
        .bind(user_id.inner().to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_raum).collect()
    }
}

pub(crate) fn row_to_raum(row: &sqlx::sqlite::SqliteRow) -> DbResult<RaumRecord> {
    let id_str: String = row.try_get("id")?;
    let created_str: String = row.try_get("created_at")?;

    Ok(RaumRecord {
        id: parse_id(&id_str, "room_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        is_public: row.try_get("is_public")?,
        is_active: row.try_get("is_active")?,
        max_users: row.try_get("max_users")?,
        created_at: parse_timestamp(&created_str)?,
    })
}
