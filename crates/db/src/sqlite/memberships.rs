//! SQLite-Implementierung des MembershipRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row as _;
use treffpunkt_core::types::{RoomId, UserId};

use crate::models::MitgliedschaftRecord;
use crate::repository::{DbResult, MembershipRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{parse_id, parse_timestamp, zeit_text};

#[async_trait]
impl MembershipRepository for SqliteDb {
    async fn get_membership(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> DbResult<Option<MitgliedschaftRecord>> {
        let row = sqlx::query(
            "SELECT user_id, room_id, joined_at, left_at, is_active, can_send_messages
             FROM room_memberships
             WHERE user_id = ? AND room_id = ?",
        )
        .bind(user_id.inner().to_string())
        .bind(room_id.inner().to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_mitgliedschaft(&r)).transpose()
    }

    async fn upsert_membership(
        &self,
        user_id: UserId,
        room_id: RoomId,
        is_active: bool,
        left_at: Option<DateTime<Utc>>,
    ) -> DbResult<()> {
        let jetzt = zeit_text(Utc::now());

        // joined_at wird nur bei einem Uebergang inaktiv -> aktiv erneuert
        sqlx::query(
            "INSERT INTO room_memberships (user_id, room_id, joined_at, left_at, is_active)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(user_id, room_id) DO UPDATE SET
                joined_at = CASE
                    WHEN excluded.is_active = 1 AND room_memberships.is_active = 0
                    THEN excluded.joined_at
                    ELSE room_memberships.joined_at
                END,
                left_at = excluded.left_at,
                is_active = excluded.is_active",
        )
        .bind(user_id.inner().to_string())
        .bind(room_id.inner().to_string())
        .bind(&jetzt)
        .bind(left_at.map(zeit_text))
        .bind(is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

pub(crate) fn row_to_mitgliedschaft(row: &sqlx::sqlite::SqliteRow) -> DbResult<MitgliedschaftRecord> {
    let user_str: String = row.try_get("user_id")?;
    let room_str: String = row.try_get("room_id")?;
    let joined_str: String = row.try_get("joined_at")?;
    let left_str: Option<String> = row.try_get("left_at")?;

    Ok(MitgliedschaftRecord {
        user_id: parse_id(&user_str, "user_id")?,
        room_id: parse_id(&room_str, "room_id")?,
        joined_at: parse_timestamp(&joined_str)?,
        left_at: left_str.as_deref().map(parse_timestamp).transpose()?,
        is_active: row.try_get("is_active")?,
        can_send_messages: row.try_get("can_send_messages")?,
    })
}
