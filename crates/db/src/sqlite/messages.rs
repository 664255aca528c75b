//! SQLite-Implementierung des MessageRepository

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row as _;
use treffpunkt_core::types::{MessageId, MessageType, RoomId};

use crate::error::DbError;
use crate::models::{GespeicherteNachricht, NachrichtRecord, NeueNachricht};
use crate::repository::{DbResult, MessageRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{parse_id, parse_timestamp, zeit_text};

#[async_trait]
impl MessageRepository for SqliteDb {
    async fn append_message(&self, data: NeueNachricht<'_>) -> DbResult<GespeicherteNachricht> {
        let id = MessageId::new();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO chat_messages (id, room_id, user_id, content, message_type, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id.inner().to_string())
        .bind(data.room_id.inner().to_string())
        .bind(data.user_id.inner().to_string())
        .bind(data.content)
        .bind(data.message_type.als_str())
        .bind(zeit_text(now))
        .execute(&self.pool)
        .await?;

        Ok(GespeicherteNachricht { id, created_at: now })
    }

    async fn recent_messages(&self, room_id: RoomId, limit: u32) -> DbResult<Vec<NachrichtRecord>> {
        let rows = sqlx::query(
            "SELECT m.id, m.room_id, m.user_id, u.username, m.content, m.message_type,
                    m.created_at, m.is_edited, m.is_deleted
             FROM chat_messages m
             JOIN users u ON u.id = m.user_id
             WHERE m.room_id = ? AND m.is_deleted = 0
             ORDER BY m.created_at DESC, m.rowid DESC
             LIMIT ?",
        )
        .bind(room_id.inner().to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_nachricht).collect()
    }
}

pub(crate) fn row_to_nachricht(row: &sqlx::sqlite::SqliteRow) -> DbResult<NachrichtRecord> {
    let id_str: String = row.try_get("id")?;
    let room_str: String = row.try_get("room_id")?;
    let user_str: String = row.try_get("user_id")?;
    let created_str: String = row.try_get("created_at")?;
    let typ_str: String = row.try_get("message_type")?;

    Ok(NachrichtRecord {
        id: parse_id(&id_str, "message_id")?,
        room_id: parse_id(&room_str, "room_id")?,
        user_id: parse_id(&user_str, "user_id")?,
        username: row.try_get("username")?,
        content: row.try_get("content")?,
        message_type: typ_str.parse::<MessageType>().map_err(DbError::intern)?,
        created_at: parse_timestamp(&created_str)?,
        is_edited: row.try_get("is_edited")?,
        is_deleted: row.try_get("is_deleted")?,
    })
}
