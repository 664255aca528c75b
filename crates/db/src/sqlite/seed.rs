//! SQLite-Implementierung der Seed-Operationen (Benutzer, Sitzungen, Raeume)

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use treffpunkt_core::types::{AccountStatus, RoomId, UserId};
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{BenutzerRecord, NeuerRaum, RaumRecord, SitzungRecord};
use crate::repository::{DbResult, SeedRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::zeit_text;

/// Erzeugt ein zufaelliges, URL-sicheres Bearer-Token (256 Bit)
fn token_erzeugen() -> String {
    let mut bytes = [0u8; 32];
    bytes[..16].copy_from_slice(Uuid::new_v4().as_bytes());
    bytes[16..].copy_from_slice(Uuid::new_v4().as_bytes());
    URL_SAFE_NO_PAD.encode(bytes)
}

#[async_trait]
impl SeedRepository for SqliteDb {
    async fn create_user(&self, username: &str, status: AccountStatus) -> DbResult<BenutzerRecord> {
        let id = UserId::new();
        let now = Utc::now();

        sqlx::query("INSERT INTO users (id, username, status, created_at) VALUES (?, ?, ?, ?)")
            .bind(id.inner().to_string())
            .bind(username)
            .bind(status.als_str())
            .bind(zeit_text(now))
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    DbError::Eindeutigkeit(format!("Benutzername '{username}' bereits vergeben"))
                }
                anders => DbError::Sqlx(anders),
            })?;

        Ok(BenutzerRecord {
            id,
            username: username.to_string(),
            status,
            created_at: now,
        })
    }

    async fn create_session(
        &self,
        user_id: UserId,
        gueltigkeit: Duration,
    ) -> DbResult<SitzungRecord> {
        let token = token_erzeugen();
        let now = Utc::now();
        let expires_at = now + gueltigkeit;

        sqlx::query(
            "INSERT INTO user_sessions (token, user_id, created_at, expires_at, is_active)
             VALUES (?, ?, ?, ?, 1)",
        )
        .bind(&token)
        .bind(user_id.inner().to_string())
        .bind(zeit_text(now))
        .bind(zeit_text(expires_at))
        .execute(&self.pool)
        .await?;

        Ok(SitzungRecord {
            token,
            user_id,
            created_at: now,
            expires_at,
            is_active: true,
        })
    }

    async fn deactivate_session(&self, token: &str) -> DbResult<bool> {
        let affected = sqlx::query("UPDATE user_sessions SET is_active = 0 WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn set_user_status(&self, user_id: UserId, status: AccountStatus) -> DbResult<()> {
        let affected = sqlx::query("UPDATE users SET status = ? WHERE id = ?")
            .bind(status.als_str())
            .bind(user_id.inner().to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(DbError::nicht_gefunden(format!("Benutzer {user_id}")));
        }
        Ok(())
    }

    async fn create_room(&self, data: NeuerRaum<'_>) -> DbResult<RaumRecord> {
        if data.name.trim().is_empty() {
            return Err(DbError::UngueltigeDaten("Raumname darf nicht leer sein".into()));
        }

        let id = RoomId::new();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO rooms (id, name, description, is_public, is_active, max_users, created_at)
             VALUES (?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(id.inner().to_string())
        .bind(data.name)
        .bind(data.description)
        .bind(data.is_public)
        .bind(data.max_users)
        .bind(zeit_text(now))
        .execute(&self.pool)
        .await?;

        Ok(RaumRecord {
            id,
            name: data.name.to_string(),
            description: data.description.map(str::to_string),
            is_public: data.is_public,
            is_active: true,
            max_users: data.max_users,
            created_at: now,
        })
    }

    async fn set_room_active(&self, room_id: RoomId, is_active: bool) -> DbResult<()> {
        let affected = sqlx::query("UPDATE rooms SET is_active = ? WHERE id = ?")
            .bind(is_active)
            .bind(room_id.inner().to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(DbError::nicht_gefunden(format!("Raum {room_id}")));
        }
        Ok(())
    }

    async fn grant_membership(
        &self,
        user_id: UserId,
        room_id: RoomId,
        can_send_messages: bool,
    ) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO room_memberships
                (user_id, room_id, joined_at, left_at, is_active, can_send_messages)
             VALUES (?, ?, ?, NULL, 1, ?)
             ON CONFLICT(user_id, room_id) DO UPDATE SET
                joined_at = CASE
                    WHEN room_memberships.is_active = 0 THEN excluded.joined_at
                    ELSE room_memberships.joined_at
                END,
                left_at = NULL,
                is_active = 1,
                can_send_messages = excluded.can_send_messages",
        )
        .bind(user_id.inner().to_string())
        .bind(room_id.inner().to_string())
        .bind(zeit_text(Utc::now()))
        .bind(can_send_messages)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
