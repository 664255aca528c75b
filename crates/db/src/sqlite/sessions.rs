//! SQLite-Implementierung des SessionRepository

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row as _;
use treffpunkt_core::types::{AccountStatus, UserId};

use crate::error::DbError;
use crate::models::TokenInhaber;
use crate::repository::{DbResult, SessionRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{parse_id, parse_timestamp};

#[async_trait]
impl SessionRepository for SqliteDb {
    async fn verify_token(&self, token: &str) -> DbResult<Option<TokenInhaber>> {
        let row = sqlx::query(
            "SELECT s.user_id, s.expires_at, u.username, u.status
             FROM user_sessions s
             JOIN users u ON u.id = s.user_id
             WHERE s.token = ? AND s.is_active = 1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let expires_str: String = row.try_get("expires_at")?;
        if parse_timestamp(&expires_str)? <= Utc::now() {
            tracing::debug!("Sitzung abgelaufen");
            return Ok(None);
        }

        let user_str: String = row.try_get("user_id")?;
        let status_str: String = row.try_get("status")?;

        Ok(Some(TokenInhaber {
            user_id: parse_id::<UserId>(&user_str, "user_id")?,
            username: row.try_get("username")?,
            status: status_str
                .parse::<AccountStatus>()
                .map_err(DbError::intern)?,
        }))
    }
}
