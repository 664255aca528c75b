//! SQLite-Backend-Implementierungen fuer alle Repository-Traits

pub mod memberships;
pub mod messages;
pub mod pool;
pub mod rooms;
pub mod seed;
pub mod sessions;

pub use pool::SqliteDb;

use chrono::{DateTime, Utc};
use std::str::FromStr;

use crate::error::DbError;
use crate::repository::DbResult;

/// Zeitstempel-Format in der Datenbank (lexikographisch sortierbar)
pub(crate) fn zeit_text(zeit: DateTime<Utc>) -> String {
    zeit.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

pub(crate) fn parse_timestamp(s: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Fallback fuer SQLite datetime()-Format
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| DbError::intern(format!("Ungueltige Zeitangabe '{s}': {e}")))
}

/// Parst eine als Text gespeicherte ID (`UserId`, `RoomId`, ...)
pub(crate) fn parse_id<T>(s: &str, spalte: &str) -> DbResult<T>
where
    T: FromStr<Err = uuid::Error>,
{
    s.parse::<T>()
        .map_err(|e| DbError::intern(format!("Ungueltige {spalte} UUID '{s}': {e}")))
}
