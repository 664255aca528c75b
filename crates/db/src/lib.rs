//! treffpunkt-db – Datenbank-Abstraktion
//!
//! Stellt das Repository-Pattern fuer Sitzungen, Raeume, Mitgliedschaften
//! und Nachrichten bereit. Die Standard-Implementierung ist SQLite
//! ([`SqliteDb`]); Tests verwenden [`SqliteDb::in_memory`].

pub mod error;
pub mod models;
pub mod repository;
pub mod sqlite;

pub use error::DbError;
pub use repository::{
    DatabaseConfig, DbResult, MembershipRepository, MessageRepository, RoomRepository,
    SeedRepository, SessionRepository, Speicher,
};
pub use sqlite::SqliteDb;
