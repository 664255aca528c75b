//! Repository-Trait-Definitionen
//!
//! Die Traits entkoppeln die Signaling-Logik von der konkreten
//! Datenbank. Sie sind per `async_trait` objektsicher, damit Dienste sie
//! als `Arc<dyn ...>` halten und ihre Futures `Send` sind.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use treffpunkt_core::types::{AccountStatus, RoomId, UserId};

use crate::error::DbError;
use crate::models::{
    BenutzerRecord, GespeicherteNachricht, MitgliedschaftRecord, NachrichtRecord, NeueNachricht,
    NeuerRaum, RaumRecord, SitzungRecord, TokenInhaber,
};

pub type DbResult<T> = Result<T, DbError>;

/// Konfiguration fuer die Datenbankverbindung
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Verbindungs-URL (z.B. "sqlite://treffpunkt.db")
    pub url: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// Ob der WAL-Modus aktiviert werden soll
    pub sqlite_wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://treffpunkt.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Sitzungen
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Sucht eine aktive, nicht abgelaufene Sitzung und liefert ihren Besitzer
    async fn verify_token(&self, token: &str) -> DbResult<Option<TokenInhaber>>;
}

// ---------------------------------------------------------------------------
// Raeume
// ---------------------------------------------------------------------------

#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn get_room(&self, room_id: RoomId) -> DbResult<Option<RaumRecord>>;

    /// Aktive oeffentliche Raeume plus aktive private Raeume, fuer die der
    /// Benutzer eine aktive Mitgliedschaft besitzt
    async fn list_rooms_for_user(&self, user_id: UserId) -> DbResult<Vec<RaumRecord>>;
}

// ---------------------------------------------------------------------------
// Mitgliedschaften
// ---------------------------------------------------------------------------

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    async fn get_membership(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> DbResult<Option<MitgliedschaftRecord>>;

    /// Legt die Mitgliedschaft an oder aktualisiert `is_active`/`left_at`.
    /// `can_send_messages` einer bestehenden Zeile bleibt unveraendert.
    async fn upsert_membership(
        &self,
        user_id: UserId,
        room_id: RoomId,
        is_active: bool,
        left_at: Option<DateTime<Utc>>,
    ) -> DbResult<()>;
}

// ---------------------------------------------------------------------------
// Nachrichten
// ---------------------------------------------------------------------------

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn append_message(&self, data: NeueNachricht<'_>) -> DbResult<GespeicherteNachricht>;

    /// Die neuesten nicht geloeschten Nachrichten eines Raums, neueste zuerst
    async fn recent_messages(&self, room_id: RoomId, limit: u32) -> DbResult<Vec<NachrichtRecord>>;
}

// ---------------------------------------------------------------------------
// Seed-Operationen (Betrieb und Tests)
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SeedRepository: Send + Sync {
    async fn create_user(&self, username: &str, status: AccountStatus) -> DbResult<BenutzerRecord>;

    /// Stellt eine neue Sitzung aus, gueltig fuer `gueltigkeit` ab jetzt
    async fn create_session(&self, user_id: UserId, gueltigkeit: Duration)
        -> DbResult<SitzungRecord>;

    async fn deactivate_session(&self, token: &str) -> DbResult<bool>;

    async fn set_user_status(&self, user_id: UserId, status: AccountStatus) -> DbResult<()>;

    async fn create_room(&self, data: NeuerRaum<'_>) -> DbResult<RaumRecord>;

    async fn set_room_active(&self, room_id: RoomId, is_active: bool) -> DbResult<()>;

    /// Erteilt Zugang zu einem Raum: Mitgliedschaft aktiv, mit dem
    /// angegebenen `can_send_messages`
    async fn grant_membership(
        &self,
        user_id: UserId,
        room_id: RoomId,
        can_send_messages: bool,
    ) -> DbResult<()>;
}

// ---------------------------------------------------------------------------
// Aggregat
// ---------------------------------------------------------------------------

/// Alles, was der Signaling-Kern vom Speicher braucht
pub trait Speicher: SessionRepository + RoomRepository + MembershipRepository + MessageRepository {}

impl<T> Speicher for T where
    T: SessionRepository + RoomRepository + MembershipRepository + MessageRepository
{
}
