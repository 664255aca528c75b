//! Datenbank-Modelle (Records)
//!
//! Jeder Record entspricht einer Zeile in der jeweiligen Tabelle.
//! `Neue*`-Structs sind Eingaben fuer Insert-Operationen.

use chrono::{DateTime, Utc};
use treffpunkt_core::types::{AccountStatus, MessageId, MessageType, RoomId, UserId};

// ---------------------------------------------------------------------------
// Benutzer & Sitzungen
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenutzerRecord {
    pub id: UserId,
    pub username: String,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
}

/// Eine ausgegebene Sitzung (Bearer-Token)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitzungRecord {
    pub token: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

/// Ergebnis von `verify_token`: der Besitzer einer gueltigen Sitzung
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInhaber {
    pub user_id: UserId,
    pub username: String,
    pub status: AccountStatus,
}

// ---------------------------------------------------------------------------
// Raeume
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaumRecord {
    pub id: RoomId,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub is_active: bool,
    pub max_users: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NeuerRaum<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub is_public: bool,
    pub max_users: u32,
}

impl Default for NeuerRaum<'_> {
    fn default() -> Self {
        Self {
            name: "",
            description: None,
            is_public: true,
            max_users: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// Mitgliedschaften
// ---------------------------------------------------------------------------

/// Dauerhafte Mitgliedschaft eines Benutzers in einem Raum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MitgliedschaftRecord {
    pub user_id: UserId,
    pub room_id: RoomId,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub can_send_messages: bool,
}

// ---------------------------------------------------------------------------
// Nachrichten
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NeueNachricht<'a> {
    pub user_id: UserId,
    pub room_id: RoomId,
    pub content: &'a str,
    pub message_type: MessageType,
}

/// Vom Speicher vergebene Daten einer neu angelegten Nachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GespeicherteNachricht {
    pub id: MessageId,
    pub created_at: DateTime<Utc>,
}

/// Gespeicherte Nachricht inkl. Benutzername des Absenders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NachrichtRecord {
    pub id: MessageId,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub username: String,
    pub content: String,
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
    pub is_edited: bool,
    pub is_deleted: bool,
}
