//! Ereignis-Protokoll
//!
//! Alle Ereignisse sind JSON-Objekte mit einem `type`-Feld (snake_case),
//! das die Art des Ereignisses bestimmt.
//!
//! - [`ClientEvent`]: vom Client an den Server
//! - [`ServerEvent`]: vom Server an den Client

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use treffpunkt_core::types::{MessageId, MessageType, RoomId, SessionId, UserId};

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// Eingehendes Ereignis eines Clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Muss das erste Ereignis jeder Verbindung sein
    Connect { token: String },
    JoinRoom { room_id: RoomId },
    LeaveRoom { room_id: RoomId },
    SendMessage {
        room_id: RoomId,
        content: String,
        #[serde(default)]
        message_type: MessageType,
    },
    TypingStart { room_id: RoomId },
    TypingStop { room_id: RoomId },
    GetRoomUsers { room_id: RoomId },
}

impl ClientEvent {
    /// Name des Ereignisses wie auf dem Draht (fuer Logging)
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom { .. } => "leave_room",
            Self::SendMessage { .. } => "send_message",
            Self::TypingStart { .. } => "typing_start",
            Self::TypingStop { .. } => "typing_stop",
            Self::GetRoomUsers { .. } => "get_room_users",
        }
    }
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Kurzinfo zu einem Raum (Teil von `available_rooms`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub id: RoomId,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    /// Anzahl der aktuell online anwesenden Benutzer
    pub user_count: usize,
}

/// Eine gespeicherte Chat-Nachricht wie sie an Clients ausgeliefert wird
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessageInfo {
    pub id: MessageId,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub username: String,
    pub content: String,
    pub message_type: MessageType,
    pub timestamp: DateTime<Utc>,
}

/// Online-Benutzer eines Raums (Teil von `room_users`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomUserInfo {
    pub user_id: UserId,
    pub username: String,
    /// Anzahl der Verbindungen dieses Benutzers im Raum
    pub connections: usize,
}

/// Ausgehendes Ereignis an einen Client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected {
        user_id: UserId,
        username: String,
        session_id: SessionId,
        timestamp: DateTime<Utc>,
    },
    AvailableRooms {
        rooms: Vec<RoomInfo>,
    },
    RoomJoined {
        room_id: RoomId,
        room_name: String,
        user_count: usize,
        timestamp: DateTime<Utc>,
    },
    RoomLeft {
        room_id: RoomId,
        timestamp: DateTime<Utc>,
    },
    UserJoined {
        user_id: UserId,
        username: String,
        room_id: RoomId,
        timestamp: DateTime<Utc>,
    },
    UserLeft {
        user_id: UserId,
        username: String,
        room_id: RoomId,
        timestamp: DateTime<Utc>,
    },
    NewMessage(ChatMessageInfo),
    RecentMessages {
        room_id: RoomId,
        messages: Vec<ChatMessageInfo>,
    },
    UserTyping {
        user_id: UserId,
        username: String,
        room_id: RoomId,
        typing: bool,
    },
    RoomUsers {
        room_id: RoomId,
        users: Vec<RoomUserInfo>,
    },
    /// Beliebige Benachrichtigung an einen einzelnen Benutzer
    Notification {
        payload: serde_json::Value,
    },
    /// Nicht gespeicherte Systemmeldung an einen Raum
    SystemMessage {
        room_id: RoomId,
        content: String,
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    /// Erstellt ein Fehler-Ereignis
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Name des Ereignisses wie auf dem Draht
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::AvailableRooms { .. } => "available_rooms",
            Self::RoomJoined { .. } => "room_joined",
            Self::RoomLeft { .. } => "room_left",
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
            Self::NewMessage(_) => "new_message",
            Self::RecentMessages { .. } => "recent_messages",
            Self::UserTyping { .. } => "user_typing",
            Self::RoomUsers { .. } => "room_users",
            Self::Notification { .. } => "notification",
            Self::SystemMessage { .. } => "system_message",
            Self::Error { .. } => "error",
        }
    }
}
