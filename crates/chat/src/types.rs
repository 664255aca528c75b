//! Oeffentliche Typen fuer den Chat-Service

use chrono::{DateTime, Utc};
use treffpunkt_core::types::{MessageId, MessageType, RoomId, UserId};
use treffpunkt_db::models::NachrichtRecord;
use treffpunkt_protocol::ChatMessageInfo;

/// Eine Chat-Nachricht (Domain-Typ, nicht DB-Record)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatNachricht {
    pub id: MessageId,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub username: String,
    pub content: String,
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
}

impl From<NachrichtRecord> for ChatNachricht {
    fn from(record: NachrichtRecord) -> Self {
        Self {
            id: record.id,
            room_id: record.room_id,
            user_id: record.user_id,
            username: record.username,
            content: record.content,
            message_type: record.message_type,
            created_at: record.created_at,
        }
    }
}

impl From<ChatNachricht> for ChatMessageInfo {
    fn from(n: ChatNachricht) -> Self {
        Self {
            id: n.id,
            room_id: n.room_id,
            user_id: n.user_id,
            username: n.username,
            content: n.content,
            message_type: n.message_type,
            timestamp: n.created_at,
        }
    }
}
