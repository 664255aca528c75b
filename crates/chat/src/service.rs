//! ChatService – Nachrichten pruefen, speichern und Verlauf laden

use std::sync::Arc;

use treffpunkt_core::types::{MessageType, RoomId, UserIdentity};
use treffpunkt_db::{models::NeueNachricht, MessageRepository};

use crate::{
    error::{ChatError, ChatResult},
    types::ChatNachricht,
};

/// Maximale Nachrichtenlaenge in Zeichen
pub const MAX_NACHRICHTEN_LAENGE: usize = 4096;

/// Anzahl der Nachrichten, die beim Betreten eines Raums geladen werden
pub const STANDARD_VERLAUF_LIMIT: u32 = 50;

/// ChatService verwaltet Text-Nachrichten in Raeumen
#[derive(Clone)]
pub struct ChatService {
    repo: Arc<dyn MessageRepository>,
    verlauf_limit: u32,
}

impl ChatService {
    pub fn neu(repo: Arc<dyn MessageRepository>) -> Self {
        Self {
            repo,
            verlauf_limit: STANDARD_VERLAUF_LIMIT,
        }
    }

    /// Setzt die Anzahl der Nachrichten fuer [`Self::verlauf_laden`]
    pub fn mit_verlauf_limit(mut self, limit: u32) -> Self {
        self.verlauf_limit = limit;
        self
    }

    /// Prueft den Inhalt und gibt ihn ohne fuehrende/abschliessende
    /// Leerzeichen zurueck
    pub fn inhalt_pruefen(content: &str) -> ChatResult<&str> {
        let inhalt = content.trim();
        if inhalt.is_empty() {
            return Err(ChatError::LeereNachricht);
        }

        let laenge = inhalt.chars().count();
        if laenge > MAX_NACHRICHTEN_LAENGE {
            return Err(ChatError::NachrichtZuLang {
                laenge,
                max: MAX_NACHRICHTEN_LAENGE,
            });
        }

        Ok(inhalt)
    }

    /// Nachricht in einem Raum speichern
    ///
    /// Die Mitgliedschaft wird hier nicht geprueft, das ist Sache des Aufrufers.
    pub async fn nachricht_senden(
        &self,
        room_id: RoomId,
        absender: &UserIdentity,
        content: &str,
        message_type: MessageType,
    ) -> ChatResult<ChatNachricht> {
        let inhalt = Self::inhalt_pruefen(content)?;

        let gespeichert = self
            .repo
            .append_message(NeueNachricht {
                user_id: absender.user_id,
                room_id,
                content: inhalt,
                message_type,
            })
            .await?;

        tracing::debug!(
            message_id = %gespeichert.id,
            room_id = %room_id,
            user_id = %absender.user_id,
            "Nachricht gespeichert"
        );

        Ok(ChatNachricht {
            id: gespeichert.id,
            room_id,
            user_id: absender.user_id,
            username: absender.username.clone(),
            content: inhalt.to_string(),
            message_type,
            created_at: gespeichert.created_at,
        })
    }

    /// Die letzten Nachrichten eines Raums, aelteste zuerst
    pub async fn verlauf_laden(&self, room_id: RoomId) -> ChatResult<Vec<ChatNachricht>> {
        let mut records = self.repo.recent_messages(room_id, self.verlauf_limit).await?;
        records.reverse();
        Ok(records.into_iter().map(ChatNachricht::from).collect())
    }
}
