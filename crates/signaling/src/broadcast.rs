//! Message-Broadcaster – Raum-Nachrichten pruefen, speichern und verteilen
//!
//! ## Pruefreihenfolge beim Senden
//! 1. Session ist im Raum (`NotInRoom`)
//! 2. Raum existiert und ist aktiv (`RoomUnavailable`)
//! 3. Schreibrecht laut Mitgliedschaft (`PermissionDenied`)
//! 4. Inhalt nicht leer / nicht zu lang (ChatService)
//!
//! Danach wird gespeichert und an alle Sessions verteilt, die zum
//! Sendezeitpunkt im Raum sind (der Absender eingeschlossen).

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use treffpunkt_chat::{ChatNachricht, ChatService};
use treffpunkt_core::types::{MessageType, RoomId, SessionId};
use treffpunkt_db::Speicher;
use treffpunkt_protocol::{ChatMessageInfo, ServerEvent};

use crate::error::{SignalingError, SignalingResult};
use crate::registry::ConnectionRegistry;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue einer Verbindung
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub session_id: SessionId,
    tx: mpsc::Sender<ServerEvent>,
}

impl ClientSender {
    /// Erstellt eine begrenzte Send-Queue fuer eine Session
    pub fn neu(session_id: SessionId, groesse: usize) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(groesse);
        (Self { session_id, tx }, rx)
    }

    /// Sendet ein Ereignis nicht-blockierend an den Client
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, ereignis: ServerEvent) -> bool {
        match self.tx.try_send(ereignis) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(e)) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    ereignis = e.name(),
                    "Send-Queue voll – Ereignis verworfen"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(session_id = %self.session_id, "Send-Queue geschlossen (Client getrennt)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MessageBroadcaster
// ---------------------------------------------------------------------------

/// Ergebnis eines erfolgreichen Sendevorgangs
#[derive(Debug, Clone)]
pub struct Zustellung {
    pub nachricht: ChatNachricht,
    /// Anzahl der Queues, die das Ereignis angenommen haben
    pub empfaenger: usize,
}

#[derive(Clone)]
pub struct MessageBroadcaster {
    registry: ConnectionRegistry,
    speicher: Arc<dyn Speicher>,
    chat: ChatService,
}

impl MessageBroadcaster {
    pub fn neu(registry: ConnectionRegistry, speicher: Arc<dyn Speicher>, chat: ChatService) -> Self {
        Self {
            registry,
            speicher,
            chat,
        }
    }

    /// Sendet ein Ereignis an eine einzelne Session
    pub fn an_session_senden(&self, session_id: SessionId, ereignis: ServerEvent) -> bool {
        match self.registry.sender(session_id) {
            Some(sender) => sender.senden(ereignis),
            None => false,
        }
    }

    /// Sendet ein Ereignis an alle Sessions im Raum, optional ohne eine
    ///
    /// Gibt die Anzahl der erfolgreichen Zustellungen zurueck.
    pub fn an_raum_senden(
        &self,
        room_id: RoomId,
        ereignis: &ServerEvent,
        ausser: Option<SessionId>,
    ) -> usize {
        self.registry
            .connections_in_room(room_id)
            .into_iter()
            .filter(|s| Some(s.session_id) != ausser)
            .filter(|s| s.senden(ereignis.clone()))
            .count()
    }

    /// Nachricht einer Session in einen Raum senden
    pub async fn send(
        &self,
        session_id: SessionId,
        room_id: RoomId,
        content: &str,
        message_type: MessageType,
    ) -> SignalingResult<Zustellung> {
        let verbindung = self.registry.get(session_id)?;
        if !verbindung.joined_rooms.contains(&room_id) {
            return Err(SignalingError::NichtImRaum(room_id));
        }

        match self.speicher.get_room(room_id).await? {
            Some(raum) if raum.is_active => {}
            _ => return Err(SignalingError::RaumNichtVerfuegbar(room_id)),
        }

        if let Some(m) = self
            .speicher
            .get_membership(verbindung.user_id, room_id)
            .await?
        {
            if !m.can_send_messages {
                return Err(SignalingError::KeineSchreibberechtigung(room_id));
            }
        }

        let nachricht = self
            .chat
            .nachricht_senden(room_id, &verbindung.identitaet(), content, message_type)
            .await?;

        let ereignis = ServerEvent::NewMessage(ChatMessageInfo::from(nachricht.clone()));
        let empfaenger = self.an_raum_senden(room_id, &ereignis, None);

        tracing::debug!(
            session_id = %session_id,
            room_id = %room_id,
            message_id = %nachricht.id,
            empfaenger,
            "Nachricht verteilt"
        );

        Ok(Zustellung {
            nachricht,
            empfaenger,
        })
    }

    /// Nicht gespeicherte Systemmeldung an einen Raum
    pub fn system_message(&self, room_id: RoomId, content: &str) -> usize {
        let ereignis = ServerEvent::SystemMessage {
            room_id,
            content: content.to_string(),
            timestamp: Utc::now(),
        };
        self.an_raum_senden(room_id, &ereignis, None)
    }

    /// Tipp-Anzeige an die anderen Sessions im Raum
    ///
    /// Ignoriert, wenn die Session nicht im Raum ist.
    pub fn typing(&self, session_id: SessionId, room_id: RoomId, tippt: bool) -> usize {
        let Ok(verbindung) = self.registry.get(session_id) else {
            return 0;
        };
        if !verbindung.joined_rooms.contains(&room_id) {
            return 0;
        }

        let ereignis = ServerEvent::UserTyping {
            user_id: verbindung.user_id,
            username: verbindung.username,
            room_id,
            typing: tippt,
        };
        self.an_raum_senden(room_id, &ereignis, Some(session_id))
    }
}
