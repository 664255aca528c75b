//! Message-Dispatcher – Routet Client-Ereignisse an die richtigen Handler
//!
//! Der Dispatcher wird erst nach einem erfolgreichen `connect` benutzt.
//! Fehler eines Handlers gehen als `error`-Ereignis nur an die
//! verursachende Session; die Verbindung bleibt bestehen.

use std::sync::Arc;

use treffpunkt_core::types::SessionId;
use treffpunkt_protocol::{ClientEvent, ServerEvent};

use crate::error::{SignalingError, SignalingResult};
use crate::handlers::{chat_handler, room_handler};
use crate::server_state::SignalingState;

/// Zentraler Message-Dispatcher
#[derive(Clone)]
pub struct MessageDispatcher {
    state: Arc<SignalingState>,
}

impl MessageDispatcher {
    pub fn neu(state: Arc<SignalingState>) -> Self {
        Self { state }
    }

    /// Verarbeitet ein Ereignis einer authentifizierten Session
    ///
    /// Gibt den Fehler zusaetzlich zurueck, nachdem er an die Session
    /// gemeldet wurde.
    pub async fn dispatch(&self, session_id: SessionId, ereignis: ClientEvent) -> SignalingResult<()> {
        let name = ereignis.name();
        tracing::trace!(session_id = %session_id, ereignis = name, "Ereignis empfangen");

        let ergebnis = self.weiterleiten(session_id, ereignis).await;

        if let Err(ref e) = ergebnis {
            tracing::debug!(
                session_id = %session_id,
                ereignis = name,
                fehler = %e,
                "Ereignis abgelehnt"
            );
            self.state
                .broadcaster
                .an_session_senden(session_id, ServerEvent::error(e.client_meldung()));
        }
        ergebnis
    }

    async fn weiterleiten(&self, session_id: SessionId, ereignis: ClientEvent) -> SignalingResult<()> {
        let state = &self.state;
        match ereignis {
            ClientEvent::Connect { .. } => Err(SignalingError::protokoll("Bereits verbunden")),

            ClientEvent::JoinRoom { room_id } => {
                room_handler::on_join_room(state, session_id, room_id).await
            }

            ClientEvent::LeaveRoom { room_id } => {
                room_handler::on_leave_room(state, session_id, room_id);
                Ok(())
            }

            ClientEvent::SendMessage {
                room_id,
                content,
                message_type,
            } => {
                chat_handler::on_send_message(state, session_id, room_id, &content, message_type)
                    .await
            }

            ClientEvent::TypingStart { room_id } => {
                chat_handler::on_typing(state, session_id, room_id, true);
                Ok(())
            }

            ClientEvent::TypingStop { room_id } => {
                chat_handler::on_typing(state, session_id, room_id, false);
                Ok(())
            }

            ClientEvent::GetRoomUsers { room_id } => {
                room_handler::on_get_room_users(state, session_id, room_id)
            }
        }
    }
}
