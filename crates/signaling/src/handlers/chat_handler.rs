//! Chat-Handler – Nachrichten senden, Tipp-Anzeige
//!
//! Routet Nachrichten ueber den MessageBroadcaster, der prueft, speichert
//! und an alle Sessions im Raum verteilt.

use treffpunkt_core::types::{MessageType, RoomId, SessionId};

use crate::error::SignalingResult;
use crate::server_state::SignalingState;

/// Verarbeitet eine Chat-Nachricht
pub async fn on_send_message(
    state: &SignalingState,
    session_id: SessionId,
    room_id: RoomId,
    content: &str,
    message_type: MessageType,
) -> SignalingResult<()> {
    let zustellung = state
        .broadcaster
        .send(session_id, room_id, content, message_type)
        .await?;

    tracing::debug!(
        session_id = %session_id,
        room_id = %room_id,
        message_id = %zustellung.nachricht.id,
        empfaenger = zustellung.empfaenger,
        "Chat-Nachricht gesendet"
    );
    Ok(())
}

/// Tipp-Beginn oder -Ende an die anderen Sessions im Raum
pub fn on_typing(state: &SignalingState, session_id: SessionId, room_id: RoomId, tippt: bool) {
    let empfaenger = state.broadcaster.typing(session_id, room_id, tippt);
    tracing::trace!(
        session_id = %session_id,
        room_id = %room_id,
        tippt,
        empfaenger,
        "Tipp-Anzeige"
    );
}
