//! Connect-Handler – Verbindungsaufbau und Trennung
//!
//! `on_connect` laeuft genau einmal pro Verbindung, bevor irgendein anderes
//! Ereignis verarbeitet wird. `on_disconnect` ist der einzige Weg, auf dem
//! eine Verbindung die Registry verlaesst (Transport-Ende oder Reaper).

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use treffpunkt_core::types::{SessionId, UserIdentity};
use treffpunkt_protocol::{RoomInfo, ServerEvent};

use crate::broadcast::ClientSender;
use crate::error::SignalingResult;
use crate::server_state::SignalingState;

/// Authentifiziert und registriert eine neue Verbindung
///
/// Bei Erfolg erhaelt die Session `connected` und `available_rooms`.
/// Bei einem Fehler entsteht kein Registry-Eintrag.
pub async fn on_connect(
    state: &Arc<SignalingState>,
    session_id: SessionId,
    token: &str,
    remote_address: Option<SocketAddr>,
    sender: ClientSender,
) -> SignalingResult<UserIdentity> {
    let identitaet = match state.authenticator.authenticate(token).await {
        Ok(id) => id,
        Err(e) => {
            tracing::info!(
                session_id = %session_id,
                peer = ?remote_address,
                fehler = %e,
                "Authentifizierung abgelehnt"
            );
            return Err(e.into());
        }
    };

    let verbindung = state
        .registry
        .register(session_id, identitaet.clone(), remote_address, sender)?;

    tracing::info!(
        session_id = %session_id,
        user_id = %identitaet.user_id,
        username = %identitaet.username,
        "Client verbunden"
    );

    verbindung.sender.senden(ServerEvent::Connected {
        user_id: identitaet.user_id,
        username: identitaet.username.clone(),
        session_id,
        timestamp: verbindung.connected_at,
    });

    let rooms = match state.speicher.list_rooms_for_user(identitaet.user_id).await {
        Ok(raeume) => raeume
            .into_iter()
            .map(|r| RoomInfo {
                user_count: state.registry.member_count(r.id),
                id: r.id,
                name: r.name,
                description: r.description,
                is_public: r.is_public,
            })
            .collect(),
        Err(e) => {
            tracing::warn!(
                user_id = %identitaet.user_id,
                fehler = %e,
                "Raumliste konnte nicht geladen werden"
            );
            Vec::new()
        }
    };
    verbindung.sender.senden(ServerEvent::AvailableRooms { rooms });

    Ok(identitaet)
}

/// Entfernt eine Verbindung und verlaesst alle ihre Raeume
///
/// Gibt `false` zurueck wenn die Session schon entfernt war.
pub fn on_disconnect(state: &SignalingState, session_id: SessionId) -> bool {
    let trennung = match state.registry.remove(session_id) {
        Ok(t) => t,
        Err(_) => {
            tracing::trace!(session_id = %session_id, "Trennung: Session bereits entfernt");
            return false;
        }
    };
    let verbindung = trennung.verbindung;

    for austritt in trennung.austritte.into_iter().filter(|a| a.benutzer_weg) {
        state.broadcaster.an_raum_senden(
            austritt.room_id,
            &ServerEvent::UserLeft {
                user_id: verbindung.user_id,
                username: verbindung.username.clone(),
                room_id: austritt.room_id,
                timestamp: Utc::now(),
            },
            None,
        );
    }

    tracing::info!(
        session_id = %session_id,
        user_id = %verbindung.user_id,
        raeume = verbindung.joined_rooms.len(),
        "Client getrennt"
    );
    true
}
