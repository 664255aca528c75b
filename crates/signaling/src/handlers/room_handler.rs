//! Raum-Handler – Join, Leave, Benutzerliste
//!
//! ## Beitritt
//! 1. Raum pruefen (existiert, aktiv, Zugang bei privaten Raeumen)
//! 2. Registry + Index aktualisieren (ab hier gilt der Beitritt), dabei
//!    wird die Mitgliedschaft zum Speichern eingereiht
//! 3. Auf das Speichern warten
//! 4. `user_joined` an den Raum, `room_joined` und Verlauf an die Session
//!
//! Der Austritt gelingt immer. `user_left` und das Speichern passieren nur,
//! wenn die letzte Session des Benutzers den Raum verlaesst.

use std::sync::Arc;

use chrono::Utc;
use treffpunkt_core::types::{RoomId, SessionId};
use treffpunkt_protocol::{ChatMessageInfo, ServerEvent};

use crate::error::{SignalingError, SignalingResult};
use crate::server_state::SignalingState;

/// Session tritt einem Raum bei
pub async fn on_join_room(
    state: &Arc<SignalingState>,
    session_id: SessionId,
    room_id: RoomId,
) -> SignalingResult<()> {
    let verbindung = state.registry.get(session_id)?;

    let raum = state
        .speicher
        .get_room(room_id)
        .await?
        .ok_or(SignalingError::RaumNichtGefunden(room_id))?;
    if !raum.is_active {
        return Err(SignalingError::RaumNichtVerfuegbar(room_id));
    }

    if !raum.is_public
        && !state
            .speicher
            .get_membership(verbindung.user_id, room_id)
            .await?
            .is_some_and(|m| m.is_active)
    {
        tracing::debug!(
            session_id = %session_id,
            user_id = %verbindung.user_id,
            room_id = %room_id,
            "Zugriff auf privaten Raum verweigert"
        );
        return Err(SignalingError::ZugriffVerweigert(room_id));
    }

    // 0 = unbegrenzt
    let max_users = (raum.max_users > 0).then_some(raum.max_users);
    let mut beitritt = state.registry.beitreten(session_id, room_id, max_users)?;

    // Die Registry hat den Beitritt schon eingereiht; user_joined erst nach dem Schreiben
    if let Some(gespeichert) = beitritt.gespeichert.take() {
        let _ = gespeichert.await;
    }

    if beitritt.neu_fuer_benutzer {
        state.broadcaster.an_raum_senden(
            room_id,
            &ServerEvent::UserJoined {
                user_id: verbindung.user_id,
                username: verbindung.username.clone(),
                room_id,
                timestamp: Utc::now(),
            },
            None,
        );
    }

    state.broadcaster.an_session_senden(
        session_id,
        ServerEvent::RoomJoined {
            room_id,
            room_name: raum.name.clone(),
            user_count: beitritt.user_count,
            timestamp: Utc::now(),
        },
    );

    let messages: Vec<ChatMessageInfo> = match state.chat.verlauf_laden(room_id).await {
        Ok(verlauf) => verlauf.into_iter().map(ChatMessageInfo::from).collect(),
        Err(e) => {
            tracing::warn!(room_id = %room_id, fehler = %e, "Verlauf konnte nicht geladen werden");
            Vec::new()
        }
    };
    state
        .broadcaster
        .an_session_senden(session_id, ServerEvent::RecentMessages { room_id, messages });

    tracing::info!(
        session_id = %session_id,
        user_id = %verbindung.user_id,
        room_id = %room_id,
        raum = %raum.name,
        user_count = beitritt.user_count,
        "Raum betreten"
    );
    Ok(())
}

/// Session verlaesst einen Raum
///
/// Idempotent: war die Session nicht im Raum (oder ist sie unbekannt),
/// passiert nichts.
pub fn on_leave_room(state: &SignalingState, session_id: SessionId, room_id: RoomId) {
    let verbindung = match state.registry.get(session_id) {
        Ok(v) => v,
        Err(_) => return,
    };
    let austritt = match state.registry.remove_room(session_id, room_id) {
        Ok(Some(a)) => a,
        _ => return,
    };

    if austritt.benutzer_weg {
        state.broadcaster.an_raum_senden(
            room_id,
            &ServerEvent::UserLeft {
                user_id: verbindung.user_id,
                username: verbindung.username.clone(),
                room_id,
                timestamp: Utc::now(),
            },
            None,
        );
    }

    state.broadcaster.an_session_senden(
        session_id,
        ServerEvent::RoomLeft {
            room_id,
            timestamp: Utc::now(),
        },
    );

    tracing::info!(
        session_id = %session_id,
        user_id = %verbindung.user_id,
        room_id = %room_id,
        "Raum verlassen"
    );
}

/// Online-Benutzer eines Raums an die anfragende Session
pub fn on_get_room_users(
    state: &SignalingState,
    session_id: SessionId,
    room_id: RoomId,
) -> SignalingResult<()> {
    let verbindung = state.registry.get(session_id)?;
    if !verbindung.joined_rooms.contains(&room_id) {
        return Err(SignalingError::NichtImRaum(room_id));
    }

    let users = state.registry.room_users(room_id);
    verbindung
        .sender
        .senden(ServerEvent::RoomUsers { room_id, users });
    Ok(())
}
