//! RoomMembershipIndex – Wer ist gerade in welchem Raum?
//!
//! Abgeleiteter Laufzeit-Index: Raum -> anwesende Benutzer und
//! Benutzer -> Raeume. Ein Benutzer kann mit mehreren Sessions im selben
//! Raum sein; er gilt als anwesend, solange mindestens eine davon im Raum
//! ist.
//!
//! Der Index ist nicht selbst synchronisiert. Er lebt zusammen mit den
//! Verbindungen hinter dem Lock der [`ConnectionRegistry`](crate::registry::ConnectionRegistry).

use std::collections::{HashMap, HashSet};

use treffpunkt_core::types::{RoomId, SessionId, UserId};

#[derive(Debug, Default)]
pub struct RoomMembershipIndex {
    /// Raum -> Benutzer -> Sessions dieses Benutzers im Raum
    raeume: HashMap<RoomId, HashMap<UserId, HashSet<SessionId>>>,
    /// Benutzer -> Raeume, in denen er mit mindestens einer Session ist
    benutzer: HashMap<UserId, HashSet<RoomId>>,
}

impl RoomMembershipIndex {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Traegt eine Session in einen Raum ein
    ///
    /// Gibt `true` zurueck wenn der Benutzer dadurch neu im Raum ist.
    pub fn join(&mut self, room_id: RoomId, user_id: UserId, session_id: SessionId) -> bool {
        let sessions = self
            .raeume
            .entry(room_id)
            .or_default()
            .entry(user_id)
            .or_default();
        let war_leer = sessions.is_empty();
        sessions.insert(session_id);

        if war_leer {
            self.benutzer.entry(user_id).or_default().insert(room_id);
        }
        war_leer
    }

    /// Entfernt eine Session aus einem Raum
    ///
    /// Gibt `true` zurueck wenn der Benutzer danach nicht mehr im Raum ist
    /// (seine letzte Session hat ihn verlassen).
    pub fn leave(&mut self, room_id: RoomId, user_id: UserId, session_id: SessionId) -> bool {
        let Some(mitglieder) = self.raeume.get_mut(&room_id) else {
            return false;
        };
        let Some(sessions) = mitglieder.get_mut(&user_id) else {
            return false;
        };
        if !sessions.remove(&session_id) || !sessions.is_empty() {
            return false;
        }

        mitglieder.remove(&user_id);
        if mitglieder.is_empty() {
            self.raeume.remove(&room_id);
        }
        if let Some(raeume) = self.benutzer.get_mut(&user_id) {
            raeume.remove(&room_id);
            if raeume.is_empty() {
                self.benutzer.remove(&user_id);
            }
        }
        true
    }

    pub fn members_of(&self, room_id: &RoomId) -> HashSet<UserId> {
        self.raeume
            .get(room_id)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn rooms_of(&self, user_id: &UserId) -> HashSet<RoomId> {
        self.benutzer.get(user_id).cloned().unwrap_or_default()
    }

    /// Anzahl der verschiedenen Benutzer im Raum
    pub fn member_count(&self, room_id: &RoomId) -> usize {
        self.raeume.get(room_id).map_or(0, HashMap::len)
    }

    pub fn ist_mitglied(&self, room_id: &RoomId, user_id: &UserId) -> bool {
        self.raeume
            .get(room_id)
            .is_some_and(|m| m.contains_key(user_id))
    }

    /// Alle Sessions im Raum
    pub fn sessions_in(&self, room_id: &RoomId) -> impl Iterator<Item = SessionId> + '_ {
        self.raeume
            .get(room_id)
            .into_iter()
            .flat_map(|m| m.values())
            .flat_map(|s| s.iter().copied())
    }

    /// Sessions eines Benutzers in einem Raum
    pub fn sessions_von(&self, room_id: &RoomId, user_id: &UserId) -> usize {
        self.raeume
            .get(room_id)
            .and_then(|m| m.get(user_id))
            .map_or(0, HashSet::len)
    }

    /// Alle Raeume mit mindestens einem Mitglied
    pub fn raeume(&self) -> impl Iterator<Item = &RoomId> {
        self.raeume.keys()
    }
}
