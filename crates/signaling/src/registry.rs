//! ConnectionRegistry – Alle live Verbindungen und ihre Raeume
//!
//! Verbindungen und [`RoomMembershipIndex`] stehen hinter demselben Lock,
//! damit sie nie auseinanderlaufen. Unter dem Lock passiert nur O(1)
//! Map-Arbeit; Zustellung laeuft danach auf Snapshots.
//!
//! Mit einem [`MembershipPersister`] werden Beitritte und Austritte noch
//! unter dem Lock eingereiht. Die Persister-Queue sieht die Uebergaenge so
//! in derselben Reihenfolge wie die Registry, auch wenn mehrere Sessions
//! desselben Benutzers gleichzeitig beitreten und gehen.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use treffpunkt_core::types::{RoomId, SessionId, UserId, UserIdentity};
use treffpunkt_protocol::RoomUserInfo;

use crate::broadcast::ClientSender;
use crate::error::{SignalingError, SignalingResult};
use crate::index::RoomMembershipIndex;
use crate::persister::MembershipPersister;

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// Eine authentifizierte, live Verbindung
#[derive(Debug, Clone)]
pub struct Connection {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub username: String,
    pub connected_at: DateTime<Utc>,
    pub joined_rooms: HashSet<RoomId>,
    pub remote_address: Option<SocketAddr>,
    pub sender: ClientSender,
}

impl Connection {
    pub fn identitaet(&self) -> UserIdentity {
        UserIdentity {
            user_id: self.user_id,
            username: self.username.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Ergebnistypen
// ---------------------------------------------------------------------------

/// Ergebnis eines Raum-Beitritts
#[derive(Debug)]
pub struct Beitritt {
    /// Die Session war vorher nicht im Raum
    pub neu_fuer_session: bool,
    /// Der Benutzer war vorher mit keiner Session im Raum
    pub neu_fuer_benutzer: bool,
    /// Verschiedene Benutzer im Raum nach dem Beitritt
    pub user_count: usize,
    /// Meldet, wenn der eingereihte Beitritt gespeichert ist
    pub gespeichert: Option<oneshot::Receiver<()>>,
}

/// Eine Session hat einen Raum verlassen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaumAustritt {
    pub room_id: RoomId,
    /// Der Benutzer ist mit keiner Session mehr im Raum
    pub benutzer_weg: bool,
}

/// Ergebnis von [`ConnectionRegistry::remove`]
#[derive(Debug, Clone)]
pub struct Trennung {
    pub verbindung: Connection,
    pub austritte: Vec<RaumAustritt>,
}

/// Aggregat pro Benutzer fuer Admin-Abfragen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AktiverBenutzer {
    pub user_id: UserId,
    pub username: String,
    /// Frueheste Verbindung
    pub connected_at: DateTime<Utc>,
    /// Raeume ueber alle Verbindungen
    pub rooms: usize,
    pub connections: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RaumBelegung {
    pub users: usize,
    pub connections: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RaumStatistik {
    pub total_rooms: usize,
    pub active_connections: usize,
    pub rooms: HashMap<RoomId, RaumBelegung>,
}

// ---------------------------------------------------------------------------
// ConnectionRegistry
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Zustand {
    verbindungen: HashMap<SessionId, Connection>,
    index: RoomMembershipIndex,
}

/// Thread-safe via Arc + Mutex. Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<Mutex<Zustand>>,
    persister: Option<MembershipPersister>,
}

impl ConnectionRegistry {
    /// Registry ohne Persistenz
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registry, die Raum-Uebergaenge an den Persister weitergibt
    ///
    /// Ein Beitritt wird fuer jede neue (Session, Raum)-Kombination
    /// eingereiht, ein Austritt nur, wenn die letzte Session des Benutzers
    /// den Raum verlaesst.
    pub fn mit_persister(persister: MembershipPersister) -> Self {
        Self {
            inner: Arc::default(),
            persister: Some(persister),
        }
    }

    fn austritt_einreihen(&self, user_id: UserId, room_id: RoomId) {
        if let Some(persister) = &self.persister {
            persister.record_leave(user_id, room_id);
        }
    }

    /// Legt eine neue Verbindung an
    pub fn register(
        &self,
        session_id: SessionId,
        identitaet: UserIdentity,
        remote_address: Option<SocketAddr>,
        sender: ClientSender,
    ) -> SignalingResult<Connection> {
        let mut zustand = self.inner.lock();
        if zustand.verbindungen.contains_key(&session_id) {
            return Err(SignalingError::SessionDoppelt(session_id));
        }

        let verbindung = Connection {
            session_id,
            user_id: identitaet.user_id,
            username: identitaet.username,
            connected_at: Utc::now(),
            joined_rooms: HashSet::new(),
            remote_address,
            sender,
        };
        zustand.verbindungen.insert(session_id, verbindung.clone());
        Ok(verbindung)
    }

    pub fn get(&self, session_id: SessionId) -> SignalingResult<Connection> {
        self.inner
            .lock()
            .verbindungen
            .get(&session_id)
            .cloned()
            .ok_or(SignalingError::SessionNichtGefunden(session_id))
    }

    /// Fuegt eine Session einem Raum hinzu, ohne Kapazitaetspruefung
    ///
    /// Gibt `true` zurueck wenn sich etwas geaendert hat.
    pub fn add_room(&self, session_id: SessionId, room_id: RoomId) -> SignalingResult<bool> {
        self.beitreten(session_id, room_id, None)
            .map(|b| b.neu_fuer_session)
    }

    /// Fuegt eine Session einem Raum hinzu
    ///
    /// Mit `max_users` wird der Beitritt abgelehnt, wenn der Raum schon so
    /// viele verschiedene Benutzer hat und der Benutzer nicht darunter ist.
    pub fn beitreten(
        &self,
        session_id: SessionId,
        room_id: RoomId,
        max_users: Option<u32>,
    ) -> SignalingResult<Beitritt> {
        let mut guard = self.inner.lock();
        let zustand = &mut *guard;

        let verbindung = zustand
            .verbindungen
            .get_mut(&session_id)
            .ok_or(SignalingError::SessionNichtGefunden(session_id))?;
        let user_id = verbindung.user_id;

        if verbindung.joined_rooms.contains(&room_id) {
            return Ok(Beitritt {
                neu_fuer_session: false,
                neu_fuer_benutzer: false,
                user_count: zustand.index.member_count(&room_id),
                gespeichert: None,
            });
        }

        if let Some(max) = max_users {
            let belegt = zustand.index.member_count(&room_id);
            if belegt >= max as usize && !zustand.index.ist_mitglied(&room_id, &user_id) {
                return Err(SignalingError::RaumVoll { room_id, max });
            }
        }

        verbindung.joined_rooms.insert(room_id);
        let neu_fuer_benutzer = zustand.index.join(room_id, user_id, session_id);
        let gespeichert = self
            .persister
            .as_ref()
            .map(|p| p.beitritt_einreihen(user_id, room_id));

        Ok(Beitritt {
            neu_fuer_session: true,
            neu_fuer_benutzer,
            user_count: zustand.index.member_count(&room_id),
            gespeichert,
        })
    }

    /// Entfernt eine Session aus einem Raum
    ///
    /// `None` wenn die Session nicht im Raum war.
    pub fn remove_room(
        &self,
        session_id: SessionId,
        room_id: RoomId,
    ) -> SignalingResult<Option<RaumAustritt>> {
        let mut guard = self.inner.lock();
        let zustand = &mut *guard;

        let verbindung = zustand
            .verbindungen
            .get_mut(&session_id)
            .ok_or(SignalingError::SessionNichtGefunden(session_id))?;
        if !verbindung.joined_rooms.remove(&room_id) {
            return Ok(None);
        }
        let user_id = verbindung.user_id;
        let benutzer_weg = zustand.index.leave(room_id, user_id, session_id);
        if benutzer_weg {
            self.austritt_einreihen(user_id, room_id);
        }

        Ok(Some(RaumAustritt {
            room_id,
            benutzer_weg,
        }))
    }

    /// Entfernt eine Verbindung samt ihrer Raum-Eintraege
    pub fn remove(&self, session_id: SessionId) -> SignalingResult<Trennung> {
        let mut zustand = self.inner.lock();
        let verbindung = zustand
            .verbindungen
            .remove(&session_id)
            .ok_or(SignalingError::SessionNichtGefunden(session_id))?;

        let austritte = verbindung
            .joined_rooms
            .iter()
            .map(|&room_id| {
                let benutzer_weg = zustand.index.leave(room_id, verbindung.user_id, session_id);
                if benutzer_weg {
                    self.austritt_einreihen(verbindung.user_id, room_id);
                }
                RaumAustritt {
                    room_id,
                    benutzer_weg,
                }
            })
            .collect();

        Ok(Trennung {
            verbindung,
            austritte,
        })
    }

    pub fn list_by_user(&self, user_id: UserId) -> Vec<Connection> {
        self.inner
            .lock()
            .verbindungen
            .values()
            .filter(|v| v.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Send-Queues aller Verbindungen eines Benutzers
    pub fn senders_by_user(&self, user_id: UserId) -> Vec<ClientSender> {
        self.inner
            .lock()
            .verbindungen
            .values()
            .filter(|v| v.user_id == user_id)
            .map(|v| v.sender.clone())
            .collect()
    }

    /// Snapshot der Send-Queues aller Sessions im Raum
    pub fn connections_in_room(&self, room_id: RoomId) -> Vec<ClientSender> {
        let zustand = self.inner.lock();
        zustand
            .index
            .sessions_in(&room_id)
            .filter_map(|s| zustand.verbindungen.get(&s))
            .map(|v| v.sender.clone())
            .collect()
    }

    pub fn sender(&self, session_id: SessionId) -> Option<ClientSender> {
        self.inner
            .lock()
            .verbindungen
            .get(&session_id)
            .map(|v| v.sender.clone())
    }

    pub fn members_of(&self, room_id: RoomId) -> HashSet<UserId> {
        self.inner.lock().index.members_of(&room_id)
    }

    pub fn rooms_of(&self, user_id: UserId) -> HashSet<RoomId> {
        self.inner.lock().index.rooms_of(&user_id)
    }

    pub fn member_count(&self, room_id: RoomId) -> usize {
        self.inner.lock().index.member_count(&room_id)
    }

    /// Online-Benutzer eines Raums mit Anzahl ihrer Verbindungen im Raum
    pub fn room_users(&self, room_id: RoomId) -> Vec<RoomUserInfo> {
        let zustand = self.inner.lock();
        let mut benutzer: HashMap<UserId, RoomUserInfo> = HashMap::new();
        for session in zustand.index.sessions_in(&room_id) {
            let Some(v) = zustand.verbindungen.get(&session) else {
                continue;
            };
            benutzer.entry(v.user_id).or_insert_with(|| RoomUserInfo {
                user_id: v.user_id,
                username: v.username.clone(),
                connections: zustand.index.sessions_von(&room_id, &v.user_id),
            });
        }
        let mut liste: Vec<_> = benutzer.into_values().collect();
        liste.sort_by(|a, b| a.username.cmp(&b.username));
        liste
    }

    /// Sessions, die laenger als `ttl` verbunden sind
    pub fn stale(&self, now: DateTime<Utc>, ttl: Duration) -> Vec<SessionId> {
        self.inner
            .lock()
            .verbindungen
            .values()
            .filter(|v| now - v.connected_at > ttl)
            .map(|v| v.session_id)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.inner.lock().verbindungen.len()
    }

    pub fn active_users(&self) -> Vec<AktiverBenutzer> {
        let zustand = self.inner.lock();
        let mut benutzer: HashMap<UserId, (AktiverBenutzer, HashSet<RoomId>)> = HashMap::new();

        for v in zustand.verbindungen.values() {
            let (eintrag, raeume) = benutzer.entry(v.user_id).or_insert_with(|| {
                (
                    AktiverBenutzer {
                        user_id: v.user_id,
                        username: v.username.clone(),
                        connected_at: v.connected_at,
                        rooms: 0,
                        connections: 0,
                    },
                    HashSet::new(),
                )
            });
            eintrag.connections += 1;
            eintrag.connected_at = eintrag.connected_at.min(v.connected_at);
            raeume.extend(v.joined_rooms.iter().copied());
        }

        benutzer
            .into_values()
            .map(|(mut eintrag, raeume)| {
                eintrag.rooms = raeume.len();
                eintrag
            })
            .collect()
    }

    pub fn room_stats(&self) -> RaumStatistik {
        let zustand = self.inner.lock();
        let rooms: HashMap<RoomId, RaumBelegung> = zustand
            .index
            .raeume()
            .map(|r| {
                (
                    *r,
                    RaumBelegung {
                        users: zustand.index.member_count(r),
                        connections: zustand.index.sessions_in(r).count(),
                    },
                )
            })
            .collect();

        RaumStatistik {
            total_rooms: rooms.len(),
            active_connections: zustand.verbindungen.len(),
            rooms,
        }
    }
}
