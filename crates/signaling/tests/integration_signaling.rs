//! Integration-Tests fuer den Signaling-Kern (In-Memory SQLite)

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_util::codec::Framed;
use treffpunkt_core::types::{AccountStatus, MessageType, RoomId, SessionId, UserId, UserIdentity};
use treffpunkt_db::{
    models::{MitgliedschaftRecord, NeuerRaum},
    DbResult, MembershipRepository, MessageRepository, SeedRepository, SqliteDb,
};
use treffpunkt_protocol::{ClientCodec, ClientEvent, ServerEvent};
use treffpunkt_signaling::handlers::connect_handler;
use treffpunkt_signaling::{
    ClientSender, FehlerArt, MessageDispatcher, SignalingConfig, SignalingServer, SignalingState,
    StaleConnectionReaper,
};

// ---------------------------------------------------------------------------
// Hilfsfunktionen
// ---------------------------------------------------------------------------

/// Zaehlt beendete Mitgliedschaften, schreibt sonst in die echte DB
struct ZaehlendeMitgliedschaften {
    db: Arc<SqliteDb>,
    austritte: AtomicUsize,
}

#[async_trait]
impl MembershipRepository for ZaehlendeMitgliedschaften {
    async fn get_membership(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> DbResult<Option<MitgliedschaftRecord>> {
        self.db.get_membership(user_id, room_id).await
    }

    async fn upsert_membership(
        &self,
        user_id: UserId,
        room_id: RoomId,
        is_active: bool,
        left_at: Option<DateTime<Utc>>,
    ) -> DbResult<()> {
        if !is_active {
            self.austritte.fetch_add(1, Ordering::SeqCst);
        }
        self.db
            .upsert_membership(user_id, room_id, is_active, left_at)
            .await
    }
}

struct Umgebung {
    db: Arc<SqliteDb>,
    state: Arc<SignalingState>,
    dispatcher: MessageDispatcher,
}

struct TestClient {
    session: SessionId,
    user: UserIdentity,
    rx: mpsc::Receiver<ServerEvent>,
}

impl TestClient {
    /// Alle bisher zugestellten Ereignisse
    fn ereignisse(&mut self) -> Vec<ServerEvent> {
        let mut liste = Vec::new();
        while let Ok(e) = self.rx.try_recv() {
            liste.push(e);
        }
        liste
    }
}

async fn umgebung() -> Umgebung {
    let db = Arc::new(SqliteDb::in_memory().await.unwrap());
    let state = SignalingState::neu(SignalingConfig::default(), db.clone());
    Umgebung {
        dispatcher: MessageDispatcher::neu(state.clone()),
        db,
        state,
    }
}

async fn umgebung_mit_zaehler() -> (Umgebung, Arc<ZaehlendeMitgliedschaften>) {
    let db = Arc::new(SqliteDb::in_memory().await.unwrap());
    let zaehler = Arc::new(ZaehlendeMitgliedschaften {
        db: db.clone(),
        austritte: AtomicUsize::new(0),
    });
    let state =
        SignalingState::mit_mitgliedschaften(SignalingConfig::default(), db.clone(), zaehler.clone());
    let umgebung = Umgebung {
        dispatcher: MessageDispatcher::neu(state.clone()),
        db,
        state,
    };
    (umgebung, zaehler)
}

impl Umgebung {
    /// Legt einen Benutzer an und gibt ein gueltiges Token zurueck
    async fn token(&self, name: &str) -> String {
        let benutzer = self.db.create_user(name, AccountStatus::Active).await.unwrap();
        self.db
            .create_session(benutzer.id, Duration::hours(1))
            .await
            .unwrap()
            .token
    }

    async fn raum(&self, name: &str, is_public: bool) -> RoomId {
        self.db
            .create_room(NeuerRaum {
                name,
                is_public,
                ..Default::default()
            })
            .await
            .unwrap()
            .id
    }

    /// Verbindet eine neue Session und verwirft `connected`/`available_rooms`
    async fn verbinden(&self, token: &str) -> TestClient {
        let session = SessionId::new();
        let (sender, rx) = ClientSender::neu(session, 64);
        let user = connect_handler::on_connect(&self.state, session, token, None, sender)
            .await
            .unwrap();
        let mut client = TestClient { session, user, rx };
        assert_eq!(client.ereignisse().len(), 2);
        client
    }

    async fn beitreten(&self, client: &TestClient, room_id: RoomId) {
        self.dispatcher
            .dispatch(client.session, ClientEvent::JoinRoom { room_id })
            .await
            .unwrap();
    }

    async fn senden(&self, client: &TestClient, room_id: RoomId, content: &str) -> FehlerArt {
        self.dispatcher
            .dispatch(
                client.session,
                ClientEvent::SendMessage {
                    room_id,
                    content: content.into(),
                    message_type: MessageType::Text,
                },
            )
            .await
            .unwrap_err()
            .art()
    }
}

fn fehlermeldung(ereignisse: &[ServerEvent]) -> Option<&str> {
    ereignisse.iter().find_map(|e| match e {
        ServerEvent::Error { message } => Some(message.as_str()),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Verbinden
// ---------------------------------------------------------------------------

#[tokio::test]
async fn verbinden_liefert_connected_und_raumliste() {
    let u = umgebung().await;
    let token = u.token("anna").await;
    let lobby = u.raum("general", true).await;
    u.raum("geheim", false).await;

    let session = SessionId::new();
    let (sender, mut rx) = ClientSender::neu(session, 8);
    let anna = connect_handler::on_connect(&u.state, session, &token, None, sender)
        .await
        .unwrap();
    assert_eq!(anna.username, "anna");

    match rx.try_recv().unwrap() {
        ServerEvent::Connected {
            user_id,
            session_id,
            ..
        } => {
            assert_eq!(user_id, anna.user_id);
            assert_eq!(session_id, session);
        }
        anderes => panic!("Erwartet connected, erhalten {anderes:?}"),
    }
    match rx.try_recv().unwrap() {
        ServerEvent::AvailableRooms { rooms } => {
            assert_eq!(rooms.len(), 1);
            assert_eq!(rooms[0].id, lobby);
        }
        anderes => panic!("Erwartet available_rooms, erhalten {anderes:?}"),
    }
    assert_eq!(u.state.registry.count(), 1);
}

#[tokio::test]
async fn ungueltiges_token_wird_abgelehnt() {
    let u = umgebung().await;
    let (sender, _rx) = ClientSender::neu(SessionId::new(), 8);
    let err = connect_handler::on_connect(&u.state, SessionId::new(), "falsch", None, sender)
        .await
        .unwrap_err();
    assert_eq!(err.art(), FehlerArt::Unauthenticated);
    assert_eq!(u.state.registry.count(), 0);
}

#[tokio::test]
async fn gesperrtes_konto_ist_verboten() {
    let u = umgebung().await;
    let benutzer = u.db.create_user("mallory", AccountStatus::Suspended).await.unwrap();
    let token = u
        .db
        .create_session(benutzer.id, Duration::hours(1))
        .await
        .unwrap()
        .token;

    let (sender, _rx) = ClientSender::neu(SessionId::new(), 8);
    let err = connect_handler::on_connect(&u.state, SessionId::new(), &token, None, sender)
        .await
        .unwrap_err();
    assert_eq!(err.art(), FehlerArt::Forbidden);
    assert_eq!(u.state.registry.count(), 0);
}

#[tokio::test]
async fn zweites_connect_ist_protokollfehler() {
    let u = umgebung().await;
    let token = u.token("anna").await;
    let mut anna = u.verbinden(&token).await;

    let err = u
        .dispatcher
        .dispatch(anna.session, ClientEvent::Connect { token })
        .await
        .unwrap_err();
    assert_eq!(err.art(), FehlerArt::Protocol);
    assert!(fehlermeldung(&anna.ereignisse()).is_some());
    assert_eq!(u.state.registry.count(), 1);
}

// ---------------------------------------------------------------------------
// Szenarien
// ---------------------------------------------------------------------------

#[tokio::test]
async fn szenario_beitritt_oeffentlicher_raum() {
    let u = umgebung().await;
    let token = u.token("u1").await;
    let general = u.raum("general", true).await;
    let mut s1 = u.verbinden(&token).await;

    u.beitreten(&s1, general).await;

    let ereignisse = s1.ereignisse();
    assert!(matches!(
        &ereignisse[0],
        ServerEvent::UserJoined { user_id, room_id, .. }
            if *user_id == s1.user.user_id && *room_id == general
    ));
    assert!(matches!(
        &ereignisse[1],
        ServerEvent::RoomJoined { room_id, room_name, user_count: 1, .. }
            if *room_id == general && room_name == "general"
    ));
    assert!(matches!(
        &ereignisse[2],
        ServerEvent::RecentMessages { messages, .. } if messages.is_empty()
    ));
    assert_eq!(ereignisse.len(), 3);

    let m = u
        .db
        .get_membership(s1.user.user_id, general)
        .await
        .unwrap()
        .unwrap();
    assert!(m.is_active);
}

#[tokio::test]
async fn szenario_nachricht_an_alle_im_raum() {
    let u = umgebung().await;
    let general = u.raum("general", true).await;
    let mut s1 = u.verbinden(&u.token("u1").await).await;
    let mut s2 = u.verbinden(&u.token("u2").await).await;
    let mut draussen = u.verbinden(&u.token("u3").await).await;
    u.beitreten(&s1, general).await;
    u.beitreten(&s2, general).await;
    s1.ereignisse();
    s2.ereignisse();

    u.dispatcher
        .dispatch(
            s1.session,
            ClientEvent::SendMessage {
                room_id: general,
                content: "hi".into(),
                message_type: MessageType::Text,
            },
        )
        .await
        .unwrap();

    let u1 = s1.user.user_id;
    for client in [&mut s1, &mut s2] {
        let ereignisse = client.ereignisse();
        assert_eq!(ereignisse.len(), 1);
        match &ereignisse[0] {
            ServerEvent::NewMessage(info) => {
                assert_eq!(info.content, "hi");
                assert_eq!(info.user_id, u1);
                assert_eq!(info.username, "u1");
            }
            anderes => panic!("Erwartet new_message, erhalten {anderes:?}"),
        }
    }
    assert!(draussen.ereignisse().is_empty());

    let gespeichert = u.db.recent_messages(general, 10).await.unwrap();
    assert_eq!(gespeichert.len(), 1);
    assert_eq!(gespeichert[0].content, "hi");
}

#[tokio::test]
async fn szenario_privater_raum_ohne_mitgliedschaft() {
    let u = umgebung().await;
    let geheim = u.raum("geheim", false).await;
    let mut s1 = u.verbinden(&u.token("u1").await).await;

    let err = u
        .dispatcher
        .dispatch(s1.session, ClientEvent::JoinRoom { room_id: geheim })
        .await
        .unwrap_err();
    assert_eq!(err.art(), FehlerArt::Forbidden);

    let meldung = fehlermeldung(&s1.ereignisse()).map(str::to_owned);
    assert!(meldung.unwrap().contains("Access denied"));
    assert!(u.state.registry.members_of(geheim).is_empty());
    assert!(u.state.registry.get(s1.session).unwrap().joined_rooms.is_empty());
}

#[tokio::test]
async fn privater_raum_mit_mitgliedschaft() {
    let u = umgebung().await;
    let geheim = u.raum("geheim", false).await;
    let s1 = u.verbinden(&u.token("u1").await).await;
    u.db.grant_membership(s1.user.user_id, geheim, true).await.unwrap();

    u.beitreten(&s1, geheim).await;
    assert_eq!(u.state.registry.members_of(geheim), HashSet::from([s1.user.user_id]));
}

#[tokio::test]
async fn szenario_leere_nachricht() {
    let u = umgebung().await;
    let general = u.raum("general", true).await;
    let mut s1 = u.verbinden(&u.token("u1").await).await;
    let mut s2 = u.verbinden(&u.token("u2").await).await;
    u.beitreten(&s1, general).await;
    u.beitreten(&s2, general).await;
    s1.ereignisse();
    s2.ereignisse();

    assert_eq!(u.senden(&s1, general, "   \n\t ").await, FehlerArt::EmptyMessage);

    let ereignisse = s1.ereignisse();
    assert_eq!(ereignisse.len(), 1);
    assert!(fehlermeldung(&ereignisse).is_some());
    assert!(s2.ereignisse().is_empty());
    assert!(u.db.recent_messages(general, 10).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Sendepruefungen
// ---------------------------------------------------------------------------

#[tokio::test]
async fn senden_ohne_beitritt() {
    let u = umgebung().await;
    let general = u.raum("general", true).await;
    let s1 = u.verbinden(&u.token("u1").await).await;

    assert_eq!(u.senden(&s1, general, "hallo").await, FehlerArt::NotInRoom);
}

#[tokio::test]
async fn senden_in_deaktivierten_raum() {
    let u = umgebung().await;
    let general = u.raum("general", true).await;
    let s1 = u.verbinden(&u.token("u1").await).await;
    u.beitreten(&s1, general).await;

    u.db.set_room_active(general, false).await.unwrap();
    assert_eq!(u.senden(&s1, general, "hallo").await, FehlerArt::RoomUnavailable);

    // Neuer Beitritt wird ebenfalls abgelehnt
    let s2 = u.verbinden(&u.token("u2").await).await;
    let err = u
        .dispatcher
        .dispatch(s2.session, ClientEvent::JoinRoom { room_id: general })
        .await
        .unwrap_err();
    assert_eq!(err.art(), FehlerArt::RoomUnavailable);
}

#[tokio::test]
async fn senden_ohne_schreibrecht() {
    let u = umgebung().await;
    let general = u.raum("general", true).await;
    let s1 = u.verbinden(&u.token("u1").await).await;
    u.db.grant_membership(s1.user.user_id, general, false).await.unwrap();
    u.beitreten(&s1, general).await;

    assert_eq!(u.senden(&s1, general, "hallo").await, FehlerArt::PermissionDenied);
    assert!(u.db.recent_messages(general, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn zu_lange_nachricht() {
    let u = umgebung().await;
    let general = u.raum("general", true).await;
    let s1 = u.verbinden(&u.token("u1").await).await;
    u.beitreten(&s1, general).await;

    let lang = "x".repeat(4097);
    assert_eq!(u.senden(&s1, general, &lang).await, FehlerArt::MessageTooLong);
}

#[tokio::test]
async fn unbekannter_raum() {
    let u = umgebung().await;
    let s1 = u.verbinden(&u.token("u1").await).await;
    let err = u
        .dispatcher
        .dispatch(s1.session, ClientEvent::JoinRoom { room_id: RoomId::new() })
        .await
        .unwrap_err();
    assert_eq!(err.art(), FehlerArt::NotFound);
}

#[tokio::test]
async fn verlauf_beim_beitritt() {
    let u = umgebung().await;
    let general = u.raum("general", true).await;
    let s1 = u.verbinden(&u.token("u1").await).await;
    u.beitreten(&s1, general).await;
    for text in ["eins", "zwei", "drei"] {
        u.dispatcher
            .dispatch(
                s1.session,
                ClientEvent::SendMessage {
                    room_id: general,
                    content: text.into(),
                    message_type: MessageType::Text,
                },
            )
            .await
            .unwrap();
    }

    let mut s2 = u.verbinden(&u.token("u2").await).await;
    u.beitreten(&s2, general).await;
    let verlauf = s2
        .ereignisse()
        .into_iter()
        .find_map(|e| match e {
            ServerEvent::RecentMessages { messages, .. } => Some(messages),
            _ => None,
        })
        .unwrap();
    let inhalte: Vec<_> = verlauf.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(inhalte, vec!["eins", "zwei", "drei"]);
}

// ---------------------------------------------------------------------------
// Idempotenz, mehrere Geraete, Trennung
// ---------------------------------------------------------------------------

#[tokio::test]
async fn beitritt_und_austritt_idempotent() {
    let u = umgebung().await;
    let general = u.raum("general", true).await;
    let mut s1 = u.verbinden(&u.token("u1").await).await;

    u.beitreten(&s1, general).await;
    s1.ereignisse();

    // Zweiter Beitritt: erneut room_joined, aber kein user_joined
    u.beitreten(&s1, general).await;
    let ereignisse = s1.ereignisse();
    assert!(ereignisse
        .iter()
        .any(|e| matches!(e, ServerEvent::RoomJoined { user_count: 1, .. })));
    assert!(!ereignisse
        .iter()
        .any(|e| matches!(e, ServerEvent::UserJoined { .. })));
    assert_eq!(u.state.registry.member_count(general), 1);

    u.dispatcher
        .dispatch(s1.session, ClientEvent::LeaveRoom { room_id: general })
        .await
        .unwrap();
    let ereignisse = s1.ereignisse();
    assert!(matches!(ereignisse.as_slice(), [ServerEvent::RoomLeft { .. }]));
    assert!(u.state.registry.members_of(general).is_empty());

    u.dispatcher
        .dispatch(s1.session, ClientEvent::LeaveRoom { room_id: general })
        .await
        .unwrap();
    assert!(s1.ereignisse().is_empty());

    u.state.persister.flush().await;
    let m = u
        .db
        .get_membership(s1.user.user_id, general)
        .await
        .unwrap()
        .unwrap();
    assert!(!m.is_active);
    assert!(m.left_at.is_some());
}

#[tokio::test]
async fn mehrere_geraete_eines_benutzers() {
    let (u, zaehler) = umgebung_mit_zaehler().await;
    let general = u.raum("general", true).await;
    let token = u.token("u1").await;
    let mut handy = u.verbinden(&token).await;
    let mut laptop = u.verbinden(&token).await;
    let mut bob = u.verbinden(&u.token("bob").await).await;

    u.beitreten(&bob, general).await;
    u.beitreten(&handy, general).await;
    u.beitreten(&laptop, general).await;

    // user_joined nur einmal fuer u1
    let beigetreten = bob
        .ereignisse()
        .iter()
        .filter(|e| matches!(e, ServerEvent::UserJoined { user_id, .. } if *user_id == handy.user.user_id))
        .count();
    assert_eq!(beigetreten, 1);
    assert_eq!(u.state.registry.member_count(general), 2);
    handy.ereignisse();
    laptop.ereignisse();

    // Handy verlaesst den Raum, der Laptop bleibt
    u.dispatcher
        .dispatch(handy.session, ClientEvent::LeaveRoom { room_id: general })
        .await
        .unwrap();
    assert!(bob.ereignisse().is_empty());
    assert!(u.state.registry.members_of(general).contains(&handy.user.user_id));

    // Nachrichten erreichen weiterhin den Laptop
    u.dispatcher
        .dispatch(
            bob.session,
            ClientEvent::SendMessage {
                room_id: general,
                content: "noch da?".into(),
                message_type: MessageType::Text,
            },
        )
        .await
        .unwrap();
    assert!(laptop
        .ereignisse()
        .iter()
        .any(|e| matches!(e, ServerEvent::NewMessage(_))));
    assert!(!handy
        .ereignisse()
        .iter()
        .any(|e| matches!(e, ServerEvent::NewMessage(_))));

    u.state.persister.flush().await;
    assert_eq!(zaehler.austritte.load(Ordering::SeqCst), 0);
    assert!(u
        .db
        .get_membership(handy.user.user_id, general)
        .await
        .unwrap()
        .unwrap()
        .is_active);

    // Letztes Geraet trennt: jetzt user_left und genau ein Austritt
    assert!(connect_handler::on_disconnect(&u.state, laptop.session));
    assert!(bob
        .ereignisse()
        .iter()
        .any(|e| matches!(e, ServerEvent::UserLeft { user_id, .. } if *user_id == handy.user.user_id)));
    u.state.persister.flush().await;
    assert_eq!(zaehler.austritte.load(Ordering::SeqCst), 1);
    assert!(u.state.registry.list_by_user(handy.user.user_id).len() == 1);
}

#[tokio::test]
async fn trennung_beendet_jede_mitgliedschaft_genau_einmal() {
    let (u, zaehler) = umgebung_mit_zaehler().await;
    let r1 = u.raum("eins", true).await;
    let r2 = u.raum("zwei", true).await;
    let s1 = u.verbinden(&u.token("u1").await).await;
    let mut s2 = u.verbinden(&u.token("u2").await).await;

    u.beitreten(&s1, r1).await;
    u.beitreten(&s1, r2).await;
    u.beitreten(&s2, r1).await;
    s2.ereignisse();

    assert!(connect_handler::on_disconnect(&u.state, s1.session));
    assert!(!connect_handler::on_disconnect(&u.state, s1.session));
    u.state.persister.flush().await;

    assert_eq!(zaehler.austritte.load(Ordering::SeqCst), 2);
    for raum in [r1, r2] {
        let m = u.db.get_membership(s1.user.user_id, raum).await.unwrap().unwrap();
        assert!(!m.is_active);
        assert!(!u.state.registry.members_of(raum).contains(&s1.user.user_id));
    }

    let ereignisse = s2.ereignisse();
    assert_eq!(ereignisse.len(), 1);
    assert!(matches!(&ereignisse[0], ServerEvent::UserLeft { room_id, .. } if *room_id == r1));
    assert!(u.state.registry.get(s1.session).is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn trennung_und_neuer_beitritt_gleichzeitig() {
    let u = umgebung().await;
    let token = u.token("anna").await;
    let general = u.raum("general", true).await;

    // Zuschauer machen die Broadcasts langsamer und das Zeitfenster groesser
    let mut zuschauer = Vec::new();
    for i in 0..20 {
        let t = u.token(&format!("gast{i}")).await;
        let c = u.verbinden(&t).await;
        u.beitreten(&c, general).await;
        zuschauer.push(c);
    }

    for _ in 0..200 {
        let a1 = u.verbinden(&token).await;
        u.beitreten(&a1, general).await;
        let a2 = u.verbinden(&token).await;
        let anna = a1.user.user_id;

        let state = u.state.clone();
        let trennen = tokio::spawn(async move { connect_handler::on_disconnect(&state, a1.session) });
        let dispatcher = MessageDispatcher::neu(u.state.clone());
        let session = a2.session;
        let beitreten = tokio::spawn(async move {
            dispatcher
                .dispatch(session, ClientEvent::JoinRoom { room_id: general })
                .await
        });
        assert!(trennen.await.unwrap());
        beitreten.await.unwrap().unwrap();
        u.state.persister.flush().await;

        assert!(u.state.registry.members_of(general).contains(&anna));
        let m = u.db.get_membership(anna, general).await.unwrap().unwrap();
        assert!(m.is_active, "Benutzer ist im Raum, Mitgliedschaft aber inaktiv");

        connect_handler::on_disconnect(&u.state, a2.session);
        u.state.persister.flush().await;
        assert!(!u.db.get_membership(anna, general).await.unwrap().unwrap().is_active);

        for c in &mut zuschauer {
            c.ereignisse();
        }
    }
}

#[tokio::test]
async fn index_entspricht_registry() {
    let u = umgebung().await;
    let raeume = [
        u.raum("a", true).await,
        u.raum("b", true).await,
        u.raum("c", true).await,
    ];
    let token_a = u.token("a").await;
    let token_b = u.token("b").await;
    let mut clients = vec![
        u.verbinden(&token_a).await,
        u.verbinden(&token_a).await,
        u.verbinden(&token_b).await,
    ];

    let schritte: [(usize, usize, bool); 9] = [
        (0, 0, true),
        (1, 0, true),
        (2, 1, true),
        (0, 0, false),
        (2, 2, true),
        (1, 0, false),
        (1, 2, true),
        (2, 1, false),
        (0, 1, true),
    ];
    for (client, raum, beitritt) in schritte {
        let event = if beitritt {
            ClientEvent::JoinRoom { room_id: raeume[raum] }
        } else {
            ClientEvent::LeaveRoom { room_id: raeume[raum] }
        };
        u.dispatcher.dispatch(clients[client].session, event).await.unwrap();

        for room_id in raeume {
            let erwartet: HashSet<UserId> = clients
                .iter()
                .filter_map(|c| u.state.registry.get(c.session).ok())
                .filter(|v| v.joined_rooms.contains(&room_id))
                .map(|v| v.user_id)
                .collect();
            assert_eq!(u.state.registry.members_of(room_id), erwartet);
        }
    }

    for c in &mut clients {
        c.ereignisse();
    }
}

#[tokio::test]
async fn raum_voll() {
    let u = umgebung().await;
    let klein = u
        .db
        .create_room(NeuerRaum {
            name: "klein",
            max_users: 1,
            ..Default::default()
        })
        .await
        .unwrap()
        .id;
    let token = u.token("u1").await;
    let a1 = u.verbinden(&token).await;
    let a2 = u.verbinden(&token).await;
    let b = u.verbinden(&u.token("u2").await).await;

    u.beitreten(&a1, klein).await;
    u.beitreten(&a2, klein).await;
    let err = u
        .dispatcher
        .dispatch(b.session, ClientEvent::JoinRoom { room_id: klein })
        .await
        .unwrap_err();
    assert_eq!(err.art(), FehlerArt::Forbidden);
    assert_eq!(u.state.registry.member_count(klein), 1);
}

// ---------------------------------------------------------------------------
// Tipp-Anzeige, Benutzerliste, Benachrichtigungen
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tippen_nicht_an_absender() {
    let u = umgebung().await;
    let general = u.raum("general", true).await;
    let mut s1 = u.verbinden(&u.token("u1").await).await;
    let mut s2 = u.verbinden(&u.token("u2").await).await;
    u.beitreten(&s1, general).await;
    u.beitreten(&s2, general).await;
    s1.ereignisse();
    s2.ereignisse();

    u.dispatcher
        .dispatch(s1.session, ClientEvent::TypingStart { room_id: general })
        .await
        .unwrap();
    assert!(s1.ereignisse().is_empty());
    assert!(matches!(
        s2.ereignisse().as_slice(),
        [ServerEvent::UserTyping { typing: true, .. }]
    ));

    // Ausserhalb des Raums wird ignoriert
    u.dispatcher
        .dispatch(s1.session, ClientEvent::TypingStop { room_id: RoomId::new() })
        .await
        .unwrap();
    assert!(s2.ereignisse().is_empty());
}

#[tokio::test]
async fn benutzerliste_eines_raums() {
    let u = umgebung().await;
    let general = u.raum("general", true).await;
    let token = u.token("anna").await;
    let mut a1 = u.verbinden(&token).await;
    let a2 = u.verbinden(&token).await;
    let bob = u.verbinden(&u.token("bob").await).await;
    for c in [&a1, &a2, &bob] {
        u.beitreten(c, general).await;
    }
    a1.ereignisse();

    u.dispatcher
        .dispatch(a1.session, ClientEvent::GetRoomUsers { room_id: general })
        .await
        .unwrap();
    match a1.ereignisse().as_slice() {
        [ServerEvent::RoomUsers { users, .. }] => {
            assert_eq!(users.len(), 2);
            assert_eq!(users[0].username, "anna");
            assert_eq!(users[0].connections, 2);
            assert_eq!(users[1].username, "bob");
        }
        anderes => panic!("Erwartet room_users, erhalten {anderes:?}"),
    }

    let err = u
        .dispatcher
        .dispatch(a1.session, ClientEvent::GetRoomUsers { room_id: RoomId::new() })
        .await
        .unwrap_err();
    assert_eq!(err.art(), FehlerArt::NotInRoom);
}

#[tokio::test]
async fn benachrichtigung_und_systemmeldung() {
    let u = umgebung().await;
    let general = u.raum("general", true).await;
    let token = u.token("anna").await;
    let mut a1 = u.verbinden(&token).await;
    let mut a2 = u.verbinden(&token).await;

    let payload = serde_json::json!({"art": "erwaehnung"});
    assert_eq!(u.state.notifications.notify(a1.user.user_id, payload.clone()), 2);
    for c in [&mut a1, &mut a2] {
        assert_eq!(
            c.ereignisse(),
            vec![ServerEvent::Notification {
                payload: payload.clone()
            }]
        );
    }
    assert_eq!(u.state.notifications.notify(UserId::new(), payload), 0);

    assert_eq!(u.state.broadcaster.system_message(general, "Wartung"), 0);
    u.beitreten(&a1, general).await;
    a1.ereignisse();
    assert_eq!(u.state.broadcaster.system_message(general, "Wartung"), 1);
    assert!(matches!(
        a1.ereignisse().as_slice(),
        [ServerEvent::SystemMessage { content, .. }] if content == "Wartung"
    ));
}

// ---------------------------------------------------------------------------
// Reaper
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reaper_entspricht_trennung() {
    let (u, zaehler) = umgebung_mit_zaehler().await;
    let general = u.raum("general", true).await;
    let mut s1 = u.verbinden(&u.token("u1").await).await;
    let mut s2 = u.verbinden(&u.token("u2").await).await;
    u.beitreten(&s1, general).await;
    u.beitreten(&s2, general).await;

    let reaper = StaleConnectionReaper::neu_mit(
        u.state.clone(),
        std::time::Duration::from_secs(3600),
        Duration::hours(24),
    );
    assert_eq!(reaper.sweep(Utc::now()), 0);
    assert_eq!(u.state.registry.count(), 2);

    assert_eq!(reaper.sweep(Utc::now() + Duration::hours(25)), 2);
    assert_eq!(u.state.registry.count(), 0);
    assert!(u.state.registry.members_of(general).is_empty());

    // Send-Queues sind geschlossen
    while s1.rx.recv().await.is_some() {}
    while s2.rx.recv().await.is_some() {}

    u.state.persister.flush().await;
    assert_eq!(zaehler.austritte.load(Ordering::SeqCst), 2);

    // Bereits entfernte Sessions sind ein No-op
    assert_eq!(reaper.sweep(Utc::now() + Duration::hours(50)), 0);
}

#[tokio::test]
async fn reaper_task_endet_beim_shutdown() {
    let u = umgebung().await;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = StaleConnectionReaper::neu(u.state.clone()).starten(shutdown_rx);

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
}

// ---------------------------------------------------------------------------
// TCP
// ---------------------------------------------------------------------------

async fn tcp_server(u: &Umgebung) -> (std::net::SocketAddr, watch::Sender<bool>) {
    let server = SignalingServer::binden(u.state.clone(), "127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let adresse = server.lokale_adresse().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(server.starten(shutdown_rx));
    (adresse, shutdown_tx)
}

async fn naechstes(framed: &mut Framed<TcpStream, ClientCodec>) -> ServerEvent {
    tokio::time::timeout(std::time::Duration::from_secs(5), framed.next())
        .await
        .expect("Timeout beim Warten auf ein Ereignis")
        .expect("Verbindung geschlossen")
        .expect("Ungueltiges Frame")
}

#[tokio::test]
async fn tcp_rundlauf() {
    let u = umgebung().await;
    let token = u.token("anna").await;
    let general = u.raum("general", true).await;
    let (adresse, shutdown_tx) = tcp_server(&u).await;

    let stream = TcpStream::connect(adresse).await.unwrap();
    let mut framed = Framed::new(stream, ClientCodec::new());

    framed.send(ClientEvent::Connect { token }).await.unwrap();
    assert!(matches!(naechstes(&mut framed).await, ServerEvent::Connected { .. }));
    assert!(matches!(naechstes(&mut framed).await, ServerEvent::AvailableRooms { .. }));

    framed
        .send(ClientEvent::JoinRoom { room_id: general })
        .await
        .unwrap();
    assert!(matches!(naechstes(&mut framed).await, ServerEvent::UserJoined { .. }));
    assert!(matches!(naechstes(&mut framed).await, ServerEvent::RoomJoined { user_count: 1, .. }));
    assert!(matches!(naechstes(&mut framed).await, ServerEvent::RecentMessages { .. }));

    framed
        .send(ClientEvent::SendMessage {
            room_id: general,
            content: "hallo welt".into(),
            message_type: MessageType::Text,
        })
        .await
        .unwrap();
    match naechstes(&mut framed).await {
        ServerEvent::NewMessage(info) => assert_eq!(info.content, "hallo welt"),
        anderes => panic!("Erwartet new_message, erhalten {anderes:?}"),
    }

    // Nach dem Schliessen raeumt der Server die Session auf
    drop(framed);
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while u.state.registry.count() > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert!(u.state.registry.members_of(general).is_empty());

    shutdown_tx.send(true).unwrap();
}

#[tokio::test]
async fn tcp_erstes_frame_muss_connect_sein() {
    let u = umgebung().await;
    let (adresse, shutdown_tx) = tcp_server(&u).await;

    let stream = TcpStream::connect(adresse).await.unwrap();
    let mut framed = Framed::new(stream, ClientCodec::new());
    framed
        .send(ClientEvent::JoinRoom { room_id: RoomId::new() })
        .await
        .unwrap();

    assert!(matches!(naechstes(&mut framed).await, ServerEvent::Error { .. }));
    let ende = tokio::time::timeout(std::time::Duration::from_secs(5), framed.next())
        .await
        .unwrap();
    assert!(ende.is_none());
    assert_eq!(u.state.registry.count(), 0);

    shutdown_tx.send(true).unwrap();
}

#[tokio::test]
async fn tcp_ungueltiges_token_schliesst_verbindung() {
    let u = umgebung().await;
    let (adresse, shutdown_tx) = tcp_server(&u).await;

    let stream = TcpStream::connect(adresse).await.unwrap();
    let mut framed = Framed::new(stream, ClientCodec::new());
    framed
        .send(ClientEvent::Connect {
            token: "gibt-es-nicht".into(),
        })
        .await
        .unwrap();

    match naechstes(&mut framed).await {
        ServerEvent::Error { message } => assert_eq!(message, "Not authenticated"),
        anderes => panic!("Erwartet error, erhalten {anderes:?}"),
    }
    let ende = tokio::time::timeout(std::time::Duration::from_secs(5), framed.next())
        .await
        .unwrap();
    assert!(ende.is_none());

    shutdown_tx.send(true).unwrap();
}

#[tokio::test]
async fn tcp_ungueltige_anfrage_haelt_verbindung_offen() {
    let u = umgebung().await;
    let token = u.token("anna").await;
    let general = u.raum("general", true).await;
    let (adresse, shutdown_tx) = tcp_server(&u).await;

    let stream = TcpStream::connect(adresse).await.unwrap();
    let mut framed = Framed::new(stream, ClientCodec::new());

    framed.send(ClientEvent::Connect { token }).await.unwrap();
    assert!(matches!(naechstes(&mut framed).await, ServerEvent::Connected { .. }));
    assert!(matches!(naechstes(&mut framed).await, ServerEvent::AvailableRooms { .. }));

    framed
        .send(ClientEvent::JoinRoom { room_id: general })
        .await
        .unwrap();
    assert!(matches!(naechstes(&mut framed).await, ServerEvent::UserJoined { .. }));
    assert!(matches!(naechstes(&mut framed).await, ServerEvent::RoomJoined { .. }));
    assert!(matches!(naechstes(&mut framed).await, ServerEvent::RecentMessages { .. }));

    let ungueltig = [
        serde_json::json!({"type": "join_room", "room_id": "general"}),
        serde_json::json!({"type": "join_room"}),
        serde_json::json!({"type": "send_message", "room_id": general}),
        serde_json::json!({"type": "fliegen"}),
    ];
    for anfrage in ungueltig {
        framed.send(anfrage).await.unwrap();
        match naechstes(&mut framed).await {
            ServerEvent::Error { message } => assert_eq!(message, "Invalid request"),
            anderes => panic!("Erwartet error, erhalten {anderes:?}"),
        }
    }

    framed
        .send(ClientEvent::SendMessage {
            room_id: general,
            content: "immer noch da".into(),
            message_type: MessageType::Text,
        })
        .await
        .unwrap();
    match naechstes(&mut framed).await {
        ServerEvent::NewMessage(info) => assert_eq!(info.content, "immer noch da"),
        anderes => panic!("Erwartet new_message, erhalten {anderes:?}"),
    }
    assert_eq!(u.state.registry.count(), 1);
    assert_eq!(u.state.registry.members_of(general).len(), 1);

    shutdown_tx.send(true).unwrap();
}
