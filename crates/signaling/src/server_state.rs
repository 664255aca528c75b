//! Gemeinsamer Server-Zustand fuer den Signaling-Service
//!
//! Haelt alle geteilten Services und Zustands-Manager, die sicher zwischen
//! tokio-Tasks geteilt werden koennen.

use std::sync::Arc;

use treffpunkt_auth::SessionAuthenticator;
use treffpunkt_chat::{ChatService, STANDARD_VERLAUF_LIMIT};
use treffpunkt_db::{MembershipRepository, Speicher};
use treffpunkt_protocol::wire::DEFAULT_MAX_FRAME_SIZE;

use crate::broadcast::MessageBroadcaster;
use crate::notify::NotificationRouter;
use crate::persister::MembershipPersister;
use crate::registry::ConnectionRegistry;

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Anzeigename des Servers
    pub server_name: String,
    /// Maximale Frame-Groesse in Bytes
    pub max_frame_size: usize,
    /// Groesse der ausgehenden Queue pro Verbindung
    pub send_queue_groesse: usize,
    /// Nachrichten, die beim Betreten eines Raums geschickt werden
    pub verlauf_limit: u32,
    /// Abstand zwischen zwei Reaper-Durchlaeufen in Sekunden
    pub reaper_intervall_sek: u64,
    /// Maximale Verbindungsdauer in Sekunden
    pub reaper_ttl_sek: u64,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            server_name: "Treffpunkt".to_string(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            send_queue_groesse: 64,
            verlauf_limit: STANDARD_VERLAUF_LIMIT,
            reaper_intervall_sek: 3600,
            reaper_ttl_sek: 86_400,
        }
    }
}

/// Gemeinsamer Server-Zustand
///
/// Wird als `Arc<SignalingState>` an Handler, Verbindungen und den Reaper
/// weitergegeben.
pub struct SignalingState {
    pub config: SignalingConfig,
    pub authenticator: SessionAuthenticator,
    /// Speicher fuer Raum- und Mitgliedschaftsabfragen
    pub speicher: Arc<dyn Speicher>,
    pub registry: ConnectionRegistry,
    pub persister: MembershipPersister,
    pub broadcaster: MessageBroadcaster,
    pub chat: ChatService,
    pub notifications: NotificationRouter,
}

impl SignalingState {
    /// Erstellt den Zustand auf einem gemeinsamen Speicher
    ///
    /// Startet den Persister-Worker, braucht also eine laufende Runtime.
    pub fn neu<S: Speicher + 'static>(config: SignalingConfig, speicher: Arc<S>) -> Arc<Self> {
        let mitgliedschaften: Arc<dyn MembershipRepository> = speicher.clone();
        Self::aufbauen(config, speicher, mitgliedschaften)
    }

    /// Wie [`Self::neu`], aber Mitgliedschaften werden ueber ein eigenes
    /// Repository geschrieben
    pub fn mit_mitgliedschaften<S, M>(
        config: SignalingConfig,
        speicher: Arc<S>,
        mitgliedschaften: Arc<M>,
    ) -> Arc<Self>
    where
        S: Speicher + 'static,
        M: MembershipRepository + 'static,
    {
        Self::aufbauen(config, speicher, mitgliedschaften)
    }

    fn aufbauen<S: Speicher + 'static>(
        config: SignalingConfig,
        speicher: Arc<S>,
        mitgliedschaften: Arc<dyn MembershipRepository>,
    ) -> Arc<Self> {
        let persister = MembershipPersister::starten(mitgliedschaften);
        let registry = ConnectionRegistry::mit_persister(persister.clone());
        let chat = ChatService::neu(speicher.clone()).mit_verlauf_limit(config.verlauf_limit);
        let speicher_dyn: Arc<dyn Speicher> = speicher.clone();

        Arc::new(Self {
            authenticator: SessionAuthenticator::neu(speicher),
            broadcaster: MessageBroadcaster::neu(
                registry.clone(),
                speicher_dyn.clone(),
                chat.clone(),
            ),
            notifications: NotificationRouter::neu(registry.clone()),
            persister,
            speicher: speicher_dyn,
            registry,
            chat,
            config,
        })
    }
}
