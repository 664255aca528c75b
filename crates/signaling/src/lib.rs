//! treffpunkt-signaling – Raum-Sessions in Echtzeit
//!
//! Dieser Crate verwaltet TCP-Verbindungen, ordnet sie Raeumen zu und
//! verteilt Nachrichten, Tipp-Anzeigen und Benachrichtigungen an alle
//! betroffenen Sessions.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (SignalingServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |  connect -> authentifiziert -> getrennt
//!     |
//!     v
//! MessageDispatcher
//!     |
//!     +-- connect_handler (Verbinden, Trennen)
//!     +-- room_handler    (Join, Leave, Benutzerliste)
//!     +-- chat_handler    (Nachrichten, Tipp-Anzeige)
//!
//! ConnectionRegistry   – Verbindungen + RoomMembershipIndex unter einem Lock
//! MessageBroadcaster   – Pruefen, speichern, an Raeume verteilen
//! NotificationRouter   – Ereignisse an alle Geraete eines Benutzers
//! MembershipPersister  – Mitgliedschaften in FIFO-Reihenfolge speichern
//! StaleConnectionReaper – Zu alte Verbindungen periodisch trennen
//! ```

pub mod broadcast;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod index;
pub mod notify;
pub mod persister;
pub mod reaper;
pub mod registry;
pub mod server_state;
pub mod tcp;

// Bequeme Re-Exporte
pub use broadcast::{ClientSender, MessageBroadcaster, Zustellung};
pub use connection::ClientConnection;
pub use dispatcher::MessageDispatcher;
pub use error::{FehlerArt, SignalingError, SignalingResult};
pub use index::RoomMembershipIndex;
pub use notify::NotificationRouter;
pub use persister::MembershipPersister;
pub use reaper::StaleConnectionReaper;
pub use registry::{Connection, ConnectionRegistry};
pub use server_state::{SignalingConfig, SignalingState};
pub use tcp::SignalingServer;
