//! treffpunkt-chat – Raum-Nachrichten
//!
//! Dieses Crate implementiert:
//! - ChatService: Nachrichten pruefen und speichern, Verlauf laden
//!
//! Die Zustellung an verbundene Clients uebernimmt `treffpunkt-signaling`.

pub mod error;
pub mod service;
pub mod types;


pub use error::{ChatError, ChatResult};
pub use service::{ChatService, MAX_NACHRICHTEN_LAENGE, STANDARD_VERLAUF_LIMIT};
pub use types::ChatNachricht;
