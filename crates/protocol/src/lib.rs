//! treffpunkt-protocol – Netzwerkprotokoll-Definitionen
//!
//! Dieses Crate definiert alle Ereignisse die zwischen Client und Server
//! ausgetauscht werden, sowie das Frame-Format fuer TCP-Verbindungen.

pub mod events;
pub mod wire;

pub use events::{ChatMessageInfo, ClientEvent, RoomInfo, RoomUserInfo, ServerEvent};
pub use wire::{Anfrage, ClientCodec, FrameCodec, FrameInhalt, ServerCodec};
