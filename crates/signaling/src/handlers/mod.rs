//! Handler fuer alle Client-Ereignisse
//!
//! Jeder Handler ist fuer einen Teil des Ablaufs zustaendig und hat Zugriff
//! auf den gemeinsamen SignalingState.

pub mod chat_handler;
pub mod connect_handler;
pub mod room_handler;
