//! NotificationRouter – Benachrichtigungen an alle Geraete eines Benutzers

use treffpunkt_core::types::UserId;
use treffpunkt_protocol::ServerEvent;

use crate::registry::ConnectionRegistry;

#[derive(Clone)]
pub struct NotificationRouter {
    registry: ConnectionRegistry,
}

impl NotificationRouter {
    pub fn neu(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// Stellt `payload` an jede Verbindung des Benutzers zu
    ///
    /// Gibt die Anzahl der Queues zurueck, die das Ereignis angenommen haben.
    /// Ohne Verbindung passiert nichts.
    pub fn notify(&self, user_id: UserId, payload: serde_json::Value) -> usize {
        let sender = self.registry.senders_by_user(user_id);
        if sender.is_empty() {
            tracing::trace!(user_id = %user_id, "Benachrichtigung: Benutzer nicht verbunden");
            return 0;
        }

        let ereignis = ServerEvent::Notification { payload };
        let zugestellt = sender
            .iter()
            .filter(|s| s.senden(ereignis.clone()))
            .count();

        tracing::debug!(user_id = %user_id, zugestellt, "Benachrichtigung versendet");
        zugestellt
    }
}
