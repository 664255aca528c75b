//! StaleConnectionReaper – Entfernt zu lange bestehende Verbindungen
//!
//! Laeuft periodisch und schickt jede Verbindung, die laenger als die TTL
//! besteht, durch denselben Trennungspfad wie ein Transport-Ende. Die
//! Verbindung selbst merkt das an ihrer geschlossenen Send-Queue.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::handlers::connect_handler;
use crate::server_state::SignalingState;

pub struct StaleConnectionReaper {
    state: Arc<SignalingState>,
    intervall: Duration,
    ttl: chrono::Duration,
}

impl StaleConnectionReaper {
    /// Intervall und TTL aus der Konfiguration
    pub fn neu(state: Arc<SignalingState>) -> Self {
        let intervall = Duration::from_secs(state.config.reaper_intervall_sek);
        let ttl = chrono::Duration::seconds(state.config.reaper_ttl_sek as i64);
        Self::neu_mit(state, intervall, ttl)
    }

    pub fn neu_mit(state: Arc<SignalingState>, intervall: Duration, ttl: chrono::Duration) -> Self {
        Self {
            state,
            intervall,
            ttl,
        }
    }

    /// Ein Durchlauf: entfernt alle Verbindungen aelter als die TTL
    ///
    /// Gibt die Anzahl der entfernten Verbindungen zurueck.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let veraltet = self.state.registry.stale(now, self.ttl);
        let entfernt = veraltet
            .into_iter()
            .filter(|&session_id| connect_handler::on_disconnect(&self.state, session_id))
            .count();

        if entfernt > 0 {
            tracing::info!(entfernt, "Veraltete Verbindungen entfernt");
        }
        entfernt
    }

    /// Startet den periodischen Task, beendet sich beim Shutdown-Signal
    pub fn starten(self, mut shutdown_rx: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.intervall);
            // Der erste Tick kommt sofort
            ticker.tick().await;

            tracing::debug!(
                intervall_sek = self.intervall.as_secs(),
                ttl_sek = self.ttl.num_seconds(),
                "Reaper gestartet"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep(Utc::now());
                    }
                    _ = shutdown_rx.wait_for(|stop| *stop) => {
                        break;
                    }
                }
            }

            tracing::debug!("Reaper beendet");
        })
    }
}
