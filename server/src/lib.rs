//! treffpunkt-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use config::ServerConfig;
use tokio::sync::watch;
use treffpunkt_db::SqliteDb;
use treffpunkt_signaling::{SignalingServer, SignalingState, StaleConnectionReaper};

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Datenbankverbindung herstellen (inkl. Migrationen)
    /// 2. Reaper starten
    /// 3. TCP-Listener starten
    /// 4. Auf Ctrl-C warten, dann alles stoppen und offene Schreibvorgaenge abwarten
    pub async fn starten(self) -> Result<()> {
        tracing::info!(
            server_name = %self.config.server.name,
            tcp = %self.config.tcp_bind_adresse(),
            "Server startet"
        );

        let db = SqliteDb::oeffnen(&self.config.datenbank_config())
            .await
            .with_context(|| format!("Datenbank '{}' nicht verfuegbar", self.config.datenbank.url))?;
        let db = Arc::new(db);
        tracing::info!(url = %self.config.datenbank.url, "Datenbank bereit");

        let state = SignalingState::neu(self.config.signaling_config(), db.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let reaper = StaleConnectionReaper::neu(state.clone()).starten(shutdown_rx.clone());

        let adresse: SocketAddr = self
            .config
            .tcp_bind_adresse()
            .parse()
            .with_context(|| format!("Ungueltige Bind-Adresse '{}'", self.config.tcp_bind_adresse()))?;
        let server = SignalingServer::binden(state.clone(), adresse)
            .await
            .with_context(|| format!("TCP-Port {adresse} konnte nicht gebunden werden"))?;
        let listener = tokio::spawn(server.starten(shutdown_rx));

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");

        let _ = shutdown_tx.send(true);
        if let Err(e) = reaper.await {
            tracing::warn!(fehler = %e, "Reaper-Task abgebrochen");
        }
        match listener.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(fehler = %e, "TCP-Listener mit Fehler beendet"),
            Err(e) => tracing::warn!(fehler = %e, "TCP-Listener-Task abgebrochen"),
        }

        state.persister.flush().await;
        db.schliessen().await;
        tracing::info!("Server beendet");

        Ok(())
    }
}
