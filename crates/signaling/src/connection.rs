//! Client-Connection – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede TCP-Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task.
//!
//! ## Ablauf
//! ```text
//! Verbinden -> Authentifiziert -> Getrennt
//! ```
//! Das erste Frame muss `connect` sein. Alles andere (oder ein abgelehntes
//! Token) beendet die Verbindung mit einem letzten `error`-Ereignis.
//!
//! Nach dem Verbinden bekommt eine unbrauchbare Anfrage nur ein `error`,
//! die Verbindung bleibt offen. Geschlossen wird nur bei Fehlern im
//! Frame-Format selbst (z.B. zu gross), weil der Stream danach nicht mehr
//! lesbar ist.
//!
//! Danach laufen drei Quellen in einem `select!`: eingehende Frames, die
//! ausgehende Queue der Session und das Shutdown-Signal. Schliesst sich
//! die Queue (Reaper hat die Session entfernt), endet die Verbindung.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_util::codec::Framed;
use treffpunkt_core::types::SessionId;
use treffpunkt_protocol::{Anfrage, ClientEvent, ServerCodec, ServerEvent};

use crate::broadcast::ClientSender;
use crate::dispatcher::MessageDispatcher;
use crate::error::SignalingError;
use crate::handlers::connect_handler;
use crate::server_state::SignalingState;

type ClientFramed = Framed<TcpStream, ServerCodec>;

/// Verarbeitet eine einzelne TCP-Verbindung
pub struct ClientConnection {
    state: Arc<SignalingState>,
    peer_addr: SocketAddr,
    session_id: SessionId,
}

impl ClientConnection {
    pub fn neu(state: Arc<SignalingState>, peer_addr: SocketAddr) -> Self {
        Self {
            state,
            peer_addr,
            session_id: SessionId::new(),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis die Verbindung getrennt wird oder ein Shutdown-Signal
    /// eingeht. Am Ende wird die Session immer ueber den Trennungspfad
    /// aufgeraeumt.
    pub async fn verarbeiten(self, stream: TcpStream, mut shutdown_rx: watch::Receiver<bool>) {
        let peer_addr = self.peer_addr;
        let session_id = self.session_id;
        tracing::debug!(peer = %peer_addr, session_id = %session_id, "Neue Verbindung");

        let mut framed = Framed::new(
            stream,
            ServerCodec::with_max_size(self.state.config.max_frame_size),
        );

        let mut sende_rx = tokio::select! {
            ergebnis = self.handshake(&mut framed) => match ergebnis {
                Some(rx) => rx,
                None => return,
            },
            _ = warte_auf_shutdown(&mut shutdown_rx) => return,
        };

        let dispatcher = MessageDispatcher::neu(Arc::clone(&self.state));

        loop {
            tokio::select! {
                frame = framed.next() => match frame {
                    Some(Ok(Anfrage::Ereignis(ereignis))) => {
                        // Fehler wurden bereits an die Session gemeldet
                        let _ = dispatcher.dispatch(session_id, ereignis).await;
                    }
                    Some(Ok(Anfrage::Ungueltig(grund))) => {
                        tracing::debug!(session_id = %session_id, grund = %grund, "Ungueltige Anfrage");
                        let meldung = SignalingError::protokoll(grund).client_meldung();
                        self.state
                            .broadcaster
                            .an_session_senden(session_id, ServerEvent::error(meldung));
                    }
                    Some(Err(e)) => {
                        tracing::warn!(session_id = %session_id, fehler = %e, "Frame-Lesefehler");
                        let meldung = SignalingError::from(e).client_meldung();
                        let _ = framed.send(ServerEvent::error(meldung)).await;
                        break;
                    }
                    None => {
                        tracing::debug!(session_id = %session_id, "Verbindung vom Client getrennt");
                        break;
                    }
                },

                ausgehend = sende_rx.recv() => match ausgehend {
                    Some(ereignis) => {
                        if let Err(e) = framed.send(ereignis).await {
                            tracing::warn!(session_id = %session_id, fehler = %e, "Senden fehlgeschlagen");
                            break;
                        }
                    }
                    None => {
                        tracing::info!(session_id = %session_id, "Session entfernt – Verbindung wird geschlossen");
                        break;
                    }
                },

                _ = warte_auf_shutdown(&mut shutdown_rx) => {
                    tracing::debug!(session_id = %session_id, "Shutdown-Signal – Verbindung wird getrennt");
                    break;
                }
            }
        }

        connect_handler::on_disconnect(&self.state, session_id);
        tracing::debug!(peer = %peer_addr, session_id = %session_id, "Verbindungs-Task beendet");
    }

    /// Erwartet `connect` als erstes Frame
    ///
    /// Gibt die ausgehende Queue zurueck oder `None`, wenn die Verbindung
    /// geschlossen werden soll.
    async fn handshake(&self, framed: &mut ClientFramed) -> Option<mpsc::Receiver<ServerEvent>> {
        let token = match framed.next().await {
            Some(Ok(Anfrage::Ereignis(ClientEvent::Connect { token }))) => token,
            Some(Ok(Anfrage::Ereignis(anderes))) => {
                tracing::debug!(
                    peer = %self.peer_addr,
                    ereignis = anderes.name(),
                    "Erstes Ereignis ist nicht connect"
                );
                let _ = framed.send(ServerEvent::error("Not authenticated")).await;
                return None;
            }
            Some(Ok(Anfrage::Ungueltig(grund))) => {
                tracing::debug!(peer = %self.peer_addr, grund = %grund, "Ungueltiges erstes Frame");
                let _ = framed.send(ServerEvent::error("Invalid request")).await;
                return None;
            }
            Some(Err(e)) => {
                tracing::debug!(peer = %self.peer_addr, fehler = %e, "Ungueltiges erstes Frame");
                let _ = framed.send(ServerEvent::error("Invalid request")).await;
                return None;
            }
            None => return None,
        };

        let (sender, mut rx) = ClientSender::neu(self.session_id, self.state.config.send_queue_groesse);
        match connect_handler::on_connect(
            &self.state,
            self.session_id,
            &token,
            Some(self.peer_addr),
            sender,
        )
        .await
        {
            Ok(_) => Some(rx),
            Err(e) => {
                rx.close();
                let _ = framed.send(ServerEvent::error(e.client_meldung())).await;
                None
            }
        }
    }
}

/// Kehrt zurueck, sobald `true` gesendet oder der Sender gedroppt wurde
async fn warte_auf_shutdown(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}
