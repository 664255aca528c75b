//! MembershipPersister – Raum-Mitgliedschaften dauerhaft festhalten
//!
//! Alle Schreibauftraege laufen ueber einen einzigen Worker-Task mit
//! FIFO-Queue. Join und Leave fuer dasselbe Paar werden dadurch in der
//! Reihenfolge angewendet, in der sie eingereicht wurden.
//!
//! Fehler werden geloggt, nie an den Aufrufer weitergegeben.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use treffpunkt_core::types::{RoomId, UserId};
use treffpunkt_db::{DbResult, MembershipRepository};

enum Auftrag {
    Beitritt {
        user_id: UserId,
        room_id: RoomId,
        fertig: oneshot::Sender<()>,
    },
    Austritt {
        user_id: UserId,
        room_id: RoomId,
    },
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct MembershipPersister {
    tx: mpsc::UnboundedSender<Auftrag>,
}

impl MembershipPersister {
    /// Startet den Worker-Task
    ///
    /// Muss innerhalb einer tokio-Runtime aufgerufen werden. Der Worker
    /// endet, wenn alle Handles gedroppt sind.
    pub fn starten(repo: Arc<dyn MembershipRepository>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(worker(repo, rx));
        Self { tx }
    }

    /// Mitgliedschaft aktiv setzen und auf den Schreibvorgang warten
    pub async fn record_join(&self, user_id: UserId, room_id: RoomId) {
        let _ = self.beitritt_einreihen(user_id, room_id).await;
    }

    /// Reiht einen Beitritt ein, ohne zu warten
    ///
    /// Der Empfaenger meldet, wenn der Worker den Auftrag abgearbeitet hat.
    /// Die [`ConnectionRegistry`](crate::registry::ConnectionRegistry) ruft
    /// das unter ihrem Lock auf, damit die Queue dieselbe Reihenfolge hat
    /// wie die Registry.
    pub fn beitritt_einreihen(&self, user_id: UserId, room_id: RoomId) -> oneshot::Receiver<()> {
        let (fertig, warten) = oneshot::channel();
        if self
            .tx
            .send(Auftrag::Beitritt {
                user_id,
                room_id,
                fertig,
            })
            .is_err()
        {
            tracing::error!(user_id = %user_id, room_id = %room_id, "Persister-Worker beendet – Beitritt nicht gespeichert");
        }
        warten
    }

    /// Mitgliedschaft inaktiv setzen (fire-and-forget)
    pub fn record_leave(&self, user_id: UserId, room_id: RoomId) {
        if self.tx.send(Auftrag::Austritt { user_id, room_id }).is_err() {
            tracing::error!(user_id = %user_id, room_id = %room_id, "Persister-Worker beendet – Austritt nicht gespeichert");
        }
    }

    /// Wartet, bis alle bisher eingereichten Auftraege abgearbeitet sind
    pub async fn flush(&self) {
        let (fertig, warten) = oneshot::channel();
        if self.tx.send(Auftrag::Flush(fertig)).is_ok() {
            let _ = warten.await;
        }
    }
}

async fn worker(repo: Arc<dyn MembershipRepository>, mut rx: mpsc::UnboundedReceiver<Auftrag>) {
    tracing::debug!("Membership-Persister gestartet");

    while let Some(auftrag) = rx.recv().await {
        match auftrag {
            Auftrag::Beitritt {
                user_id,
                room_id,
                fertig,
            } => {
                if let Err(e) = repo.upsert_membership(user_id, room_id, true, None).await {
                    tracing::error!(
                        user_id = %user_id,
                        room_id = %room_id,
                        fehler = %e,
                        "Beitritt konnte nicht gespeichert werden"
                    );
                }
                let _ = fertig.send(());
            }
            Auftrag::Austritt { user_id, room_id } => {
                if let Err(e) = austritt_schreiben(repo.as_ref(), user_id, room_id).await {
                    tracing::error!(
                        user_id = %user_id,
                        room_id = %room_id,
                        fehler = %e,
                        "Austritt konnte nicht gespeichert werden"
                    );
                }
            }
            Auftrag::Flush(fertig) => {
                let _ = fertig.send(());
            }
        }
    }

    tracing::debug!("Membership-Persister beendet");
}

/// Nur eine aktive Mitgliedschaft wird beendet
async fn austritt_schreiben(
    repo: &dyn MembershipRepository,
    user_id: UserId,
    room_id: RoomId,
) -> DbResult<()> {
    match repo.get_membership(user_id, room_id).await? {
        Some(m) if m.is_active => {
            repo.upsert_membership(user_id, room_id, false, Some(Utc::now()))
                .await
        }
        _ => Ok(()),
    }
}
