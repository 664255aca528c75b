//! Fehlertypen fuer das Chat-Crate

use thiserror::Error;

/// Chat-Fehlertypen
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Nachrichteninhalt darf nicht leer sein")]
    LeereNachricht,

    #[error("Nachricht zu lang: {laenge} Zeichen (Maximum: {max})")]
    NachrichtZuLang { laenge: usize, max: usize },

    #[error("Datenbank-Fehler: {0}")]
    DatenbankFehler(#[from] treffpunkt_db::DbError),
}

pub type ChatResult<T> = Result<T, ChatError>;
