//! Fehlertypen fuer den Signaling-Service

use thiserror::Error;
use treffpunkt_auth::AuthError;
use treffpunkt_chat::ChatError;
use treffpunkt_core::types::{RoomId, SessionId};
use treffpunkt_db::DbError;

/// Fehlerklasse, unabhaengig von der konkreten Ursache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FehlerArt {
    Unauthenticated,
    Forbidden,
    NotFound,
    NotInRoom,
    PermissionDenied,
    EmptyMessage,
    MessageTooLong,
    RoomUnavailable,
    DuplicateSession,
    PersistenceFailure,
    Protocol,
}

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Authentifizierungsfehler
    #[error("Authentifizierungsfehler: {0}")]
    Auth(#[from] AuthError),

    /// Protokollfehler (ungueltiges Frame, falscher Zustand)
    #[error("Protokollfehler: {0}")]
    Protokoll(String),

    #[error("Session bereits registriert: {0}")]
    SessionDoppelt(SessionId),

    #[error("Session nicht gefunden: {0}")]
    SessionNichtGefunden(SessionId),

    #[error("Raum nicht gefunden: {0}")]
    RaumNichtGefunden(RoomId),

    /// Raum existiert, ist aber deaktiviert
    #[error("Raum nicht verfuegbar: {0}")]
    RaumNichtVerfuegbar(RoomId),

    /// Privater Raum ohne Mitgliedschaft
    #[error("Zugriff auf privaten Raum verweigert: {0}")]
    ZugriffVerweigert(RoomId),

    #[error("Raum ist voll: {room_id} (Maximum: {max})")]
    RaumVoll { room_id: RoomId, max: u32 },

    #[error("Session ist nicht im Raum: {0}")]
    NichtImRaum(RoomId),

    #[error("Keine Schreibberechtigung im Raum: {0}")]
    KeineSchreibberechtigung(RoomId),

    #[error("Leere Nachricht")]
    LeereNachricht,

    #[error("Nachricht zu lang: {laenge} Zeichen (Maximum: {max})")]
    NachrichtZuLang { laenge: usize, max: usize },

    /// Speicher nicht erreichbar oder Schreibfehler
    #[error("Persistenzfehler: {0}")]
    Persistenz(String),
}

impl SignalingError {
    /// Erstellt einen Protokollfehler
    pub fn protokoll(msg: impl Into<String>) -> Self {
        Self::Protokoll(msg.into())
    }

    pub fn art(&self) -> FehlerArt {
        match self {
            Self::Io(_) | Self::Protokoll(_) => FehlerArt::Protocol,
            Self::Auth(e) if e.ist_verboten() => FehlerArt::Forbidden,
            Self::Auth(_) => FehlerArt::Unauthenticated,
            Self::SessionDoppelt(_) => FehlerArt::DuplicateSession,
            Self::SessionNichtGefunden(_) | Self::RaumNichtGefunden(_) => FehlerArt::NotFound,
            Self::RaumNichtVerfuegbar(_) => FehlerArt::RoomUnavailable,
            Self::ZugriffVerweigert(_) | Self::RaumVoll { .. } => FehlerArt::Forbidden,
            Self::NichtImRaum(_) => FehlerArt::NotInRoom,
            Self::KeineSchreibberechtigung(_) => FehlerArt::PermissionDenied,
            Self::LeereNachricht => FehlerArt::EmptyMessage,
            Self::NachrichtZuLang { .. } => FehlerArt::MessageTooLong,
            Self::Persistenz(_) => FehlerArt::PersistenceFailure,
        }
    }

    /// Meldung fuer das `error`-Ereignis an den Client
    ///
    /// Interne Details (Datenbank, IO) werden nicht preisgegeben.
    pub fn client_meldung(&self) -> String {
        match self {
            Self::Io(_) | Self::Protokoll(_) => "Invalid request".into(),
            Self::Auth(e) if e.ist_verboten() => "Account is not active".into(),
            Self::Auth(_) => "Not authenticated".into(),
            Self::SessionDoppelt(_) | Self::Persistenz(_) => "Internal server error".into(),
            Self::SessionNichtGefunden(_) => "Not connected".into(),
            Self::RaumNichtGefunden(_) | Self::RaumNichtVerfuegbar(_) => {
                "Room not found or inactive".into()
            }
            Self::ZugriffVerweigert(_) => "Access denied to private room".into(),
            Self::RaumVoll { .. } => "Room is full".into(),
            Self::NichtImRaum(_) => "You are not in this room".into(),
            Self::KeineSchreibberechtigung(_) => {
                "You do not have permission to send messages".into()
            }
            Self::LeereNachricht => "Message content required".into(),
            Self::NachrichtZuLang { max, .. } => {
                format!("Message too long (maximum {max} characters)")
            }
        }
    }
}

impl From<DbError> for SignalingError {
    fn from(e: DbError) -> Self {
        Self::Persistenz(e.to_string())
    }
}

impl From<ChatError> for SignalingError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::LeereNachricht => Self::LeereNachricht,
            ChatError::NachrichtZuLang { laenge, max } => Self::NachrichtZuLang { laenge, max },
            ChatError::DatenbankFehler(db) => db.into(),
        }
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;
