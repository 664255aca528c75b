//! Fehlertypen fuer die Authentifizierung

use thiserror::Error;
use treffpunkt_core::types::AccountStatus;

/// Alle moeglichen Fehler bei der Authentifizierung
#[derive(Debug, Error)]
pub enum AuthError {
    // --- Nicht authentifiziert ---
    #[error("Kein Token angegeben")]
    TokenFehlt,

    #[error("Session nicht gefunden oder abgelaufen")]
    SessionUngueltig,

    // --- Verboten ---
    #[error("Benutzerkonto ist nicht aktiv ({})", .0.als_str())]
    KontoInaktiv(AccountStatus),

    // --- Datenbank ---
    #[error("Datenbankfehler: {0}")]
    Datenbank(#[from] treffpunkt_db::DbError),
}

impl AuthError {
    /// `Unauthenticated`: die Identitaet konnte nicht festgestellt werden
    pub fn ist_unauthentifiziert(&self) -> bool {
        !self.ist_verboten()
    }

    /// `Forbidden`: die Identitaet ist bekannt, aber nicht zugelassen
    pub fn ist_verboten(&self) -> bool {
        matches!(self, Self::KontoInaktiv(_))
    }
}

/// Result-Alias fuer die Authentifizierung
pub type AuthResult<T> = Result<T, AuthError>;
