//! SessionAuthenticator – Token -> verifizierte Identitaet
//!
//! Zustandslos: jede Pruefung fragt den Speicher. Kann beliebig oft
//! parallel aufgerufen werden.

use std::sync::Arc;

use treffpunkt_core::types::UserIdentity;
use treffpunkt_db::SessionRepository;

use crate::error::{AuthError, AuthResult};

#[derive(Clone)]
pub struct SessionAuthenticator {
    sitzungen: Arc<dyn SessionRepository>,
}

impl SessionAuthenticator {
    pub fn neu(sitzungen: Arc<dyn SessionRepository>) -> Self {
        Self { sitzungen }
    }

    /// Prueft ein Bearer-Token
    ///
    /// # Fehler
    /// - [`AuthError::TokenFehlt`] bei leerem Token (ohne Datenbankzugriff)
    /// - [`AuthError::SessionUngueltig`] wenn keine aktive, gueltige Sitzung existiert
    /// - [`AuthError::KontoInaktiv`] wenn das Konto nicht aktiv ist
    pub async fn authenticate(&self, token: &str) -> AuthResult<UserIdentity> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::TokenFehlt);
        }

        let inhaber = self
            .sitzungen
            .verify_token(token)
            .await?
            .ok_or(AuthError::SessionUngueltig)?;

        if !inhaber.status.ist_aktiv() {
            tracing::info!(
                user_id = %inhaber.user_id,
                status = inhaber.status.als_str(),
                "Anmeldung mit inaktivem Konto abgelehnt"
            );
            return Err(AuthError::KontoInaktiv(inhaber.status));
        }

        Ok(UserIdentity {
            user_id: inhaber.user_id,
            username: inhaber.username,
        })
    }
}
