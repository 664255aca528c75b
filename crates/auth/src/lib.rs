//! treffpunkt-auth – Sitzungs-Authentifizierung
//!
//! Wandelt ein undurchsichtiges Bearer-Token in eine verifizierte
//! Benutzer-Identitaet um. Ausgabe von Tokens, Passwoerter und Login
//! gehoeren nicht zu diesem Crate.

pub mod authenticator;
pub mod error;

pub use authenticator::SessionAuthenticator;
pub use error::{AuthError, AuthResult};
