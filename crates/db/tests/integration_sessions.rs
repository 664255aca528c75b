//! Integration-Tests fuer SessionRepository und Seed-Benutzer (In-Memory SQLite)

use chrono::Duration;
use treffpunkt_core::types::AccountStatus;
use treffpunkt_db::{SeedRepository, SessionRepository, SqliteDb};

async fn db() -> SqliteDb {
    SqliteDb::in_memory().await.expect("In-Memory DB konnte nicht erstellt werden")
}

#[tokio::test]
async fn gueltiges_token_liefert_besitzer() {
    let db = db().await;
    let anna = db.create_user("anna", AccountStatus::Active).await.unwrap();
    let sitzung = db.create_session(anna.id, Duration::hours(1)).await.unwrap();

    let inhaber = db.verify_token(&sitzung.token).await.unwrap().unwrap();
    assert_eq!(inhaber.user_id, anna.id);
    assert_eq!(inhaber.username, "anna");
    assert_eq!(inhaber.status, AccountStatus::Active);
}

#[tokio::test]
async fn unbekanntes_token_ist_none() {
    let db = db().await;
    assert!(db.verify_token("gibt-es-nicht").await.unwrap().is_none());
}

#[tokio::test]
async fn abgelaufenes_token_ist_none() {
    let db = db().await;
    let bob = db.create_user("bob", AccountStatus::Active).await.unwrap();
    let sitzung = db.create_session(bob.id, Duration::seconds(-5)).await.unwrap();

    assert!(db.verify_token(&sitzung.token).await.unwrap().is_none());
}

#[tokio::test]
async fn deaktivierte_sitzung_ist_none() {
    let db = db().await;
    let bob = db.create_user("bob", AccountStatus::Active).await.unwrap();
    let sitzung = db.create_session(bob.id, Duration::hours(1)).await.unwrap();

    assert!(db.deactivate_session(&sitzung.token).await.unwrap());
    assert!(db.verify_token(&sitzung.token).await.unwrap().is_none());
}

#[tokio::test]
async fn kontostatus_wird_mitgeliefert() {
    let db = db().await;
    let carl = db.create_user("carl", AccountStatus::Active).await.unwrap();
    let sitzung = db.create_session(carl.id, Duration::hours(1)).await.unwrap();

    db.set_user_status(carl.id, AccountStatus::Suspended).await.unwrap();

    let inhaber = db.verify_token(&sitzung.token).await.unwrap().unwrap();
    assert_eq!(inhaber.status, AccountStatus::Suspended);
}

#[tokio::test]
async fn doppelter_benutzername_ist_eindeutigkeitsfehler() {
    let db = db().await;
    db.create_user("dora", AccountStatus::Active).await.unwrap();
    let err = db.create_user("dora", AccountStatus::Active).await.unwrap_err();
    assert!(err.ist_eindeutigkeit());
}
