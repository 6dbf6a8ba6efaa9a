//! `PostgreSQL` account tier.
//!
//! These tests require a running `PostgreSQL` database reachable through
//! `LOOSEGALLERY_DATABASE_URL`. Each test uses its own account id.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use loose_gallery_core::{AccountId, ProductId, Visitor, VisitorToken};
use loose_gallery_designs::store::{AccountTier, DesignStore, PgAccountTier, SessionTier, migrate};
use loose_gallery_integration_tests::{POSTER, serial};

async fn tier() -> PgAccountTier {
    let url = std::env::var("LOOSEGALLERY_DATABASE_URL")
        .expect("LOOSEGALLERY_DATABASE_URL must be set for database tests");
    let tier = PgAccountTier::connect(&url).await.unwrap();
    migrate(tier.pool()).await.unwrap();
    tier
}

/// Account id unlikely to collide between runs.
fn fresh_account() -> AccountId {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    AccountId::new(nanos.rem_euclid(1_000_000_000))
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (LOOSEGALLERY_DATABASE_URL)"]
async fn test_designs_round_trip_through_database() {
    let tier = tier().await;
    let account = fresh_account();
    let store = DesignStore::new(
        SessionTier::new(Duration::from_secs(60)),
        AccountTier::Postgres(tier.clone()),
    );

    let visitor = Visitor::authenticated(VisitorToken::generate(), account);
    let saved = store
        .save(
            &visitor,
            POSTER,
            serial("DSX123456"),
            serde_json::Map::new(),
        )
        .await
        .unwrap();

    let durable = tier.load(account).await.unwrap();
    assert_eq!(durable.get(&POSTER), Some(&saved));

    // A new session sees the same design.
    let other = Visitor::authenticated(VisitorToken::generate(), account);
    assert_eq!(store.get(&other, POSTER).await.unwrap(), Some(saved));

    store.remove(&other, POSTER).await.unwrap();
    assert!(tier.load(account).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (LOOSEGALLERY_DATABASE_URL)"]
async fn test_reap_account_in_database() {
    let tier = tier().await;
    let account = fresh_account();
    let store = DesignStore::new(
        SessionTier::new(Duration::from_secs(60)),
        AccountTier::Postgres(tier.clone()),
    );

    let visitor = Visitor::authenticated(VisitorToken::generate(), account);
    store
        .save(&visitor, ProductId::new(1), serial("AAAAA1"), serde_json::Map::new())
        .await
        .unwrap();

    let reaped = store
        .reap_account(account, chrono::Duration::seconds(-1))
        .await
        .unwrap();
    assert_eq!(reaped, vec![ProductId::new(1)]);
    assert!(tier.load(account).await.unwrap().is_empty());
}
