//! Design store with an ephemeral (visitor) tier and a durable (account) tier.
//!
//! # Tiers
//!
//! - [`SessionTier`]: keyed by visitor token, expires after the configured
//!   idle time
//! - [`AccountTier`]: keyed by account id, in memory or in `PostgreSQL`
//!
//! Both tiers hold a whole [`DesignMap`] per key and are read, modified and
//! written back as a unit (last writer wins).
//!
//! # Rules
//!
//! - Every operation hydrates the session tier from the account tier first
//!   when the visitor is logged in and the session holds nothing
//! - Writes go to the session tier and, for logged-in visitors, through to
//!   the account tier
//! - On login, session records overlay account records per product

mod account;
mod postgres;
mod session;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use loose_gallery_core::{AccountId, OwnerId, ProductId, Serial, Visitor};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::api::DesignPreview;

pub use account::{AccountTier, MemoryAccountTier};
pub use postgres::{PgAccountTier, migrate};
pub use session::{DEFAULT_MAX_VISITORS, SessionTier};

/// Records per product for one owner.
pub type DesignMap = BTreeMap<ProductId, DesignRecord>;

/// Default age after which [`DesignStore::reap_age`] discards designs.
pub const DEFAULT_REAP_AGE_DAYS: i64 = 30;

/// Errors from the durable tier.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// The design a visitor currently has for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignRecord {
    pub product_id: ProductId,
    pub serial: Serial,
    pub owner: OwnerId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    /// Set once an order containing this design has been locked.
    #[serde(default)]
    pub locked: bool,
    /// Caller-supplied data (return timestamp, account id, ...).
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DesignRecord {
    /// A fresh, unlocked record without previews.
    #[must_use]
    pub fn new(
        owner: OwnerId,
        product_id: ProductId,
        serial: Serial,
        extra: serde_json::Map<String, serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            product_id,
            serial,
            owner,
            created_at: now,
            updated_at: now,
            preview_url: None,
            thumbnail_url: None,
            locked: false,
            extra,
        }
    }

    /// Cached preview URLs.
    #[must_use]
    pub fn preview(&self) -> DesignPreview {
        DesignPreview {
            preview_url: self.preview_url.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
        }
    }
}

/// Two-tier design store.
///
/// Cheap to clone; clones share both tiers.
#[derive(Debug, Clone)]
pub struct DesignStore {
    session: SessionTier,
    account: AccountTier,
}

impl DesignStore {
    #[must_use]
    pub const fn new(session: SessionTier, account: AccountTier) -> Self {
        Self { session, account }
    }

    /// Store with both tiers in memory.
    #[must_use]
    pub fn in_memory(session_ttl: std::time::Duration) -> Self {
        Self::new(
            SessionTier::new(session_ttl),
            AccountTier::Memory(MemoryAccountTier::new()),
        )
    }

    #[must_use]
    pub const fn session_tier(&self) -> &SessionTier {
        &self.session
    }

    #[must_use]
    pub const fn account_tier(&self) -> &AccountTier {
        &self.account
    }

    /// Copy the account map into an empty session.
    ///
    /// Returns the visitor's current map.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the account tier cannot be read.
    #[instrument(skip(self, visitor), fields(owner = %visitor.owner()))]
    pub async fn hydrate(&self, visitor: &Visitor) -> Result<DesignMap, StoreError> {
        let session = self.session.load(&visitor.token).await;
        let Some(account) = visitor.account else {
            return Ok(session);
        };
        if !session.is_empty() {
            return Ok(session);
        }

        let durable = self.account.load(account).await?;
        if !durable.is_empty() {
            debug!(count = durable.len(), "Hydrated session from account designs");
            self.session.store(&visitor.token, durable.clone()).await;
        }
        Ok(durable)
    }

    /// Merge session designs into the account after login.
    ///
    /// Session records win per product and are re-attributed to the account.
    /// Running it twice yields the same result. With no session designs the
    /// account map is left untouched and copied into the session.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the account tier cannot be read or written.
    #[instrument(skip(self, visitor), fields(owner = %visitor.owner()))]
    pub async fn merge_on_login(&self, visitor: &Visitor) -> Result<DesignMap, StoreError> {
        let Some(account) = visitor.account else {
            return Ok(self.session.load(&visitor.token).await);
        };

        let session = self.session.load(&visitor.token).await;
        let mut merged = self.account.load(account).await?;

        if session.is_empty() {
            self.session.store(&visitor.token, merged.clone()).await;
            return Ok(merged);
        }

        let owner = OwnerId::Account(account);
        let overlaid = session.len();
        for (product_id, mut record) in session {
            record.owner = owner.clone();
            merged.insert(product_id, record);
        }

        self.persist(visitor, &merged).await?;
        info!(
            overlaid,
            total = merged.len(),
            "Merged session designs into account"
        );
        Ok(merged)
    }

    /// Record the design a visitor saved for a product.
    ///
    /// Re-saving the same serial keeps `created_at`, cached previews and the
    /// lock flag; a different serial replaces the record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the account tier cannot be read or written.
    #[instrument(
        skip(self, visitor, product_id, serial, extra),
        fields(owner = %visitor.owner(), %product_id, %serial)
    )]
    pub async fn save(
        &self,
        visitor: &Visitor,
        product_id: ProductId,
        serial: Serial,
        extra: serde_json::Map<String, serde_json::Value>,
    ) -> Result<DesignRecord, StoreError> {
        let mut map = self.hydrate(visitor).await?;
        let now = Utc::now();

        let record = match map.remove(&product_id) {
            Some(mut existing) if existing.serial == serial => {
                existing.owner = visitor.owner();
                existing.updated_at = now;
                existing.extra = extra;
                existing
            }
            _ => DesignRecord::new(visitor.owner(), product_id, serial, extra, now),
        };

        map.insert(product_id, record.clone());
        self.persist(visitor, &map).await?;
        Ok(record)
    }

    /// The visitor's design for a product.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the account tier cannot be read.
    pub async fn get(
        &self,
        visitor: &Visitor,
        product_id: ProductId,
    ) -> Result<Option<DesignRecord>, StoreError> {
        Ok(self.hydrate(visitor).await?.remove(&product_id))
    }

    /// Whether the visitor has a design for a product.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the account tier cannot be read.
    pub async fn has_design(
        &self,
        visitor: &Visitor,
        product_id: ProductId,
    ) -> Result<bool, StoreError> {
        Ok(self.hydrate(visitor).await?.contains_key(&product_id))
    }

    /// Time since the design for a product was first saved.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the account tier cannot be read.
    pub async fn design_age(
        &self,
        visitor: &Visitor,
        product_id: ProductId,
    ) -> Result<Option<Duration>, StoreError> {
        Ok(self
            .get(visitor, product_id)
            .await?
            .map(|record| Utc::now() - record.created_at))
    }

    /// All of the visitor's designs, ordered by product id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the account tier cannot be read.
    pub async fn list_all(&self, visitor: &Visitor) -> Result<Vec<DesignRecord>, StoreError> {
        Ok(self.hydrate(visitor).await?.into_values().collect())
    }

    /// Forget the design for a product.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the account tier cannot be read or written.
    #[instrument(skip(self, visitor, product_id), fields(owner = %visitor.owner(), %product_id))]
    pub async fn remove(
        &self,
        visitor: &Visitor,
        product_id: ProductId,
    ) -> Result<Option<DesignRecord>, StoreError> {
        let mut map = self.hydrate(visitor).await?;
        let removed = map.remove(&product_id);
        if removed.is_some() {
            self.persist(visitor, &map).await?;
        }
        Ok(removed)
    }

    /// Cache preview URLs on the record, if it still holds `serial`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the account tier cannot be read or written.
    pub async fn attach_preview(
        &self,
        visitor: &Visitor,
        product_id: ProductId,
        serial: &Serial,
        preview: &DesignPreview,
    ) -> Result<Option<DesignRecord>, StoreError> {
        self.update_matching(visitor, product_id, serial, |record| {
            record.preview_url.clone_from(&preview.preview_url);
            record.thumbnail_url.clone_from(&preview.thumbnail_url);
        })
        .await
    }

    /// Flag the record as locked, if it still holds `serial`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the account tier cannot be read or written.
    pub async fn mark_locked(
        &self,
        visitor: &Visitor,
        product_id: ProductId,
        serial: &Serial,
    ) -> Result<bool, StoreError> {
        Ok(self
            .update_matching(visitor, product_id, serial, |record| record.locked = true)
            .await?
            .is_some())
    }

    /// Discard designs not updated within `max_age`, in both tiers.
    ///
    /// Returns how many products lost their design.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the account tier cannot be read or written.
    #[instrument(
        skip(self, visitor, max_age),
        fields(owner = %visitor.owner(), max_age_days = max_age.num_days())
    )]
    pub async fn reap_age(&self, visitor: &Visitor, max_age: Duration) -> Result<usize, StoreError> {
        let cutoff = Utc::now() - max_age;
        let mut reaped = BTreeSet::new();

        let mut session = self.session.load(&visitor.token).await;
        reaped.extend(retain_newer(&mut session, cutoff));
        self.session.store(&visitor.token, session).await;

        if let Some(account) = visitor.account {
            reaped.extend(self.reap_account(account, max_age).await?);
        }

        if !reaped.is_empty() {
            info!(count = reaped.len(), "Reaped old designs");
        }
        Ok(reaped.len())
    }

    /// Discard an account's designs not updated within `max_age`.
    ///
    /// Returns the affected product ids.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the account tier cannot be read or written.
    pub async fn reap_account(
        &self,
        account: AccountId,
        max_age: Duration,
    ) -> Result<Vec<ProductId>, StoreError> {
        let cutoff = Utc::now() - max_age;
        let mut durable = self.account.load(account).await?;
        let reaped = retain_newer(&mut durable, cutoff);
        if !reaped.is_empty() {
            self.account.store(account, &durable).await?;
        }
        Ok(reaped)
    }

    /// Forget every design of the visitor, in both tiers.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the account tier cannot be written.
    pub async fn clear_all(&self, visitor: &Visitor) -> Result<(), StoreError> {
        self.session.clear(&visitor.token).await;
        if let Some(account) = visitor.account {
            self.account.clear(account).await?;
        }
        Ok(())
    }

    async fn update_matching<F>(
        &self,
        visitor: &Visitor,
        product_id: ProductId,
        serial: &Serial,
        update: F,
    ) -> Result<Option<DesignRecord>, StoreError>
    where
        F: FnOnce(&mut DesignRecord),
    {
        let mut map = self.hydrate(visitor).await?;
        let Some(record) = map
            .get_mut(&product_id)
            .filter(|record| &record.serial == serial)
        else {
            return Ok(None);
        };

        update(record);
        record.updated_at = Utc::now();
        let updated = record.clone();

        self.persist(visitor, &map).await?;
        Ok(Some(updated))
    }

    /// Write the session map, and through to the account when logged in.
    async fn persist(&self, visitor: &Visitor, map: &DesignMap) -> Result<(), StoreError> {
        self.session.store(&visitor.token, map.clone()).await;
        if let Some(account) = visitor.account {
            self.account.store(account, map).await?;
        }
        Ok(())
    }
}

fn retain_newer(map: &mut DesignMap, cutoff: DateTime<Utc>) -> Vec<ProductId> {
    let stale: Vec<ProductId> = map
        .iter()
        .filter(|(_, record)| record.updated_at < cutoff)
        .map(|(product_id, _)| *product_id)
        .collect();
    for product_id in &stale {
        map.remove(product_id);
    }
    stale
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use loose_gallery_core::VisitorToken;

    use super::*;

    fn store() -> DesignStore {
        DesignStore::in_memory(std::time::Duration::from_secs(3600))
    }

    fn serial(s: &str) -> Serial {
        Serial::parse(s).unwrap()
    }

    fn extra() -> serde_json::Map<String, serde_json::Value> {
        serde_json::Map::new()
    }

    fn record(owner: &OwnerId, product: i64, s: &str) -> DesignRecord {
        DesignRecord::new(
            owner.clone(),
            ProductId::new(product),
            serial(s),
            extra(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_save_then_save_overwrites() {
        let store = store();
        let visitor = Visitor::anonymous(VisitorToken::generate());
        let product = ProductId::new(42);

        store
            .save(&visitor, product, serial("DSX00001"), extra())
            .await
            .unwrap();
        store
            .save(&visitor, product, serial("DSX00002"), extra())
            .await
            .unwrap();

        let record = store.get(&visitor, product).await.unwrap().unwrap();
        assert_eq!(record.serial.as_str(), "DSX00002");
        assert_eq!(store.list_all(&visitor).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resave_same_serial_keeps_created_at_and_previews() {
        let store = store();
        let visitor = Visitor::anonymous(VisitorToken::generate());
        let product = ProductId::new(42);
        let s = serial("DSX123456");

        let first = store
            .save(&visitor, product, s.clone(), extra())
            .await
            .unwrap();
        store
            .attach_preview(
                &visitor,
                product,
                &s,
                &DesignPreview {
                    preview_url: Some("https://cdn.example/p.png".to_string()),
                    thumbnail_url: None,
                },
            )
            .await
            .unwrap();
        let second = store.save(&visitor, product, s, extra()).await.unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(
            second.preview_url.as_deref(),
            Some("https://cdn.example/p.png")
        );
    }

    #[tokio::test]
    async fn test_attach_preview_ignores_stale_serial() {
        let store = store();
        let visitor = Visitor::anonymous(VisitorToken::generate());
        let product = ProductId::new(1);

        store
            .save(&visitor, product, serial("DSX00002"), extra())
            .await
            .unwrap();
        let updated = store
            .attach_preview(&visitor, product, &serial("DSX00001"), &DesignPreview::default())
            .await
            .unwrap();
        assert!(updated.is_none());
    }

    #[tokio::test]
    async fn test_authenticated_writes_go_through_to_account() {
        let store = store();
        let account = AccountId::new(7);
        let visitor = Visitor::authenticated(VisitorToken::generate(), account);

        store
            .save(&visitor, ProductId::new(1), serial("DSX00001"), extra())
            .await
            .unwrap();

        let durable = store.account_tier().load(account).await.unwrap();
        assert_eq!(durable.len(), 1);
        assert_eq!(durable[&ProductId::new(1)].owner, OwnerId::Account(account));
    }

    #[tokio::test]
    async fn test_hydrate_copies_account_into_empty_session() {
        let store = store();
        let account = AccountId::new(7);
        let owner = OwnerId::Account(account);
        let mut durable = DesignMap::new();
        durable.insert(ProductId::new(5), record(&owner, 5, "DSX00005"));
        store.account_tier().store(account, &durable).await.unwrap();

        // New browser session for the same account
        let visitor = Visitor::authenticated(VisitorToken::generate(), account);
        assert!(store.session_tier().load(&visitor.token).await.is_empty());

        let found = store.get(&visitor, ProductId::new(5)).await.unwrap();
        assert!(found.is_some());
        assert_eq!(store.session_tier().load(&visitor.token).await.len(), 1);
    }

    #[tokio::test]
    async fn test_merge_is_right_biased() {
        let store = store();
        let account = AccountId::new(9);
        let token = VisitorToken::generate();
        let account_owner = OwnerId::Account(account);
        let visitor_owner = OwnerId::Visitor(token.clone());

        let mut durable = DesignMap::new();
        durable.insert(ProductId::new(1), record(&account_owner, 1, "AAAAA1"));
        store.account_tier().store(account, &durable).await.unwrap();

        let mut session = DesignMap::new();
        session.insert(ProductId::new(1), record(&visitor_owner, 1, "BBBBB1"));
        session.insert(ProductId::new(2), record(&visitor_owner, 2, "CCCCC2"));
        store.session_tier().store(&token, session).await;

        let visitor = Visitor::authenticated(token, account);
        let merged = store.merge_on_login(&visitor).await.unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[&ProductId::new(1)].serial.as_str(), "BBBBB1");
        assert_eq!(merged[&ProductId::new(2)].serial.as_str(), "CCCCC2");
        assert!(merged.values().all(|r| r.owner == account_owner));

        let durable = store.account_tier().load(account).await.unwrap();
        assert_eq!(durable, merged);
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let store = store();
        let account = AccountId::new(3);
        let token = VisitorToken::generate();
        let anonymous = Visitor::anonymous(token.clone());

        store
            .save(&anonymous, ProductId::new(1), serial("DSX00001"), extra())
            .await
            .unwrap();

        let visitor = Visitor::authenticated(token, account);
        let once = store.merge_on_login(&visitor).await.unwrap();
        let twice = store.merge_on_login(&visitor).await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(store.account_tier().load(account).await.unwrap(), once);
    }

    #[tokio::test]
    async fn test_merge_with_empty_session_keeps_account() {
        let store = store();
        let account = AccountId::new(4);
        let owner = OwnerId::Account(account);
        let mut durable = DesignMap::new();
        durable.insert(ProductId::new(8), record(&owner, 8, "DSX00008"));
        store.account_tier().store(account, &durable).await.unwrap();

        let visitor = Visitor::authenticated(VisitorToken::generate(), account);
        let merged = store.merge_on_login(&visitor).await.unwrap();

        assert_eq!(merged, durable);
        assert_eq!(store.session_tier().load(&visitor.token).await, durable);
    }

    #[tokio::test]
    async fn test_remove_and_has_design() {
        let store = store();
        let visitor = Visitor::anonymous(VisitorToken::generate());
        let product = ProductId::new(42);

        store
            .save(&visitor, product, serial("DSX123456"), extra())
            .await
            .unwrap();
        assert!(store.has_design(&visitor, product).await.unwrap());
        assert!(store.design_age(&visitor, product).await.unwrap().is_some());

        let removed = store.remove(&visitor, product).await.unwrap();
        assert!(removed.is_some());
        assert!(!store.has_design(&visitor, product).await.unwrap());
        assert!(store.remove(&visitor, product).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_locked_only_matching_serial() {
        let store = store();
        let visitor = Visitor::anonymous(VisitorToken::generate());
        let product = ProductId::new(42);

        store
            .save(&visitor, product, serial("DSX123456"), extra())
            .await
            .unwrap();

        assert!(!store.mark_locked(&visitor, product, &serial("OTHER1")).await.unwrap());
        assert!(store.mark_locked(&visitor, product, &serial("DSX123456")).await.unwrap());
        assert!(store.get(&visitor, product).await.unwrap().unwrap().locked);
    }

    #[tokio::test]
    async fn test_reap_removes_stale_records_from_both_tiers() {
        let store = store();
        let account = AccountId::new(11);
        let visitor = Visitor::authenticated(VisitorToken::generate(), account);
        let owner = visitor.owner();

        let mut stale = record(&owner, 1, "OLD0001");
        stale.updated_at = Utc::now() - Duration::days(45);
        let fresh = record(&owner, 2, "NEW0002");

        let mut map = DesignMap::new();
        map.insert(stale.product_id, stale);
        map.insert(fresh.product_id, fresh);
        store.session_tier().store(&visitor.token, map.clone()).await;
        store.account_tier().store(account, &map).await.unwrap();

        let reaped = store
            .reap_age(&visitor, Duration::days(DEFAULT_REAP_AGE_DAYS))
            .await
            .unwrap();

        assert_eq!(reaped, 1);
        let remaining = store.list_all(&visitor).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].serial.as_str(), "NEW0002");
        assert_eq!(store.account_tier().load(account).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let store = store();
        let account = AccountId::new(12);
        let visitor = Visitor::authenticated(VisitorToken::generate(), account);

        store
            .save(&visitor, ProductId::new(1), serial("DSX00001"), extra())
            .await
            .unwrap();
        store.clear_all(&visitor).await.unwrap();

        assert!(store.list_all(&visitor).await.unwrap().is_empty());
        assert!(store.account_tier().load(account).await.unwrap().is_empty());
    }

    #[test]
    fn test_record_serde_defaults() {
        let json = r#"{
            "product_id": 42,
            "serial": "DSX123456",
            "owner": {"kind": "account", "id": 7},
            "created_at": "2026-03-01T10:00:00Z",
            "updated_at": "2026-03-01T10:00:00Z"
        }"#;
        let record: DesignRecord = serde_json::from_str(json).unwrap();
        assert!(!record.locked);
        assert!(record.extra.is_empty());
        assert!(record.preview().is_empty());
    }
}
