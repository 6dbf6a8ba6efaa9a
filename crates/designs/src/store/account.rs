//! Durable tier keyed by account id.

use std::collections::HashMap;
use std::sync::Arc;

use loose_gallery_core::AccountId;
use tokio::sync::RwLock;

use super::{DesignMap, PgAccountTier, StoreError};

/// In-process account tier.
#[derive(Debug, Clone, Default)]
pub struct MemoryAccountTier {
    maps: Arc<RwLock<HashMap<AccountId, DesignMap>>>,
}

impl MemoryAccountTier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load(&self, account: AccountId) -> DesignMap {
        self.maps
            .read()
            .await
            .get(&account)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn store(&self, account: AccountId, map: &DesignMap) {
        let mut maps = self.maps.write().await;
        if map.is_empty() {
            maps.remove(&account);
        } else {
            maps.insert(account, map.clone());
        }
    }

    pub async fn clear(&self, account: AccountId) {
        self.maps.write().await.remove(&account);
    }
}

/// Durable tier backend.
#[derive(Debug, Clone)]
pub enum AccountTier {
    Memory(MemoryAccountTier),
    Postgres(PgAccountTier),
}

impl AccountTier {
    /// The account's map; empty when unknown.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the database cannot be read.
    pub async fn load(&self, account: AccountId) -> Result<DesignMap, StoreError> {
        match self {
            Self::Memory(tier) => Ok(tier.load(account).await),
            Self::Postgres(tier) => tier.load(account).await,
        }
    }

    /// Replace the account's map.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the database cannot be written.
    pub async fn store(&self, account: AccountId, map: &DesignMap) -> Result<(), StoreError> {
        match self {
            Self::Memory(tier) => {
                tier.store(account, map).await;
                Ok(())
            }
            Self::Postgres(tier) => tier.store(account, map).await,
        }
    }

    /// Forget all of the account's designs.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the database cannot be written.
    pub async fn clear(&self, account: AccountId) -> Result<(), StoreError> {
        match self {
            Self::Memory(tier) => {
                tier.clear(account).await;
                Ok(())
            }
            Self::Postgres(tier) => tier.clear(account).await,
        }
    }
}
