//! Ephemeral tier keyed by visitor token.

use std::time::Duration;

use loose_gallery_core::VisitorToken;
use moka::future::Cache;
use moka::notification::RemovalCause;
use tracing::warn;

use super::DesignMap;

/// Default upper bound on concurrently tracked visitors.
pub const DEFAULT_MAX_VISITORS: u64 = 100_000;

/// Per-visitor design maps that expire after a period of inactivity.
#[derive(Clone)]
pub struct SessionTier {
    cache: Cache<VisitorToken, DesignMap>,
}

impl std::fmt::Debug for SessionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTier")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

impl SessionTier {
    #[must_use]
    pub fn new(time_to_idle: Duration) -> Self {
        Self::with_capacity(time_to_idle, DEFAULT_MAX_VISITORS)
    }

    /// Tier tracking at most `max_visitors` sessions.
    ///
    /// Past that bound the least valuable sessions are dropped before their
    /// idle time is up; each such eviction is logged.
    #[must_use]
    pub fn with_capacity(time_to_idle: Duration, max_visitors: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_visitors)
            .time_to_idle(time_to_idle)
            .eviction_listener(|token: std::sync::Arc<VisitorToken>, map: DesignMap, cause| {
                if cause == RemovalCause::Size {
                    warn!(
                        visitor = %token,
                        designs = map.len(),
                        "Session tier full; visitor designs evicted early"
                    );
                }
            })
            .build();
        Self { cache }
    }

    /// The visitor's map; empty when unknown or expired.
    pub async fn load(&self, token: &VisitorToken) -> DesignMap {
        self.cache.get(token).await.unwrap_or_default()
    }

    /// Replace the visitor's map. An empty map removes the entry.
    pub async fn store(&self, token: &VisitorToken, map: DesignMap) {
        if map.is_empty() {
            self.cache.invalidate(token).await;
        } else {
            self.cache.insert(token.clone(), map).await;
        }
    }

    pub async fn clear(&self, token: &VisitorToken) {
        self.cache.invalidate(token).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use loose_gallery_core::{OwnerId, ProductId, Serial};

    use super::*;
    use crate::store::DesignRecord;

    #[tokio::test]
    async fn test_store_load_clear() {
        let tier = SessionTier::new(Duration::from_secs(60));
        let token = VisitorToken::generate();
        assert!(tier.load(&token).await.is_empty());

        let mut map = DesignMap::new();
        map.insert(
            ProductId::new(1),
            DesignRecord::new(
                OwnerId::Visitor(token.clone()),
                ProductId::new(1),
                Serial::parse("DSX00001").unwrap(),
                serde_json::Map::new(),
                Utc::now(),
            ),
        );
        tier.store(&token, map.clone()).await;
        assert_eq!(tier.load(&token).await, map);

        tier.clear(&token).await;
        assert!(tier.load(&token).await.is_empty());
    }

    #[tokio::test]
    async fn test_visitors_are_isolated() {
        let tier = SessionTier::new(Duration::from_secs(60));
        let a = VisitorToken::generate();
        let b = VisitorToken::generate();

        let mut map = DesignMap::new();
        map.insert(
            ProductId::new(1),
            DesignRecord::new(
                OwnerId::Visitor(a.clone()),
                ProductId::new(1),
                Serial::parse("DSX00001").unwrap(),
                serde_json::Map::new(),
                Utc::now(),
            ),
        );
        tier.store(&a, map).await;

        assert!(tier.load(&b).await.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_bounds_tracked_visitors() {
        let tier = SessionTier::with_capacity(Duration::from_secs(60), 1);

        for n in 1..=3 {
            let token = VisitorToken::generate();
            let mut map = DesignMap::new();
            map.insert(
                ProductId::new(n),
                DesignRecord::new(
                    OwnerId::Visitor(token.clone()),
                    ProductId::new(n),
                    Serial::parse("DSX00001").unwrap(),
                    serde_json::Map::new(),
                    Utc::now(),
                ),
            );
            tier.store(&token, map).await;
        }
        tier.cache.run_pending_tasks().await;

        assert!(tier.cache.entry_count() <= 1);
    }
}
