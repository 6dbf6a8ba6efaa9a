//! `PostgreSQL` account tier.
//!
//! One row per account in `designs.account_designs`, holding the account's
//! records as a JSONB array.

use loose_gallery_core::AccountId;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::{debug, info, instrument};

use super::{DesignMap, DesignRecord, StoreError};

/// Account tier backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgAccountTier {
    pool: PgPool,
}

impl PgAccountTier {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the database.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the connection fails.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Load an account's records.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn load(&self, account: AccountId) -> Result<DesignMap, StoreError> {
        let row: Option<(Json<Vec<DesignRecord>>,)> = sqlx::query_as(
            r"
            SELECT designs FROM designs.account_designs
            WHERE account_id = $1
            ",
        )
        .bind(account)
        .fetch_optional(&self.pool)
        .await?;

        let map: DesignMap = row
            .map(|(Json(records),)| records)
            .unwrap_or_default()
            .into_iter()
            .map(|record| (record.product_id, record))
            .collect();

        debug!(count = map.len(), "Loaded account designs");
        Ok(map)
    }

    /// Replace an account's records. An empty map deletes the row.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the write fails.
    #[instrument(skip(self, map), fields(count = map.len()))]
    pub async fn store(&self, account: AccountId, map: &DesignMap) -> Result<(), StoreError> {
        if map.is_empty() {
            return self.clear(account).await;
        }

        let records: Vec<&DesignRecord> = map.values().collect();
        sqlx::query::<sqlx::Postgres>(
            r"
            INSERT INTO designs.account_designs (account_id, designs, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (account_id)
            DO UPDATE SET designs = EXCLUDED.designs, updated_at = now()
            ",
        )
        .bind(account)
        .bind(Json(records))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete an account's row.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the delete fails.
    #[instrument(skip(self))]
    pub async fn clear(&self, account: AccountId) -> Result<(), StoreError> {
        sqlx::query::<sqlx::Postgres>("DELETE FROM designs.account_designs WHERE account_id = $1")
            .bind(account)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Apply the embedded migrations.
///
/// # Errors
///
/// Returns `StoreError::Migration` if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    info!("Running design store migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Design store migrations complete");
    Ok(())
}
