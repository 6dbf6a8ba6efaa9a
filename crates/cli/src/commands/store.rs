//! Durable store and catalog maintenance.
//!
//! # Environment Variables
//!
//! - `LOOSEGALLERY_DATABASE_URL` - `PostgreSQL` connection string for the
//!   account tier

use std::time::Duration;

use loose_gallery_core::AccountId;
use loose_gallery_designs::store::{AccountTier, DesignStore, PgAccountTier, SessionTier};
use loose_gallery_designs::{Catalog, StaticCatalog};
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use super::{CliError, print_json};

fn database_url() -> Result<SecretString, CliError> {
    dotenvy::dotenv().ok();

    std::env::var("LOOSEGALLERY_DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| CliError::MissingEnvVar("LOOSEGALLERY_DATABASE_URL"))
}

/// Run the account tier migrations.
pub async fn migrate() -> Result<(), CliError> {
    let database_url = database_url()?;

    info!("Connecting to database...");
    let tier = PgAccountTier::connect(database_url.expose_secret()).await?;

    info!("Running migrations...");
    loose_gallery_designs::store::migrate(tier.pool()).await?;

    info!("Migrations complete!");
    Ok(())
}

/// Discard designs of one account not updated within `days`.
pub async fn reap(account: i64, days: u32) -> Result<(), CliError> {
    let database_url = database_url()?;
    let tier = PgAccountTier::connect(database_url.expose_secret()).await?;
    let store = DesignStore::new(
        SessionTier::new(Duration::from_secs(60)),
        AccountTier::Postgres(tier),
    );

    let reaped = store
        .reap_account(AccountId::new(account), chrono::Duration::days(i64::from(days)))
        .await?;

    info!(account, days, count = reaped.len(), "Reaped designs");
    print_json(&reaped)
}

/// Load a catalog file and report which products can be personalized.
pub fn catalog(path: &str) -> Result<(), CliError> {
    let json = std::fs::read_to_string(path).map_err(|e| CliError::Io(path.to_owned(), e))?;
    let catalog = StaticCatalog::from_json(&json)?;

    let customizable = catalog.customizable_products();
    info!(
        products = catalog.len(),
        customizable = customizable.len(),
        "Catalog loaded"
    );
    print_json(&customizable)
}
