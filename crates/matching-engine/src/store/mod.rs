//! Store module for the Matching Engine
//!
//! This module provides the marketplace store trait and implementations.

mod memory;
#[cfg(feature = "postgres")]
mod postgres;
mod traits;

pub use memory::InMemoryMarketplaceStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresMarketplaceStore;
pub use traits::*;

use std::sync::Arc;
use tracing::info;

/// Store type selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreType {
    /// In-memory store (fast, non-persistent)
    InMemory,
    /// PostgreSQL store (persistent)
    Postgres,
}

impl StoreType {
    /// Parse store type from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "inmemory" | "in_memory" | "memory" => Some(StoreType::InMemory),
            "postgres" | "postgresql" => Some(StoreType::Postgres),
            _ => None,
        }
    }
}

/// Create a store from the `store` config section
pub async fn create_store_from_config(
    config: &config::StoreConfig,
) -> StoreResult<Arc<dyn MarketplaceStore>> {
    let store_type = StoreType::parse(&config.store_type).ok_or_else(|| {
        StoreError::InvalidQuery(format!("unknown store type '{}'", config.store_type))
    })?;

    match store_type {
        StoreType::InMemory => {
            info!("Creating in-memory marketplace store");
            Ok(Arc::new(InMemoryMarketplaceStore::new()))
        }
        StoreType::Postgres => create_postgres_store(config).await,
    }
}

#[cfg(feature = "postgres")]
async fn create_postgres_store(
    config: &config::StoreConfig,
) -> StoreResult<Arc<dyn MarketplaceStore>> {
    let pg = config.postgres.as_ref().ok_or_else(|| {
        StoreError::Unavailable("postgres config required for postgres store".to_string())
    })?;
    info!("Creating PostgreSQL marketplace store");
    let store = PostgresMarketplaceStore::connect(pg).await?;
    store.ensure_schema().await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgres"))]
async fn create_postgres_store(
    _config: &config::StoreConfig,
) -> StoreResult<Arc<dyn MarketplaceStore>> {
    Err(StoreError::Unavailable(
        "postgres store requested but the 'postgres' feature is not enabled".to_string(),
    ))
}
