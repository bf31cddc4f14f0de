//! Store traits for the Matching Engine
//!
//! The marketplace data store is an external collaborator; the engine only
//! needs to run a [`MatchQuery`] against a collection plus a few writes used
//! for seeding and status changes.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{ListingStatus, Requirement, RequirementStatus, VehicleListing};
use crate::query::{Collection, MatchQuery};

/// Errors that can occur in the store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Record not found: {0}")]
    NotFound(Uuid),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Reject a query addressed to another collection
pub(crate) fn expect_collection(query: &MatchQuery, expected: Collection) -> StoreResult<()> {
    if query.collection != expected {
        return Err(StoreError::InvalidQuery(format!(
            "query targets '{}' but was run against '{}'",
            query.collection.as_str(),
            expected.as_str()
        )));
    }
    Ok(())
}

/// Marketplace data store
///
/// Implementations can be in-memory, PostgreSQL, or any backend that supports
/// case-insensitive equality and substring matching.
#[async_trait]
pub trait MarketplaceStore: Send + Sync {
    // ------------------------------------------------------------------------
    // Match queries
    // ------------------------------------------------------------------------

    /// Requirements satisfying the query, in the query's order
    async fn find_requirements(&self, query: &MatchQuery) -> StoreResult<Vec<Requirement>>;

    /// Listings satisfying the query, in the query's order
    async fn find_listings(&self, query: &MatchQuery) -> StoreResult<Vec<VehicleListing>>;

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    async fn insert_listing(&self, listing: VehicleListing) -> StoreResult<VehicleListing>;

    async fn insert_requirement(&self, requirement: Requirement) -> StoreResult<Requirement>;

    async fn update_listing_status(&self, id: Uuid, status: ListingStatus) -> StoreResult<()>;

    async fn update_requirement_status(
        &self,
        id: Uuid,
        status: RequirementStatus,
    ) -> StoreResult<()>;
}
