//! In-memory store implementation for the Matching Engine

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{ListingStatus, Requirement, RequirementStatus, VehicleListing};
use crate::query::{Collection, MatchQuery};
use crate::store::traits::{expect_collection, MarketplaceStore, StoreError, StoreResult};

/// In-memory marketplace store
///
/// Fast but non-persistent. Used by tests, the CLI seed loader and
/// deployments with `store.type: memory`.
#[derive(Default)]
pub struct InMemoryMarketplaceStore {
    listings: RwLock<HashMap<Uuid, VehicleListing>>,
    requirements: RwLock<HashMap<Uuid, Requirement>>,
}

impl InMemoryMarketplaceStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with fixtures
    pub fn seeded(listings: Vec<VehicleListing>, requirements: Vec<Requirement>) -> Self {
        let store = Self::new();
        store.seed(listings, requirements);
        store
    }

    /// Bulk-load records, replacing any with the same id
    pub fn seed(&self, listings: Vec<VehicleListing>, requirements: Vec<Requirement>) {
        let (listing_count, requirement_count) = (listings.len(), requirements.len());
        {
            let mut map = self.listings.write();
            map.extend(listings.into_iter().map(|l| (l.id, l)));
        }
        {
            let mut map = self.requirements.write();
            map.extend(requirements.into_iter().map(|r| (r.id, r)));
        }
        info!(
            listings = listing_count,
            requirements = requirement_count,
            "Seeded in-memory marketplace store"
        );
    }

    pub fn listing_count(&self) -> usize {
        self.listings.read().len()
    }

    pub fn requirement_count(&self) -> usize {
        self.requirements.read().len()
    }
}

#[async_trait]
impl MarketplaceStore for InMemoryMarketplaceStore {
    async fn find_requirements(&self, query: &MatchQuery) -> StoreResult<Vec<Requirement>> {
        expect_collection(query, Collection::Requirements)?;

        let mut found = {
            let map = self.requirements.read();
            query.apply(map.values())
        };
        // HashMap iteration is unordered; keep equal timestamps stable
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        debug!(results = found.len(), "Requirement query served from memory");
        Ok(found)
    }

    async fn find_listings(&self, query: &MatchQuery) -> StoreResult<Vec<VehicleListing>> {
        expect_collection(query, Collection::Listings)?;

        let mut found = {
            let map = self.listings.read();
            query.apply(map.values())
        };
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        debug!(results = found.len(), "Listing query served from memory");
        Ok(found)
    }

    async fn insert_listing(&self, listing: VehicleListing) -> StoreResult<VehicleListing> {
        self.listings.write().insert(listing.id, listing.clone());
        info!(listing_id = %listing.id, make = %listing.make, model = %listing.model, "Listing inserted");
        Ok(listing)
    }

    async fn insert_requirement(&self, requirement: Requirement) -> StoreResult<Requirement> {
        self.requirements
            .write()
            .insert(requirement.id, requirement.clone());
        info!(requirement_id = %requirement.id, "Requirement inserted");
        Ok(requirement)
    }

    async fn update_listing_status(&self, id: Uuid, status: ListingStatus) -> StoreResult<()> {
        let mut map = self.listings.write();
        let listing = map.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        listing.status = status;
        info!(listing_id = %id, status = %status, "Listing status updated");
        Ok(())
    }

    async fn update_requirement_status(
        &self,
        id: Uuid,
        status: RequirementStatus,
    ) -> StoreResult<()> {
        let mut map = self.requirements.write();
        let requirement = map.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        requirement.status = status;
        info!(requirement_id = %id, status = %status, "Requirement status updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RequirementCriteria, VehicleCriteria, VehicleType};
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};

    fn store_with_innova_buyers() -> (InMemoryMarketplaceStore, Uuid, Uuid) {
        let now = Utc::now();
        let older = Requirement::new(VehicleType::Car, "b1")
            .with_make("Toyota")
            .with_model("Innova")
            .with_created_at(now - Duration::hours(3));
        let newer = Requirement::new(VehicleType::Car, "b2")
            .with_make("toyota")
            .with_model("INNOVA")
            .with_created_at(now);
        let (older_id, newer_id) = (older.id, newer.id);
        let store = InMemoryMarketplaceStore::seeded(Vec::new(), vec![older, newer]);
        (store, older_id, newer_id)
    }

    #[tokio::test]
    async fn test_find_requirements_newest_first() {
        let (store, older_id, newer_id) = store_with_innova_buyers();
        let vehicle = VehicleCriteria::new(VehicleType::Car, "Toyota", "Innova", 2021);

        let found = store
            .find_requirements(&MatchQuery::vehicle_to_requirement(&vehicle))
            .await
            .unwrap();
        let ids: Vec<Uuid> = found.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![newer_id, older_id]);
    }

    #[tokio::test]
    async fn test_wrong_collection_is_rejected() {
        let store = InMemoryMarketplaceStore::new();
        let query = MatchQuery::requirement_to_vehicle(&RequirementCriteria::new(VehicleType::Car));
        assert_matches!(
            store.find_requirements(&query).await,
            Err(StoreError::InvalidQuery(_))
        );
    }

    #[tokio::test]
    async fn test_status_update_changes_matchability() {
        let listing = VehicleListing::new(VehicleType::Bike, "Royal Enfield", "Classic 350", 2022, 1, "s");
        let id = listing.id;
        let store = InMemoryMarketplaceStore::new();
        store.insert_listing(listing).await.unwrap();

        let query = MatchQuery::requirement_to_vehicle(
            &RequirementCriteria::new(VehicleType::Bike).with_make("royal"),
        );
        assert!(store.find_listings(&query).await.unwrap().is_empty());

        store.update_listing_status(id, ListingStatus::Active).await.unwrap();
        assert_eq!(store.find_listings(&query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let store = InMemoryMarketplaceStore::new();
        let id = Uuid::new_v4();
        assert_matches!(
            store.update_requirement_status(id, RequirementStatus::Closed).await,
            Err(StoreError::NotFound(missing)) if missing == id
        );
    }

    #[test]
    fn test_seed_replaces_same_id() {
        let req = Requirement::new(VehicleType::Car, "b1");
        let store = InMemoryMarketplaceStore::seeded(Vec::new(), vec![req.clone()]);
        store.seed(Vec::new(), vec![req.with_status(RequirementStatus::Closed)]);
        assert_eq!(store.requirement_count(), 1);
        assert_eq!(store.listing_count(), 0);
    }
}
