//! Core Matching Engine
//!
//! Runs match queries against the marketplace store and keeps the last
//! result set for its page context.
//!
//! Failure model: a store error is logged, counted, and reported to the
//! caller as "no matches". Nothing here returns an error past the public
//! `check_*` methods.

use observability::{MatchingMetrics, QueryDirection};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::{Matches, Requirement, RequirementCriteria, VehicleCriteria, VehicleListing};
use crate::error::{MatchingError, MatchingResult};
use crate::metrics::{EngineStats, StatsSnapshot};
use crate::query::MatchQuery;
use crate::store::{MarketplaceStore, StoreResult};

/// Matching engine for one page context
///
/// Each page context owns its engine; there is no shared match cache, so the
/// only ordering rule is that the last completed check wins.
pub struct MatchingEngine {
    store: Arc<dyn MarketplaceStore>,
    /// Last result set, replaced on every check
    matches: RwLock<Matches>,
    /// Queries currently awaiting the store
    in_flight: AtomicUsize,
    disposed: AtomicBool,
    stats: EngineStats,
    metrics: MatchingMetrics,
}

/// Keeps the loading flag raised while alive
struct LoadingGuard<'a> {
    in_flight: &'a AtomicUsize,
}

impl<'a> LoadingGuard<'a> {
    fn new(in_flight: &'a AtomicUsize) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self { in_flight }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MatchingEngine {
    /// Create an engine over the given store
    pub fn new(store: Arc<dyn MarketplaceStore>) -> Self {
        Self {
            store,
            matches: RwLock::new(Matches::None),
            in_flight: AtomicUsize::new(0),
            disposed: AtomicBool::new(false),
            stats: EngineStats::new(),
            metrics: MatchingMetrics::new(),
        }
    }

    // ========================================================================
    // Match checks
    // ========================================================================

    /// Open requirements with the vehicle's type, make and model
    pub async fn check_vehicle_matches(&self, vehicle: &VehicleCriteria) -> Vec<Requirement> {
        let _loading = LoadingGuard::new(&self.in_flight);
        let query = MatchQuery::vehicle_to_requirement(vehicle);
        let result = self
            .run(
                QueryDirection::VehicleToRequirement,
                self.store.find_requirements(&query),
            )
            .await;
        self.settle(QueryDirection::VehicleToRequirement, result, Matches::Requirements)
    }

    /// Active listings plausibly satisfying the requirement
    pub async fn check_requirement_matches(
        &self,
        requirement: &RequirementCriteria,
    ) -> Vec<VehicleListing> {
        let _loading = LoadingGuard::new(&self.in_flight);
        let query = MatchQuery::requirement_to_vehicle(requirement);
        let result = self
            .run(
                QueryDirection::RequirementToVehicle,
                self.store.find_listings(&query),
            )
            .await;
        self.settle(QueryDirection::RequirementToVehicle, result, Matches::Listings)
    }

    /// Exact match first; make-only fallback when the exact stage is empty.
    ///
    /// A failed exact stage counts as empty, so the fallback still runs.
    pub async fn check_partial_matches(&self, vehicle: &VehicleCriteria) -> Vec<Requirement> {
        let _loading = LoadingGuard::new(&self.in_flight);

        let exact = self.check_vehicle_matches(vehicle).await;
        if !exact.is_empty() {
            self.stats.exact_hits.increment();
            debug!(results = exact.len(), "Exact stage matched, skipping fallback");
            return exact;
        }
        if self.is_disposed() {
            return Vec::new();
        }

        self.stats.partial_fallbacks.increment();
        info!(
            make = %vehicle.make,
            model = %vehicle.model,
            "No exact matches, falling back to make-only"
        );

        let query = MatchQuery::vehicle_to_requirement_partial(vehicle);
        let result = self
            .run(
                QueryDirection::VehicleToRequirementPartial,
                self.store.find_requirements(&query),
            )
            .await;
        self.settle(
            QueryDirection::VehicleToRequirementPartial,
            result,
            Matches::Requirements,
        )
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Clone of the last result set
    pub fn matches(&self) -> Matches {
        self.matches.read().clone()
    }

    /// True only while a query is in flight
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Tear down: results arriving after this are discarded
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            debug!("Matching engine disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Await one store round trip, timing and counting it
    async fn run<T, F>(&self, direction: QueryDirection, query: F) -> MatchingResult<Vec<T>>
    where
        F: Future<Output = StoreResult<Vec<T>>>,
    {
        let started = Instant::now();
        let result = query.await;
        let elapsed = started.elapsed();
        self.stats.record_query(elapsed);

        match &result {
            Ok(found) => self.metrics.record_query(direction, elapsed, found.len()),
            Err(_) => {
                self.stats.record_failure();
                self.metrics.record_query_failure(direction);
            }
        }

        if self.is_disposed() {
            return Err(MatchingError::Disposed);
        }
        result.map_err(MatchingError::from)
    }

    /// Adapt an internal result to the public contract and publish it
    fn settle<T: Clone>(
        &self,
        direction: QueryDirection,
        result: MatchingResult<Vec<T>>,
        wrap: fn(Vec<T>) -> Matches,
    ) -> Vec<T> {
        match result {
            Ok(found) => {
                debug!(direction = direction.as_str(), results = found.len(), "Match check complete");
                *self.matches.write() = wrap(found.clone());
                found
            }
            Err(MatchingError::Disposed) => {
                self.stats.results_discarded.increment();
                debug!(direction = direction.as_str(), "Discarding result for disposed engine");
                Vec::new()
            }
            Err(e) => {
                warn!(
                    direction = direction.as_str(),
                    error = %e,
                    "Match query failed, treating as no matches"
                );
                *self.matches.write() = wrap(Vec::new());
                Vec::new()
            }
        }
    }
}
