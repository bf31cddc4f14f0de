use std::sync::Arc;
use tracing::{debug, warn};

use super::{KeyValueStore, MatchSignature};
use crate::domain::VehicleCriteria;

/// Key of the single pending-match slot
pub const PENDING_VEHICLE_MATCH_KEY: &str = "pending-vehicle-match";

const DISMISSED_MARKER: &str = "true";

/// Pending-match slot and dismissal flags over a profile store
///
/// Every operation degrades on storage failure: reads report "absent",
/// writes become no-ops. Failures are logged, never returned.
#[derive(Clone)]
pub struct PendingMatchPersistence {
    store: Arc<dyn KeyValueStore>,
}

impl PendingMatchPersistence {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Overwrite the slot; only one pending match is tracked at a time
    pub fn set_pending_vehicle_match(&self, criteria: &VehicleCriteria) {
        let value = match serde_json::to_string(criteria) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Failed to encode pending match");
                return;
            }
        };
        match self.store.set_item(PENDING_VEHICLE_MATCH_KEY, &value) {
            Ok(()) => debug!(make = %criteria.make, model = %criteria.model, "Pending match saved"),
            Err(e) => warn!(error = %e, "Failed to save pending match"),
        }
    }

    /// Read the slot.
    ///
    /// An unparseable entry, or one missing any of make, model, year or
    /// vehicle type, is deleted and reported as absent.
    pub fn get_pending_vehicle_match(&self) -> Option<VehicleCriteria> {
        let raw = match self.store.get_item(PENDING_VEHICLE_MATCH_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Failed to read pending match");
                return None;
            }
        };

        match serde_json::from_str::<VehicleCriteria>(&raw) {
            Ok(criteria) if criteria.is_complete() => Some(criteria),
            Ok(_) => {
                warn!("Pending match is missing required fields, discarding");
                self.clear_pending_vehicle_match();
                None
            }
            Err(e) => {
                warn!(error = %e, "Pending match is corrupt, discarding");
                self.clear_pending_vehicle_match();
                None
            }
        }
    }

    pub fn clear_pending_vehicle_match(&self) {
        if let Err(e) = self.store.remove_item(PENDING_VEHICLE_MATCH_KEY) {
            warn!(error = %e, "Failed to clear pending match");
        }
    }

    /// Whether `user_id` chose "don't show again" for this signature
    pub fn is_dismissed(&self, user_id: &str, signature: &MatchSignature) -> bool {
        match self.store.get_item(&signature.storage_key(user_id)) {
            Ok(flag) => flag.is_some(),
            Err(e) => {
                warn!(error = %e, "Failed to read dismissal flag");
                false
            }
        }
    }

    /// Record "don't show again"; flags never expire
    pub fn set_dismissed(&self, user_id: &str, signature: &MatchSignature) {
        let key = signature.storage_key(user_id);
        match self.store.set_item(&key, DISMISSED_MARKER) {
            Ok(()) => debug!(key = %key, "Match dismissed permanently"),
            Err(e) => warn!(error = %e, "Failed to save dismissal flag"),
        }
    }
}
