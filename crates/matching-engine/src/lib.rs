//! Listing/requirement matching for CarMatch
//!
//! Given a freshly posted vehicle or buyer requirement, this crate finds the
//! counterpart records and drives the match notification a page shows.
//!
//! # Modules
//!
//! - [`query`] - structured match filters (exact, make-only fallback, substring)
//! - [`store`] - marketplace data store trait, in-memory and PostgreSQL backends
//! - [`engine`] - two-stage matching with silent degradation on store failure
//! - [`persistence`] - pending-match slot and "don't show again" flags
//! - [`scheduler`] - cancelable delayed tasks
//! - [`flow`] - per-page notification state machine
//! - [`handoff`] - outbound WhatsApp message text and links

pub mod domain;
pub mod engine;
pub mod error;
pub mod flow;
pub mod handoff;
pub mod metrics;
pub mod persistence;
pub mod query;
pub mod scheduler;
pub mod store;

pub use domain::{
    ListingStatus, Matches, Requirement, RequirementCriteria, RequirementStatus, VehicleCriteria,
    VehicleListing, VehicleType,
};
pub use engine::MatchingEngine;
pub use error::{MatchingError, MatchingResult};
pub use flow::{
    FlowState, MatchNotification, MatchNotificationFlow, NotificationOrigin, PageContext,
    RequirementPostOutcome, SessionTracker,
};
pub use persistence::{
    create_profile_store, FileKeyValueStore, InMemoryKeyValueStore, KeyValueStore,
    MatchSignature, PendingMatchPersistence, PersistenceError,
};
pub use query::MatchQuery;
pub use store::{create_store_from_config, InMemoryMarketplaceStore, MarketplaceStore, StoreError};
