//! Domain types for listing/requirement matching
//!
//! Listings and requirements carry only the attributes the matching core
//! reads; the rest of the marketplace record lives with the data store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

pub use common::types::VehicleType;

/// Moderation state of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    /// Awaiting admin approval
    #[default]
    Pending,
    /// Visible and matchable
    Active,
    /// Hidden by an admin or the seller
    Hidden,
    /// Sold
    Sold,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Pending => "pending",
            ListingStatus::Active => "active",
            ListingStatus::Hidden => "hidden",
            ListingStatus::Sold => "sold",
        }
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingStatus {
    type Err = common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ListingStatus::Pending),
            "active" => Ok(ListingStatus::Active),
            "hidden" => Ok(ListingStatus::Hidden),
            "sold" => Ok(ListingStatus::Sold),
            other => Err(common::Error::unknown_variant("listing status", other)),
        }
    }
}

/// Lifecycle state of a buyer requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequirementStatus {
    /// Still looking; matchable
    #[default]
    Open,
    /// Buyer found a vehicle
    Matched,
    /// Withdrawn
    Closed,
}

impl RequirementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementStatus::Open => "open",
            RequirementStatus::Matched => "matched",
            RequirementStatus::Closed => "closed",
        }
    }
}

impl std::fmt::Display for RequirementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequirementStatus {
    type Err = common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(RequirementStatus::Open),
            "matched" => Ok(RequirementStatus::Matched),
            "closed" => Ok(RequirementStatus::Closed),
            other => Err(common::Error::unknown_variant("requirement status", other)),
        }
    }
}

/// A vehicle posted for sale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleListing {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub vehicle_type: VehicleType,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price: i64,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub status: ListingStatus,
    /// Id of the posting user
    pub posted_by: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl VehicleListing {
    /// Create a new listing awaiting moderation
    pub fn new(
        vehicle_type: VehicleType,
        make: impl Into<String>,
        model: impl Into<String>,
        year: i32,
        price: i64,
        posted_by: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            vehicle_type,
            make: make.into(),
            model: model.into(),
            year,
            price,
            location: None,
            status: ListingStatus::Pending,
            posted_by: posted_by.into(),
            created_at: Utc::now(),
        }
    }

    pub fn with_status(mut self, status: ListingStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Only active listings take part in requirement matching
    pub fn is_matchable(&self) -> bool {
        self.status == ListingStatus::Active
    }
}

/// A buyer's description of the vehicle they want
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub vehicle_type: VehicleType,
    /// Absent means any make
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub year_range_min: Option<i32>,
    #[serde(default)]
    pub year_range_max: Option<i32>,
    #[serde(default)]
    pub price_range_min: Option<i64>,
    #[serde(default)]
    pub price_range_max: Option<i64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: RequirementStatus,
    pub posted_by: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Requirement {
    /// Create an open requirement for any vehicle of the given type
    pub fn new(vehicle_type: VehicleType, posted_by: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            vehicle_type,
            make: None,
            model: None,
            year_range_min: None,
            year_range_max: None,
            price_range_min: None,
            price_range_max: None,
            location: None,
            description: None,
            status: RequirementStatus::Open,
            posted_by: posted_by.into(),
            created_at: Utc::now(),
        }
    }

    pub fn with_make(mut self, make: impl Into<String>) -> Self {
        self.make = Some(make.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_year_range(mut self, min: Option<i32>, max: Option<i32>) -> Self {
        self.year_range_min = min;
        self.year_range_max = max;
        self
    }

    pub fn with_price_range(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.price_range_min = min;
        self.price_range_max = max;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_status(mut self, status: RequirementStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Only open requirements take part in vehicle matching
    pub fn is_matchable(&self) -> bool {
        self.status == RequirementStatus::Open
    }
}

/// Match criteria taken from a just-posted vehicle
///
/// This is also the shape persisted in the pending-match slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VehicleCriteria {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub vehicle_type: VehicleType,
}

impl VehicleCriteria {
    pub fn new(
        vehicle_type: VehicleType,
        make: impl Into<String>,
        model: impl Into<String>,
        year: i32,
    ) -> Self {
        Self {
            make: make.into(),
            model: model.into(),
            year,
            vehicle_type,
        }
    }

    /// All four fields carry a usable value
    pub fn is_complete(&self) -> bool {
        !self.make.trim().is_empty() && !self.model.trim().is_empty() && self.year != 0
    }
}

impl From<&VehicleListing> for VehicleCriteria {
    fn from(listing: &VehicleListing) -> Self {
        Self {
            make: listing.make.clone(),
            model: listing.model.clone(),
            year: listing.year,
            vehicle_type: listing.vehicle_type,
        }
    }
}

/// Match criteria taken from a just-posted requirement
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequirementCriteria {
    pub vehicle_type: VehicleType,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub year_range_min: Option<i32>,
    #[serde(default)]
    pub year_range_max: Option<i32>,
}

impl RequirementCriteria {
    pub fn new(vehicle_type: VehicleType) -> Self {
        Self {
            vehicle_type,
            make: None,
            model: None,
            year_range_min: None,
            year_range_max: None,
        }
    }

    pub fn with_make(mut self, make: impl Into<String>) -> Self {
        self.make = Some(make.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

impl From<&Requirement> for RequirementCriteria {
    fn from(requirement: &Requirement) -> Self {
        Self {
            vehicle_type: requirement.vehicle_type,
            make: requirement.make.clone(),
            model: requirement.model.clone(),
            year_range_min: requirement.year_range_min,
            year_range_max: requirement.year_range_max,
        }
    }
}

/// Result set of the last match check
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Matches {
    /// No check has produced results yet
    #[default]
    None,
    /// Open requirements matching a posted vehicle
    Requirements(Vec<Requirement>),
    /// Active listings matching a posted requirement
    Listings(Vec<VehicleListing>),
}

impl Matches {
    pub fn len(&self) -> usize {
        match self {
            Matches::None => 0,
            Matches::Requirements(r) => r.len(),
            Matches::Listings(l) => l.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of the matched records, in result order
    pub fn ids(&self) -> Vec<Uuid> {
        match self {
            Matches::None => Vec::new(),
            Matches::Requirements(r) => r.iter().map(|r| r.id).collect(),
            Matches::Listings(l) => l.iter().map(|l| l.id).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_strings() {
        assert_eq!("ACTIVE".parse::<ListingStatus>().unwrap(), ListingStatus::Active);
        assert_eq!(ListingStatus::Sold.to_string(), "sold");
        assert_eq!("matched".parse::<RequirementStatus>().unwrap(), RequirementStatus::Matched);
        assert!("archived".parse::<RequirementStatus>().is_err());
    }

    #[test]
    fn test_new_listing_is_pending() {
        let listing = VehicleListing::new(VehicleType::Car, "Toyota", "Innova", 2021, 1_500_000, "u1");
        assert_eq!(listing.status, ListingStatus::Pending);
        assert!(!listing.is_matchable());
        assert!(listing.with_status(ListingStatus::Active).is_matchable());
    }

    #[test]
    fn test_requirement_deserialize_defaults() {
        let json = r#"{"vehicle_type":"bike","posted_by":"buyer"}"#;
        let req: Requirement = serde_json::from_str(json).unwrap();
        assert_eq!(req.status, RequirementStatus::Open);
        assert!(req.make.is_none());
        assert!(req.is_matchable());
    }

    #[test]
    fn test_vehicle_criteria_completeness() {
        assert!(VehicleCriteria::new(VehicleType::Car, "Toyota", "Innova", 2021).is_complete());
        assert!(!VehicleCriteria::new(VehicleType::Car, "", "Innova", 2021).is_complete());
        assert!(!VehicleCriteria::new(VehicleType::Car, "Toyota", "  ", 2021).is_complete());
        assert!(!VehicleCriteria::new(VehicleType::Car, "Toyota", "Innova", 0).is_complete());
    }

    #[test]
    fn test_criteria_from_records() {
        let listing = VehicleListing::new(VehicleType::Bike, "Bajaj", "Pulsar", 2020, 90_000, "u1");
        let criteria = VehicleCriteria::from(&listing);
        assert_eq!(criteria.make, "Bajaj");
        assert_eq!(criteria.year, 2020);

        let req = Requirement::new(VehicleType::Car, "u2")
            .with_make("Honda")
            .with_year_range(Some(2015), None);
        let criteria = RequirementCriteria::from(&req);
        assert_eq!(criteria.make.as_deref(), Some("Honda"));
        assert_eq!(criteria.year_range_min, Some(2015));
        assert!(criteria.model.is_none());
    }

    #[test]
    fn test_matches_len_and_ids() {
        let req = Requirement::new(VehicleType::Car, "u1");
        let id = req.id;
        let matches = Matches::Requirements(vec![req]);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches.ids(), vec![id]);
        assert!(Matches::None.is_empty());
    }
}
