//! Match query construction
//!
//! A [`MatchQuery`] is a structured filter over one counterpart collection.
//! Store backends translate it into their own query language; the in-memory
//! store evaluates it directly through [`MatchQuery::matches`].
//!
//! The two directions are deliberately asymmetric:
//! - vehicle → requirement compares make and model for case-insensitive
//!   equality (a seller wants relevant buyers)
//! - requirement → vehicle uses case-insensitive substring matching (a buyer
//!   wants anything plausibly relevant)

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use crate::domain::{
    ListingStatus, Requirement, RequirementCriteria, RequirementStatus, VehicleCriteria,
    VehicleListing,
};

/// Counterpart collection a query runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Requirements,
    Listings,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Requirements => "requirements",
            Collection::Listings => "vehicles",
        }
    }
}

/// Record field a predicate constrains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Status,
    VehicleType,
    Make,
    Model,
}

impl Field {
    /// Column name in the backing table
    pub fn column(&self) -> &'static str {
        match self {
            Field::Status => "status",
            Field::VehicleType => "vehicle_type",
            Field::Make => "make",
            Field::Model => "model",
        }
    }
}

/// A single constraint on a record field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Byte-for-byte equality
    Equals { field: Field, value: String },
    /// Equality after lower-casing both sides
    EqualsIgnoreCase { field: Field, value: String },
    /// Substring containment after lower-casing both sides
    ContainsIgnoreCase { field: Field, value: String },
}

impl Predicate {
    pub fn equals(field: Field, value: impl Into<String>) -> Self {
        Predicate::Equals { field, value: value.into() }
    }

    pub fn equals_ignore_case(field: Field, value: impl Into<String>) -> Self {
        Predicate::EqualsIgnoreCase { field, value: value.into() }
    }

    pub fn contains_ignore_case(field: Field, value: impl Into<String>) -> Self {
        Predicate::ContainsIgnoreCase { field, value: value.into() }
    }

    pub fn field(&self) -> Field {
        match self {
            Predicate::Equals { field, .. }
            | Predicate::EqualsIgnoreCase { field, .. }
            | Predicate::ContainsIgnoreCase { field, .. } => *field,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Predicate::Equals { value, .. }
            | Predicate::EqualsIgnoreCase { value, .. }
            | Predicate::ContainsIgnoreCase { value, .. } => value,
        }
    }

    /// Evaluate against a record's field value.
    ///
    /// A missing value never matches, mirroring SQL `NULL` comparison.
    pub fn evaluate(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        match self {
            Predicate::Equals { value, .. } => actual == value,
            Predicate::EqualsIgnoreCase { value, .. } => {
                actual.to_lowercase() == value.to_lowercase()
            }
            Predicate::ContainsIgnoreCase { value, .. } => {
                actual.to_lowercase().contains(&value.to_lowercase())
            }
        }
    }
}

/// Result ordering; every match query is newest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub descending: bool,
}

impl OrderBy {
    pub fn created_at_desc() -> Self {
        Self { descending: true }
    }

    pub fn column(&self) -> &'static str {
        "created_at"
    }

    fn compare(&self, a: &DateTime<Utc>, b: &DateTime<Utc>) -> Ordering {
        if self.descending {
            b.cmp(a)
        } else {
            a.cmp(b)
        }
    }
}

/// Records a [`MatchQuery`] can be evaluated against
pub trait Matchable {
    const COLLECTION: Collection;

    fn field_value(&self, field: Field) -> Option<&str>;

    fn created_at(&self) -> DateTime<Utc>;
}

impl Matchable for Requirement {
    const COLLECTION: Collection = Collection::Requirements;

    fn field_value(&self, field: Field) -> Option<&str> {
        match field {
            Field::Status => Some(self.status.as_str()),
            Field::VehicleType => Some(self.vehicle_type.as_str()),
            Field::Make => self.make.as_deref(),
            Field::Model => self.model.as_deref(),
        }
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Matchable for VehicleListing {
    const COLLECTION: Collection = Collection::Listings;

    fn field_value(&self, field: Field) -> Option<&str> {
        match field {
            Field::Status => Some(self.status.as_str()),
            Field::VehicleType => Some(self.vehicle_type.as_str()),
            Field::Make => Some(&self.make),
            Field::Model => Some(&self.model),
        }
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Filter against one counterpart collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchQuery {
    pub collection: Collection,
    pub predicates: Vec<Predicate>,
    pub order_by: OrderBy,
}

impl MatchQuery {
    /// Open requirements with the vehicle's type and the same make and model
    /// (case-insensitive equality).
    pub fn vehicle_to_requirement(vehicle: &VehicleCriteria) -> Self {
        let mut query = Self::vehicle_to_requirement_partial(vehicle);
        query
            .predicates
            .push(Predicate::equals_ignore_case(Field::Model, vehicle.model.clone()));
        query
    }

    /// Fallback: open requirements with the vehicle's type and make, any model.
    pub fn vehicle_to_requirement_partial(vehicle: &VehicleCriteria) -> Self {
        Self {
            collection: Collection::Requirements,
            predicates: vec![
                Predicate::equals(Field::Status, RequirementStatus::Open.as_str()),
                Predicate::equals(Field::VehicleType, vehicle.vehicle_type.as_str()),
                Predicate::equals_ignore_case(Field::Make, vehicle.make.clone()),
            ],
            order_by: OrderBy::created_at_desc(),
        }
    }

    /// Active listings of the requirement's type whose make/model contain the
    /// requested text. Blank make or model means unconstrained.
    pub fn requirement_to_vehicle(requirement: &RequirementCriteria) -> Self {
        let mut predicates = vec![
            Predicate::equals(Field::Status, ListingStatus::Active.as_str()),
            Predicate::equals(Field::VehicleType, requirement.vehicle_type.as_str()),
        ];

        if let Some(make) = non_blank(requirement.make.as_deref()) {
            predicates.push(Predicate::contains_ignore_case(Field::Make, make));
        }
        if let Some(model) = non_blank(requirement.model.as_deref()) {
            predicates.push(Predicate::contains_ignore_case(Field::Model, model));
        }

        Self {
            collection: Collection::Listings,
            predicates,
            order_by: OrderBy::created_at_desc(),
        }
    }

    /// Whether a record of the right collection satisfies every predicate
    pub fn matches<R: Matchable>(&self, record: &R) -> bool {
        R::COLLECTION == self.collection
            && self
                .predicates
                .iter()
                .all(|p| p.evaluate(record.field_value(p.field())))
    }

    /// Sort records into this query's result order
    pub fn sort<R: Matchable>(&self, records: &mut [R]) {
        records.sort_by(|a, b| self.order_by.compare(&a.created_at(), &b.created_at()));
    }

    /// Filter and order a candidate set
    pub fn apply<'a, R, I>(&self, candidates: I) -> Vec<R>
    where
        R: Matchable + Clone + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        let mut found: Vec<R> = candidates
            .into_iter()
            .filter(|r| self.matches(*r))
            .cloned()
            .collect();
        self.sort(&mut found);
        found
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VehicleType;
    use chrono::Duration;

    fn innova() -> VehicleCriteria {
        VehicleCriteria::new(VehicleType::Car, "Toyota", "Innova", 2021)
    }

    #[test]
    fn test_vehicle_to_requirement_shape() {
        let q = MatchQuery::vehicle_to_requirement(&innova());
        assert_eq!(q.collection, Collection::Requirements);
        assert_eq!(
            q.predicates,
            vec![
                Predicate::equals(Field::Status, "open"),
                Predicate::equals(Field::VehicleType, "car"),
                Predicate::equals_ignore_case(Field::Make, "Toyota"),
                Predicate::equals_ignore_case(Field::Model, "Innova"),
            ]
        );
        assert!(q.order_by.descending);
    }

    #[test]
    fn test_partial_drops_model_only() {
        let exact = MatchQuery::vehicle_to_requirement(&innova());
        let partial = MatchQuery::vehicle_to_requirement_partial(&innova());
        assert_eq!(partial.predicates.len(), exact.predicates.len() - 1);
        assert!(partial.predicates.iter().all(|p| p.field() != Field::Model));
    }

    #[test]
    fn test_exact_is_case_insensitive_equality() {
        let q = MatchQuery::vehicle_to_requirement(&innova());
        let matching = Requirement::new(VehicleType::Car, "b")
            .with_make("TOYOTA")
            .with_model("innova");
        let prefix_only = Requirement::new(VehicleType::Car, "b")
            .with_make("Toy")
            .with_model("Innova");
        assert!(q.matches(&matching));
        assert!(!q.matches(&prefix_only));
    }

    #[test]
    fn test_requirement_without_make_does_not_match_vehicle_query() {
        let q = MatchQuery::vehicle_to_requirement_partial(&innova());
        let any_make = Requirement::new(VehicleType::Car, "b");
        assert!(!q.matches(&any_make));
    }

    #[test]
    fn test_requirement_to_vehicle_substring() {
        let q = MatchQuery::requirement_to_vehicle(
            &RequirementCriteria::new(VehicleType::Car).with_make("hon"),
        );
        let honda = VehicleListing::new(VehicleType::Car, "Honda", "City", 2019, 1, "s")
            .with_status(ListingStatus::Active);
        assert!(q.matches(&honda));

        let bike = VehicleListing::new(VehicleType::Bike, "Honda", "Shine", 2019, 1, "s")
            .with_status(ListingStatus::Active);
        assert!(!q.matches(&bike));
    }

    #[test]
    fn test_blank_requirement_fields_are_unconstrained() {
        let criteria = RequirementCriteria::new(VehicleType::Bike)
            .with_make("  ")
            .with_model("");
        let q = MatchQuery::requirement_to_vehicle(&criteria);
        assert_eq!(q.predicates.len(), 2);
    }

    #[test]
    fn test_status_is_always_constrained() {
        let q = MatchQuery::requirement_to_vehicle(&RequirementCriteria::new(VehicleType::Car));
        for status in [ListingStatus::Pending, ListingStatus::Hidden, ListingStatus::Sold] {
            let listing = VehicleListing::new(VehicleType::Car, "Any", "Thing", 2020, 1, "s")
                .with_status(status);
            assert!(!q.matches(&listing), "{} listing matched", status);
        }

        let v2r = MatchQuery::vehicle_to_requirement(&innova());
        for status in [RequirementStatus::Matched, RequirementStatus::Closed] {
            let req = Requirement::new(VehicleType::Car, "b")
                .with_make("Toyota")
                .with_model("Innova")
                .with_status(status);
            assert!(!v2r.matches(&req), "{} requirement matched", status);
        }
    }

    #[test]
    fn test_wrong_collection_never_matches() {
        let q = MatchQuery::vehicle_to_requirement(&innova());
        let listing = VehicleListing::new(VehicleType::Car, "Toyota", "Innova", 2021, 1, "s")
            .with_status(ListingStatus::Active);
        assert!(!q.matches(&listing));
    }

    #[test]
    fn test_apply_orders_newest_first() {
        let now = Utc::now();
        let older = Requirement::new(VehicleType::Car, "a")
            .with_make("Toyota")
            .with_model("Innova")
            .with_created_at(now - Duration::days(2));
        let newer = Requirement::new(VehicleType::Car, "b")
            .with_make("Toyota")
            .with_model("Innova")
            .with_created_at(now);
        let records = vec![older.clone(), newer.clone()];

        let found = MatchQuery::vehicle_to_requirement(&innova()).apply(&records);
        assert_eq!(found.iter().map(|r| r.id).collect::<Vec<_>>(), vec![newer.id, older.id]);
    }

    #[test]
    fn test_unicode_case_folding() {
        let p = Predicate::equals_ignore_case(Field::Make, "ŠKODA");
        assert!(p.evaluate(Some("škoda")));
        assert!(!p.evaluate(None));
    }
}
