use url::form_urlencoded;

use crate::domain::{RequirementCriteria, VehicleCriteria};

const VEHICLE_PREFIX: &str = "vehicle-match-dismissed";
const REQUIREMENT_PREFIX: &str = "requirement-match-dismissed";

/// Identity of one match notification, for "don't show again"
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatchSignature {
    /// Notification raised by a posted vehicle
    Vehicle(VehicleCriteria),
    /// Notification raised by a posted requirement
    Requirement(RequirementCriteria),
}

impl MatchSignature {
    /// Storage key for this signature as seen by `user_id`.
    ///
    /// Components are form-urlencoded before joining on `:`, so a delimiter
    /// inside a make or model cannot make two signatures collide. Absent
    /// optional components render empty.
    pub fn storage_key(&self, user_id: &str) -> String {
        let (prefix, components) = match self {
            MatchSignature::Vehicle(v) => (
                VEHICLE_PREFIX,
                vec![
                    v.vehicle_type.as_str().to_string(),
                    v.make.clone(),
                    v.model.clone(),
                    v.year.to_string(),
                ],
            ),
            MatchSignature::Requirement(r) => (
                REQUIREMENT_PREFIX,
                vec![
                    r.vehicle_type.as_str().to_string(),
                    r.make.clone().unwrap_or_default(),
                    r.model.clone().unwrap_or_default(),
                    r.year_range_min.map(|y| y.to_string()).unwrap_or_default(),
                    r.year_range_max.map(|y| y.to_string()).unwrap_or_default(),
                ],
            ),
        };

        let mut key = String::from(prefix);
        for component in std::iter::once(user_id).chain(components.iter().map(String::as_str)) {
            key.push(':');
            key.extend(form_urlencoded::byte_serialize(component.as_bytes()));
        }
        key
    }
}

impl From<&VehicleCriteria> for MatchSignature {
    fn from(criteria: &VehicleCriteria) -> Self {
        MatchSignature::Vehicle(criteria.clone())
    }
}

impl From<&RequirementCriteria> for MatchSignature {
    fn from(criteria: &RequirementCriteria) -> Self {
        MatchSignature::Requirement(criteria.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VehicleType;

    #[test]
    fn test_vehicle_key_layout() {
        let sig = MatchSignature::from(&VehicleCriteria::new(VehicleType::Car, "Toyota", "Innova", 2021));
        assert_eq!(
            sig.storage_key("user-1"),
            "vehicle-match-dismissed:user-1:car:Toyota:Innova:2021"
        );
    }

    #[test]
    fn test_requirement_key_renders_absent_as_empty() {
        let criteria = RequirementCriteria::new(VehicleType::Bike).with_make("Bajaj");
        assert_eq!(
            MatchSignature::from(&criteria).storage_key("u"),
            "requirement-match-dismissed:u:bike:Bajaj:::"
        );
    }

    #[test]
    fn test_delimiters_cannot_collide() {
        let a = VehicleCriteria::new(VehicleType::Car, "Mercedes:Benz", "C", 2020);
        let b = VehicleCriteria::new(VehicleType::Car, "Mercedes", "Benz:C", 2020);
        let key_a = MatchSignature::from(&a).storage_key("u");
        let key_b = MatchSignature::from(&b).storage_key("u");
        assert_ne!(key_a, key_b);
        assert!(key_a.contains("Mercedes%3ABenz"));
    }

    #[test]
    fn test_vehicle_and_requirement_keys_differ() {
        let v = VehicleCriteria::new(VehicleType::Car, "Honda", "City", 2020);
        let r = RequirementCriteria::new(VehicleType::Car)
            .with_make("Honda")
            .with_model("City");
        assert_ne!(
            MatchSignature::from(&v).storage_key("u"),
            MatchSignature::from(&r).storage_key("u")
        );
    }
}
