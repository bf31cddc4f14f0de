//! Common types used across CarMatch
//!
//! This module provides the small vocabulary shared between the
//! matching core, configuration and the command line.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Error;

/// Kind of vehicle a listing or requirement refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    /// Four-wheeler
    Car,
    /// Two-wheeler
    Bike,
}

impl VehicleType {
    /// Wire/storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Car => "car",
            VehicleType::Bike => "bike",
        }
    }
}

impl std::fmt::Display for VehicleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "car" => Ok(VehicleType::Car),
            "bike" => Ok(VehicleType::Bike),
            other => Err(Error::unknown_variant("vehicle type", other)),
        }
    }
}

/// Identity of the signed-in user, supplied by the auth collaborator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub email: String,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }
}
