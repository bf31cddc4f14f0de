//! Common types and utilities for CarMatch
//!
//! This crate provides shared types and errors used across
//! all CarMatch crates.
//!
//! # Modules
//!
//! - [`error`] - Common error types
//! - [`types`] - Shared domain vocabulary (VehicleType, UserIdentity, etc.)

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
