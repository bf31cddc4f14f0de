//! Observability infrastructure for CarMatch
//!
//! This crate provides:
//! - Structured logging via tracing
//! - Prometheus metrics
//! - Match-check metric helpers
//!
//! # Quick Start
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("carmatch", LogFormat::Pretty)?;
//!
//! // Optional Prometheus endpoint
//! observability::metrics::init_metrics(9090)?;
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, init_logging_with_default, LogFormat, DEFAULT_DIRECTIVE};
pub use metrics::{init_metrics, MatchingMetrics, QueryDirection};
