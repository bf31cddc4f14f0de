//! Prometheus metrics infrastructure
//!
//! Exporter setup plus the metric set recorded by the matching core.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Initialize the Prometheus metrics exporter
///
/// Starts an HTTP listener exposing `/metrics` on the given port.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(%addr, "Metrics server listening");
    Ok(())
}

/// Which counterpart collection a match query ran against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryDirection {
    /// Posted vehicle looking for open requirements (exact stage)
    VehicleToRequirement,
    /// Posted vehicle, make-only fallback stage
    VehicleToRequirementPartial,
    /// Posted requirement looking for active listings
    RequirementToVehicle,
}

impl QueryDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryDirection::VehicleToRequirement => "vehicle_to_requirement",
            QueryDirection::VehicleToRequirementPartial => "vehicle_to_requirement_partial",
            QueryDirection::RequirementToVehicle => "requirement_to_vehicle",
        }
    }
}

/// Metric set for match checks and notifications
///
/// # Metrics
///
/// * `carmatch_match_queries_total{direction}` - queries issued
/// * `carmatch_match_query_failures_total{direction}` - queries that failed and degraded to no matches
/// * `carmatch_match_query_duration_seconds{direction}` - query round-trip time
/// * `carmatch_match_results_total{direction}` - records returned
/// * `carmatch_match_notifications_shown_total{context}` - notifications surfaced
/// * `carmatch_match_dismissals_total{kind}` - close vs don't-show-again
#[derive(Debug, Clone, Default)]
pub struct MatchingMetrics;

impl MatchingMetrics {
    pub fn new() -> Self {
        Self
    }

    /// Record a completed query
    pub fn record_query(&self, direction: QueryDirection, duration: Duration, results: usize) {
        let label = direction.as_str();
        counter!("carmatch_match_queries_total", "direction" => label).increment(1);
        histogram!("carmatch_match_query_duration_seconds", "direction" => label)
            .record(duration.as_secs_f64());
        counter!("carmatch_match_results_total", "direction" => label).increment(results as u64);
    }

    /// Record a query that failed
    pub fn record_query_failure(&self, direction: QueryDirection) {
        let label = direction.as_str();
        counter!("carmatch_match_queries_total", "direction" => label).increment(1);
        counter!("carmatch_match_query_failures_total", "direction" => label).increment(1);
    }

    pub fn record_notification_shown(&self, context: &'static str) {
        counter!("carmatch_match_notifications_shown_total", "context" => context).increment(1);
    }

    pub fn record_dismissal(&self, permanent: bool) {
        let kind = if permanent { "permanent" } else { "close" };
        counter!("carmatch_match_dismissals_total", "kind" => kind).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_exporter_is_noop() {
        let metrics = MatchingMetrics::new();
        metrics.record_query(QueryDirection::RequirementToVehicle, Duration::from_millis(5), 3);
        metrics.record_query_failure(QueryDirection::VehicleToRequirement);
        metrics.record_notification_shown("home");
        metrics.record_dismissal(true);
    }

    #[test]
    fn test_direction_labels() {
        assert_eq!(QueryDirection::VehicleToRequirement.as_str(), "vehicle_to_requirement");
        assert_eq!(
            QueryDirection::VehicleToRequirementPartial.as_str(),
            "vehicle_to_requirement_partial"
        );
    }
}
