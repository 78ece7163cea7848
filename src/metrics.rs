//! Controller metrics
//!
//! Prometheus counters for reconciles, discover passes, drive record changes
//! and volume status transitions, held in a controller-owned registry.

use crate::error::{Error, Result};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

pub struct ControllerMetrics {
    registry: Registry,
    reconciles: IntCounterVec,
    discover_passes: IntCounterVec,
    drive_changes: IntCounterVec,
    volume_transitions: IntCounterVec,
}

fn counter_vec(registry: &Registry, name: &str, help: &str, label: &str) -> Result<IntCounterVec> {
    let counter = IntCounterVec::new(Opts::new(name, help), &[label])
        .map_err(|e| Error::Internal(format!("invalid metric {}: {}", name, e)))?;
    registry
        .register(Box::new(counter.clone()))
        .map_err(|e| Error::Internal(format!("failed to register {}: {}", name, e)))?;
    Ok(counter)
}

impl ControllerMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("baremetal_node".into()), None)
            .map_err(|e| Error::Internal(format!("metrics registry: {}", e)))?;

        Ok(Self {
            reconciles: counter_vec(
                &registry,
                "volume_reconciles_total",
                "Volume reconciles by outcome",
                "outcome",
            )?,
            discover_passes: counter_vec(
                &registry,
                "discover_passes_total",
                "Discover passes by outcome",
                "outcome",
            )?,
            drive_changes: counter_vec(
                &registry,
                "drive_records_total",
                "Drive records per synchronization bucket",
                "bucket",
            )?,
            volume_transitions: counter_vec(
                &registry,
                "volume_status_transitions_total",
                "Volume status writes by target status",
                "status",
            )?,
            registry,
        })
    }

    pub fn record_reconcile(&self, outcome: &str) {
        self.reconciles.with_label_values(&[outcome]).inc();
    }

    pub fn record_discover(&self, outcome: &str) {
        self.discover_passes.with_label_values(&[outcome]).inc();
    }

    pub fn record_drive_changes(&self, bucket: &str, count: usize) {
        self.drive_changes
            .with_label_values(&[bucket])
            .inc_by(count as u64);
    }

    pub fn record_transition(&self, status: &str) {
        self.volume_transitions.with_label_values(&[status]).inc();
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition of every registered metric
    pub fn encode(&self) -> Result<(String, Vec<u8>)> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| Error::Internal(format!("metrics encoding failed: {}", e)))?;
        Ok((encoder.format_type().to_string(), buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_exposition() {
        let metrics = ControllerMetrics::new().unwrap();
        metrics.record_reconcile("done");
        metrics.record_drive_changes("created", 2);
        metrics.record_transition("CREATED");

        let (content_type, body) = metrics.encode().unwrap();
        let body = String::from_utf8(body).unwrap();
        assert!(content_type.starts_with("text/plain"));
        assert!(body.contains("baremetal_node_volume_reconciles_total{outcome=\"done\"} 1"));
        assert!(body.contains("baremetal_node_drive_records_total{bucket=\"created\"} 2"));
    }
}
