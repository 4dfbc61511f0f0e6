//! Response-quality metrics derived from resolved-incident history.

use crate::incident::{Incident, StateStore};
use crate::rules::Severity;
use std::collections::HashMap;
use std::sync::Arc;

/// Aggregate metrics recomputed each tick from the bounded history.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct IncidentMetrics {
    pub total_incidents: usize,
    pub incidents_by_severity: HashMap<Severity, usize>,
    /// Mean detection-to-resolution time over resolved incidents.
    pub mttr_minutes: f64,
    /// Resolved without an escalation, as a percentage of all resolved.
    pub recovery_success_rate: f64,
    /// Complement of the success rate.
    pub escalation_rate: f64,
    /// Sum of estimated revenue impact over resolved incidents.
    pub business_impact_prevented: f64,
    /// Configured constant, not a measurement: detection is synchronous
    /// with signal evaluation in this design.
    pub detection_latency_seconds: u64,
}

pub struct MetricsAggregator {
    store: Arc<dyn StateStore>,
    detection_latency_seconds: u64,
}

impl MetricsAggregator {
    pub fn new(store: Arc<dyn StateStore>, detection_latency_seconds: u64) -> Self {
        Self {
            store,
            detection_latency_seconds,
        }
    }

    /// Recompute from history and publish into the store.
    pub fn recompute(&self) -> IncidentMetrics {
        let metrics = compute(&self.store.history(), self.detection_latency_seconds);
        self.store.set_metrics(metrics.clone());
        metrics
    }
}

fn compute(history: &[Incident], detection_latency_seconds: u64) -> IncidentMetrics {
    let mut by_severity: HashMap<Severity, usize> = HashMap::new();
    for incident in history {
        *by_severity.entry(incident.severity).or_default() += 1;
    }

    let resolved: Vec<&Incident> = history.iter().filter(|i| i.resolved_at.is_some()).collect();

    let mttr_minutes = if resolved.is_empty() {
        0.0
    } else {
        let total: i64 = resolved
            .iter()
            .filter_map(|i| i.resolved_at.map(|r| (r - i.detected_at).num_minutes()))
            .sum();
        total as f64 / resolved.len() as f64
    };

    let (recovery_success_rate, escalation_rate) = if resolved.is_empty() {
        (100.0, 0.0)
    } else {
        let unescalated = resolved.iter().filter(|i| !i.has_event("escalated")).count();
        let success = unescalated as f64 / resolved.len() as f64 * 100.0;
        (success, 100.0 - success)
    };

    IncidentMetrics {
        total_incidents: history.len(),
        incidents_by_severity: by_severity,
        mttr_minutes,
        recovery_success_rate,
        escalation_rate,
        business_impact_prevented: resolved
            .iter()
            .map(|i| i.business_impact.estimated_revenue_impact)
            .sum(),
        detection_latency_seconds,
    }
}
