//! Incident records, lifecycle, and shared orchestration state.

pub mod lifecycle;
pub mod store;

pub use self::lifecycle::IncidentLifecycleManager;
pub use self::store::{MemoryStore, StateStore};

use crate::recovery::RecoveryAction;
use crate::rules::{DetectionRule, Severity};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Incident lifecycle states.
///
/// The automated path only assigns `Detected`, `Investigating`, `Resolved`
/// and `Closed`. `Identified`, `Mitigating` and `Monitoring` are reserved
/// for a manual-operator workflow and are never set by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Detected,
    Investigating,
    Identified,
    Mitigating,
    Monitoring,
    Resolved,
    Closed,
}

impl IncidentStatus {
    /// Terminal states leave the active set.
    pub fn is_terminal(self) -> bool {
        matches!(self, IncidentStatus::Resolved | IncidentStatus::Closed)
    }
}

/// One entry in an incident's append-only timeline.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TimelineEntry {
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub description: String,
}

/// A recorded remediation attempt. Skipped (cooled-down) actions are never
/// recorded.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ActionRecord {
    pub action: RecoveryAction,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
}

/// Tier-driven business impact estimate. A heuristic, not a financial model.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BusinessImpact {
    /// Dollars-per-hour-equivalent: score x tier multiplier.
    pub estimated_revenue_impact: f64,
    /// Estimated customers affected: score x tier factor.
    pub customer_impact_count: u64,
    pub methodology_areas: Vec<String>,
}

impl BusinessImpact {
    pub fn estimate(severity: Severity, score: u32, services: &[String]) -> Self {
        Self {
            estimated_revenue_impact: f64::from(score) * severity.revenue_multiplier(),
            customer_impact_count: (f64::from(score) * severity.customer_multiplier()) as u64,
            methodology_areas: services.to_vec(),
        }
    }
}

/// A single tracked incident.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub status: IncidentStatus,
    pub detected_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub affected_services: Vec<String>,
    pub business_impact: BusinessImpact,
    /// Name of the rule that opened this incident; the dedup key.
    pub detection_source: String,
    pub recovery_actions_taken: Vec<ActionRecord>,
    pub timeline: Vec<TimelineEntry>,
    /// Signal name -> consumed error-budget fraction at detection time.
    pub error_budget_impact: HashMap<String, f64>,
    pub tags: Vec<String>,
}

impl Incident {
    /// Open a new incident from a triggering rule.
    pub fn from_rule(rule: &DetectionRule, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: format!("{}: {}", rule.severity, rule.name),
            description: rule.description.clone(),
            severity: rule.severity,
            status: IncidentStatus::Detected,
            detected_at: now,
            updated_at: now,
            resolved_at: None,
            affected_services: rule.affected_services.clone(),
            business_impact: BusinessImpact::estimate(
                rule.severity,
                rule.business_impact_score,
                &rule.affected_services,
            ),
            detection_source: rule.name.clone(),
            recovery_actions_taken: Vec::new(),
            timeline: vec![TimelineEntry {
                timestamp: now,
                event: "incident_detected".into(),
                description: format!("Rule '{}' triggered", rule.name),
            }],
            error_budget_impact: HashMap::new(),
            tags: vec![rule.severity.to_string(), "auto-detected".into()],
        }
    }

    pub fn push_event(&mut self, now: DateTime<Utc>, event: &str, description: String) {
        self.timeline.push(TimelineEntry {
            timestamp: now,
            event: event.to_string(),
            description,
        });
        self.updated_at = now;
    }

    pub fn has_event(&self, event: &str) -> bool {
        self.timeline.iter().any(|e| e.event == event)
    }

    pub fn age_minutes(&self, now: DateTime<Utc>) -> i64 {
        (now - self.detected_at).num_minutes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleCatalog;

    #[test]
    fn impact_heuristic_shape() {
        let impact = BusinessImpact::estimate(Severity::P1, 80, &["api".into()]);
        assert_eq!(impact.estimated_revenue_impact, 8000.0);
        assert_eq!(impact.customer_impact_count, 2000);

        let small = BusinessImpact::estimate(Severity::P4, 80, &[]);
        assert_eq!(small.estimated_revenue_impact, 400.0);
    }

    #[test]
    fn new_incident_starts_detected_with_timeline() {
        let catalog = RuleCatalog::default_catalog();
        let rule = catalog.get("database_outage").unwrap();
        let incident = Incident::from_rule(rule, Utc::now());
        assert_eq!(incident.status, IncidentStatus::Detected);
        assert_eq!(incident.timeline.len(), 1);
        assert_eq!(incident.timeline[0].event, "incident_detected");
        assert_eq!(incident.detection_source, "database_outage");
        assert!(incident.resolved_at.is_none());
    }
}
