use crate::escalation::{AlertKind, AlertSink};
use crate::incident::{Incident, IncidentStatus, StateStore};
use crate::rules::DetectionRule;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Creates, deduplicates, resolves, and retires incidents.
pub struct IncidentLifecycleManager {
    store: Arc<dyn StateStore>,
    alerts: Arc<dyn AlertSink>,
    call_timeout: Duration,
    retention: chrono::Duration,
}

impl IncidentLifecycleManager {
    pub fn new(
        store: Arc<dyn StateStore>,
        alerts: Arc<dyn AlertSink>,
        call_timeout: Duration,
        retention_days: i64,
    ) -> Self {
        Self {
            store,
            alerts,
            call_timeout,
            retention: chrono::Duration::days(retention_days),
        }
    }

    /// Open an incident for a rule that just started triggering.
    ///
    /// Returns `None` when an active incident for the rule already exists;
    /// the dedup check and the insert are a single atomic store operation.
    pub async fn open(&self, rule: &DetectionRule, now: DateTime<Utc>) -> Option<Incident> {
        let mut incident = Incident::from_rule(rule, now);
        incident.status = IncidentStatus::Investigating;
        incident.push_event(
            now,
            "investigation_started",
            "Automated investigation and recovery started".into(),
        );

        if !self.store.insert_active_if_absent(incident.clone()) {
            debug!(rule = %rule.name, "Incident already active, skipping duplicate");
            return None;
        }

        info!(
            incident = %incident.id,
            rule = %rule.name,
            severity = %rule.severity,
            revenue_impact = incident.business_impact.estimated_revenue_impact,
            "Incident opened"
        );
        self.notify(&incident, AlertKind::Detected).await;
        Some(incident)
    }

    /// Resolve an active incident whose rule has stopped triggering.
    pub async fn resolve(&self, id: uuid::Uuid, now: DateTime<Utc>) -> Option<Incident> {
        let mut incident = self.store.remove_active(id)?;
        let duration_minutes = (now - incident.detected_at).num_minutes();

        incident.status = IncidentStatus::Resolved;
        incident.resolved_at = Some(now);
        incident.push_event(
            now,
            "incident_resolved",
            format!("Resolved after {duration_minutes} min"),
        );

        for service in incident.affected_services.clone() {
            self.store.release_service(&service);
        }

        info!(
            incident = %incident.id,
            rule = %incident.detection_source,
            duration_minutes,
            "Incident resolved"
        );
        self.store.push_history(incident.clone());
        self.notify(&incident, AlertKind::Resolved).await;
        Some(incident)
    }

    /// Evict history entries older than the retention window. Active
    /// incidents are never purged, whatever their age.
    pub fn purge_history(&self, now: DateTime<Utc>) -> usize {
        let purged = self.store.purge_history_before(now - self.retention);
        if purged > 0 {
            info!(purged, "Purged incident history past retention");
        }
        purged
    }

    async fn notify(&self, incident: &Incident, kind: AlertKind) {
        let delivery = tokio::time::timeout(
            self.call_timeout,
            self.alerts.notify(incident, incident.severity, kind),
        )
        .await;
        match delivery {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(incident = %incident.id, %kind, "Alert delivery failed: {e}"),
            Err(_) => warn!(incident = %incident.id, %kind, "Alert delivery timed out"),
        }
    }
}
