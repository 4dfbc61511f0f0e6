//! One-time human escalation for stalled incidents.

use crate::incident::{Incident, StateStore};
use crate::rules::{RuleCatalog, Severity};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Why the alert sink is being invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Detected,
    Escalated,
    Resolved,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::Detected => write!(f, "detected"),
            AlertKind::Escalated => write!(f, "escalated"),
            AlertKind::Resolved => write!(f, "resolved"),
        }
    }
}

/// Delivery channel for human-facing notifications. Delivery failures are
/// logged and never block tick processing.
#[async_trait::async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, incident: &Incident, severity: Severity, kind: AlertKind) -> Result<()>;
}

/// Watches active incidents and hands each to a human at most once, after
/// its rule's escalation threshold has elapsed.
pub struct EscalationManager {
    store: Arc<dyn StateStore>,
    alerts: Arc<dyn AlertSink>,
    call_timeout: Duration,
}

impl EscalationManager {
    pub fn new(
        store: Arc<dyn StateStore>,
        alerts: Arc<dyn AlertSink>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            store,
            alerts,
            call_timeout,
        }
    }

    /// Escalate the incident if it is overdue and has not been escalated.
    ///
    /// The timeline `escalated` entry is the sole dedup mechanism; it is
    /// appended and written back before the (best-effort) alert delivery, so
    /// a slow sink cannot cause a second escalation on a later tick.
    pub async fn check(&self, incident_id: uuid::Uuid, catalog: &RuleCatalog, now: DateTime<Utc>) {
        let Some(mut incident) = self.store.get_active(incident_id) else {
            return;
        };
        let Some(rule) = catalog.get(&incident.detection_source) else {
            warn!(incident = %incident.id, rule = %incident.detection_source, "No rule for active incident");
            return;
        };

        let elapsed_minutes = (now - incident.detected_at).num_minutes();
        if elapsed_minutes < rule.escalation_minutes || incident.has_event("escalated") {
            return;
        }

        incident.push_event(
            now,
            "escalated",
            format!(
                "Unresolved after {elapsed_minutes} min (threshold {} min), paging a human",
                rule.escalation_minutes
            ),
        );
        self.store.put_active(incident.clone());

        info!(incident = %incident.id, rule = %rule.name, elapsed_minutes, "Escalating incident");
        let delivery = tokio::time::timeout(
            self.call_timeout,
            self.alerts
                .notify(&incident, incident.severity, AlertKind::Escalated),
        )
        .await;
        match delivery {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(incident = %incident.id, "Alert delivery failed: {e}"),
            Err(_) => warn!(incident = %incident.id, "Alert delivery timed out"),
        }
    }
}
