//! HTTP adapters for the external collaborators.
//!
//! The core only knows the [`SignalSource`], [`Effector`] and [`AlertSink`]
//! traits; these adapters bind them to plain JSON-over-HTTP endpoints so the
//! daemon can run against real infrastructure without linking it in.

use crate::escalation::{AlertKind, AlertSink};
use crate::incident::Incident;
use crate::recovery::{Effector, RecoveryAction};
use crate::rules::Severity;
use crate::signal::{SignalSource, SignalStatus, SystemSnapshot};
use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Reads signal statuses from `GET {base}/signals/{name}` and resource
/// snapshots from `GET {base}/snapshot?window_minutes=N`.
pub struct HttpSignalSource {
    client: Client,
    base: String,
}

impl HttpSignalSource {
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base: base.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(serde::Deserialize)]
struct StatusBody {
    status: SignalStatus,
}

#[async_trait::async_trait]
impl SignalSource for HttpSignalSource {
    async fn signal_status(&self, name: &str) -> Result<SignalStatus> {
        let url = format!("{}/signals/{}", self.base, name);
        let body: StatusBody = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Signal request failed: {url}"))?
            .error_for_status()?
            .json()
            .await
            .context("Signal response was not valid JSON")?;
        Ok(body.status)
    }

    async fn system_snapshot(&self, window: Duration) -> Result<SystemSnapshot> {
        let url = format!(
            "{}/snapshot?window_minutes={}",
            self.base,
            window.as_secs() / 60
        );
        let snapshot: SystemSnapshot = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Snapshot request failed: {url}"))?
            .error_for_status()?
            .json()
            .await
            .context("Snapshot response was not valid JSON")?;
        Ok(snapshot)
    }
}

/// Posts remediation requests to `POST {base}/actions`.
///
/// The endpoint answers `{"success": bool}`; transport errors bubble up and
/// the orchestrator counts them as failed attempts.
pub struct WebhookEffector {
    client: Client,
    base: String,
}

impl WebhookEffector {
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base: base.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(serde::Deserialize)]
struct ActionOutcome {
    success: bool,
}

#[async_trait::async_trait]
impl Effector for WebhookEffector {
    async fn execute(&self, action: RecoveryAction, incident: &Incident) -> Result<bool> {
        let url = format!("{}/actions", self.base);
        let outcome: ActionOutcome = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "action": action,
                "incident_id": incident.id,
                "affected_services": incident.affected_services,
                "severity": incident.severity,
            }))
            .send()
            .await
            .with_context(|| format!("Effector request failed: {url}"))?
            .error_for_status()?
            .json()
            .await
            .context("Effector response was not valid JSON")?;
        Ok(outcome.success)
    }
}

/// Posts alert payloads to a webhook (pager bridge, chat relay, ...).
pub struct WebhookAlertSink {
    client: Client,
    url: String,
}

impl WebhookAlertSink {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            url: url.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl AlertSink for WebhookAlertSink {
    async fn notify(&self, incident: &Incident, severity: Severity, kind: AlertKind) -> Result<()> {
        self.client
            .post(&self.url)
            .json(&serde_json::json!({
                "kind": kind,
                "incident_id": incident.id,
                "title": incident.title,
                "severity": severity,
                "detected_at": incident.detected_at,
                "affected_services": incident.affected_services,
                "estimated_revenue_impact": incident.business_impact.estimated_revenue_impact,
            }))
            .send()
            .await
            .context("Alert webhook request failed")?
            .error_for_status()
            .context("Alert webhook rejected the payload")?;
        Ok(())
    }
}

/// Fallback sink when no webhook is configured: alerts land in the log.
pub struct LogAlertSink;

#[async_trait::async_trait]
impl AlertSink for LogAlertSink {
    async fn notify(&self, incident: &Incident, severity: Severity, kind: AlertKind) -> Result<()> {
        tracing::warn!(
            incident = %incident.id,
            %severity,
            %kind,
            title = %incident.title,
            "ALERT (no webhook configured)"
        );
        Ok(())
    }
}
