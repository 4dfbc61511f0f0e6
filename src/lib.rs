//! opsmedic -- automated incident detection and recovery orchestration.
//!
//! A single monitoring loop evaluates detection rules against external
//! health signals, opens deduplicated incidents, drives ordered remediation
//! under per-action cooldowns, escalates stalled incidents to a human
//! exactly once, and retires resolved incidents into a bounded history that
//! feeds response-quality metrics.

pub mod adapters;
pub mod api;
pub mod config;
pub mod escalation;
pub mod incident;
pub mod metrics;
pub mod monitor;
pub mod recovery;
pub mod rules;
pub mod signal;

use crate::adapters::{HttpSignalSource, LogAlertSink, WebhookAlertSink, WebhookEffector};
use crate::api::state::AppState;
use crate::config::Config;
use crate::escalation::{AlertSink, EscalationManager};
use crate::incident::{IncidentLifecycleManager, MemoryStore, StateStore};
use crate::metrics::MetricsAggregator;
use crate::monitor::{Monitor, MonitorConfig};
use crate::recovery::{EffectorRegistry, RecoveryOrchestrator};
use crate::rules::DetectionRuleEngine;
use crate::signal::SignalSource;
use anyhow::{anyhow, Result};
use std::sync::Arc;

/// Start the opsmedic daemon: monitoring loop + dashboard API.
pub async fn serve(bind: &str, config: Config) -> Result<()> {
    let settings = config.monitor.clone();
    let catalog = config.catalog()?;
    let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());

    let signals_url = config
        .integrations
        .signals_url
        .as_deref()
        .ok_or_else(|| anyhow!("integrations.signals_url is required to serve"))?;
    let signals: Arc<dyn SignalSource> =
        Arc::new(HttpSignalSource::new(signals_url, settings.call_timeout())?);

    let alerts: Arc<dyn AlertSink> = match config.integrations.alert_webhook_url.as_deref() {
        Some(url) => Arc::new(WebhookAlertSink::new(url, settings.call_timeout())?),
        None => {
            tracing::warn!("No alert webhook configured, alerts go to the log only");
            Arc::new(LogAlertSink)
        }
    };

    let mut effectors = EffectorRegistry::new();
    let mut auto_recovery = settings.auto_recovery;
    match config.integrations.effector_url.as_deref() {
        Some(url) => {
            effectors.register_all(Arc::new(WebhookEffector::new(url, settings.call_timeout())?));
        }
        None if auto_recovery => {
            tracing::warn!("No effector configured, forcing auto-recovery off");
            auto_recovery = false;
        }
        None => {}
    }

    let engine = Arc::new(DetectionRuleEngine::new(signals, settings.call_timeout()));
    let lifecycle = Arc::new(IncidentLifecycleManager::new(
        store.clone(),
        alerts.clone(),
        settings.call_timeout(),
        settings.retention_days,
    ));
    let orchestrator = Arc::new(RecoveryOrchestrator::new(
        store.clone(),
        Arc::new(effectors),
        engine.clone(),
        lifecycle.clone(),
        settings.settle(),
        settings.call_timeout(),
    ));
    let escalation = Arc::new(EscalationManager::new(
        store.clone(),
        alerts,
        settings.call_timeout(),
    ));
    let aggregator = Arc::new(MetricsAggregator::new(
        store.clone(),
        settings.detection_latency_secs,
    ));

    let monitor = Arc::new(Monitor::new(
        catalog,
        engine,
        lifecycle,
        orchestrator,
        escalation,
        aggregator,
        store.clone(),
        MonitorConfig {
            tick: settings.tick(),
            backoff: settings.backoff(),
            auto_recovery,
        },
    ));

    tokio::spawn(monitor.clone().run());

    let app = api::router(AppState { monitor, store });
    let addr: std::net::SocketAddr = bind.parse()?;
    tracing::info!(%addr, "opsmedic listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
