//! The monitoring loop: single scheduling authority for the whole
//! subsystem.
//!
//! One tick runs to completion before the next begins; every invariant the
//! other components rely on (dedup, cooldown, one-time escalation) is
//! defined in terms of that serialization, so ticks are never parallelized.

use crate::escalation::EscalationManager;
use crate::incident::{IncidentLifecycleManager, StateStore};
use crate::metrics::MetricsAggregator;
use crate::recovery::RecoveryOrchestrator;
use crate::rules::{DetectionRuleEngine, RuleCatalog};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{error, info};

pub struct MonitorConfig {
    pub tick: Duration,
    pub backoff: Duration,
    pub auto_recovery: bool,
}

pub struct Monitor {
    catalog: RuleCatalog,
    engine: Arc<DetectionRuleEngine>,
    lifecycle: Arc<IncidentLifecycleManager>,
    orchestrator: Arc<RecoveryOrchestrator>,
    escalation: Arc<EscalationManager>,
    metrics: Arc<MetricsAggregator>,
    store: Arc<dyn StateStore>,
    config: MonitorConfig,
    shutdown: Notify,
}

impl Monitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: RuleCatalog,
        engine: Arc<DetectionRuleEngine>,
        lifecycle: Arc<IncidentLifecycleManager>,
        orchestrator: Arc<RecoveryOrchestrator>,
        escalation: Arc<EscalationManager>,
        metrics: Arc<MetricsAggregator>,
        store: Arc<dyn StateStore>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            catalog,
            engine,
            lifecycle,
            orchestrator,
            escalation,
            metrics,
            store,
            config,
            shutdown: Notify::new(),
        }
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    pub fn auto_recovery_enabled(&self) -> bool {
        self.config.auto_recovery
    }

    /// Run ticks on the configured interval until [`Monitor::stop`] is
    /// called. A failed tick is logged and followed by the backoff delay;
    /// it never terminates the loop.
    pub async fn run(self: Arc<Self>) {
        info!(
            tick_secs = self.config.tick.as_secs(),
            rules = self.catalog.enabled_count(),
            auto_recovery = self.config.auto_recovery,
            "Monitor started"
        );

        loop {
            let delay = match self.tick_at(Utc::now()).await {
                Ok(()) => self.config.tick,
                Err(e) => {
                    error!("Tick failed: {e:#}; backing off");
                    self.config.backoff
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.notified() => {
                    info!("Monitor stopping");
                    return;
                }
            }
        }
    }

    /// Cooperative stop: the current tick finishes, then the loop exits.
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }

    /// One full evaluation cycle at the given instant.
    ///
    /// Order matters: detect new incidents, process the active set
    /// (resolution, escalation, recovery), recompute metrics, purge
    /// history.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<()> {
        self.detect(now).await;
        self.process_active(now).await;
        self.metrics.recompute();
        self.lifecycle.purge_history(now);
        Ok(())
    }

    async fn detect(&self, now: DateTime<Utc>) {
        for rule in self.catalog.enabled() {
            if self.engine.evaluate(rule).await {
                // Dedup happens inside open(); a rule that keeps triggering
                // does not open a second incident.
                let _ = self.lifecycle.open(rule, now).await;
            }
        }
    }

    async fn process_active(&self, now: DateTime<Utc>) {
        for incident in self.store.list_active() {
            let Some(rule) = self.catalog.get(&incident.detection_source) else {
                continue;
            };

            // Quiet rule: resolve and move on.
            if !self.engine.evaluate(rule).await {
                let _ = self.lifecycle.resolve(incident.id, now).await;
                self.orchestrator.drop_plan(incident.id);
                continue;
            }

            self.escalation.check(incident.id, &self.catalog, now).await;

            if self.config.auto_recovery {
                self.orchestrator.run_plan(incident.id, rule, now).await;
            }
        }
    }
}
