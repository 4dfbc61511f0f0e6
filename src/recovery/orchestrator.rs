use crate::incident::{IncidentLifecycleManager, StateStore};
use crate::recovery::{EffectorRegistry, RecoveryAction, RecoveryPlan};
use crate::rules::{DetectionRule, DetectionRuleEngine};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Drives the ordered remediation sequence for active incidents.
///
/// One plan per incident, built on first contact and dropped on resolution.
/// Every attempt -- success or failure -- stamps the process-wide cooldown
/// tracker, and an action type inside its cooldown window is skipped without
/// being recorded, even when a different incident asks for it.
pub struct RecoveryOrchestrator {
    store: Arc<dyn StateStore>,
    effectors: Arc<EffectorRegistry>,
    engine: Arc<DetectionRuleEngine>,
    lifecycle: Arc<IncidentLifecycleManager>,
    plans: Mutex<HashMap<Uuid, RecoveryPlan>>,
    settle: Duration,
    call_timeout: Duration,
}

impl RecoveryOrchestrator {
    pub fn new(
        store: Arc<dyn StateStore>,
        effectors: Arc<EffectorRegistry>,
        engine: Arc<DetectionRuleEngine>,
        lifecycle: Arc<IncidentLifecycleManager>,
        settle: Duration,
        call_timeout: Duration,
    ) -> Self {
        Self {
            store,
            effectors,
            engine,
            lifecycle,
            plans: Mutex::new(HashMap::new()),
            settle,
            call_timeout,
        }
    }

    /// The plan for an incident, building it on first request.
    pub fn plan_for(&self, incident_id: Uuid, rule: &DetectionRule) -> RecoveryPlan {
        let mut plans = self.plans.lock().unwrap();
        plans
            .entry(incident_id)
            .or_insert_with(|| RecoveryPlan::build(incident_id, rule))
            .clone()
    }

    /// Forget the plan for a resolved incident.
    pub fn drop_plan(&self, incident_id: Uuid) {
        self.plans.lock().unwrap().remove(&incident_id);
    }

    /// Walk the incident's plan once. Returns true when the walk ended in a
    /// resolution.
    pub async fn run_plan(
        &self,
        incident_id: Uuid,
        rule: &DetectionRule,
        now: DateTime<Utc>,
    ) -> bool {
        let plan = self.plan_for(incident_id, rule);

        for action in plan.actions {
            let Some(mut incident) = self.store.get_active(incident_id) else {
                // Resolved out from under us (e.g. by the quiet-rule check).
                return false;
            };

            if let Some(last) = self.store.last_attempt(action) {
                let since = (now - last).to_std().unwrap_or(Duration::ZERO);
                if since < action.cooldown() {
                    debug!(
                        incident = %incident_id,
                        action = %action,
                        remaining_secs = (action.cooldown() - since).as_secs(),
                        "Action in cooldown, skipping"
                    );
                    continue;
                }
            }

            let success = self.execute(action, &incident).await;
            self.store.record_attempt(action, now);

            incident.recovery_actions_taken.push(crate::incident::ActionRecord {
                action,
                timestamp: now,
                success,
            });
            incident.push_event(
                now,
                "recovery_action",
                format!(
                    "{} {}",
                    action,
                    if success { "succeeded" } else { "failed" }
                ),
            );

            if success {
                match action {
                    RecoveryAction::CircuitBreaker => {
                        for service in &incident.affected_services {
                            self.store.engage_circuit_breaker(service);
                        }
                    }
                    RecoveryAction::RateLimit => {
                        for service in &incident.affected_services {
                            self.store.engage_rate_limit(service);
                        }
                    }
                    _ => {}
                }
            }

            self.store.put_active(incident);

            if success {
                // Give the action time to take effect before re-checking.
                if !self.settle.is_zero() {
                    tokio::time::sleep(self.settle).await;
                }
                if !self.engine.evaluate(rule).await {
                    info!(incident = %incident_id, action = %action, "Rule quiet after action, resolving");
                    let _ = self.lifecycle.resolve(incident_id, now).await;
                    self.drop_plan(incident_id);
                    return true;
                }
            }
        }

        false
    }

    /// Dispatch through the strategy table with a per-call timeout.
    /// Missing handler, effector error, and timeout all count as a failed
    /// attempt; the plan walk continues.
    async fn execute(&self, action: RecoveryAction, incident: &crate::incident::Incident) -> bool {
        let Some(handler) = self.effectors.handler(action) else {
            warn!(action = %action, "No effector registered");
            return false;
        };

        match tokio::time::timeout(self.call_timeout, handler.execute(action, incident)).await {
            Ok(Ok(success)) => {
                debug!(incident = %incident.id, action = %action, success, "Effector returned");
                success
            }
            Ok(Err(e)) => {
                warn!(incident = %incident.id, action = %action, "Effector failed: {e}");
                false
            }
            Err(_) => {
                warn!(incident = %incident.id, action = %action, "Effector timed out");
                false
            }
        }
    }
}
