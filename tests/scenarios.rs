//! End-to-end control-loop scenarios driven tick by tick with fake
//! collaborators and explicit timestamps.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use opsmedic::escalation::{AlertKind, AlertSink, EscalationManager};
use opsmedic::incident::{
    Incident, IncidentLifecycleManager, IncidentStatus, MemoryStore, StateStore,
};
use opsmedic::metrics::MetricsAggregator;
use opsmedic::monitor::{Monitor, MonitorConfig};
use opsmedic::recovery::{Effector, EffectorRegistry, RecoveryAction, RecoveryOrchestrator};
use opsmedic::rules::{DetectionRule, DetectionRuleEngine, RuleCatalog, Severity, Trigger};
use opsmedic::signal::{SignalSource, SignalStatus, SystemSnapshot};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
struct FakeSignals {
    statuses: Mutex<HashMap<String, SignalStatus>>,
}

impl FakeSignals {
    fn set(&self, name: &str, status: SignalStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(name.to_string(), status);
    }
}

#[async_trait::async_trait]
impl SignalSource for FakeSignals {
    async fn signal_status(&self, name: &str) -> Result<SignalStatus> {
        // Unknown signals read healthy, so unrelated rules stay quiet.
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .unwrap_or(SignalStatus::Ok))
    }

    async fn system_snapshot(&self, _window: Duration) -> Result<SystemSnapshot> {
        Ok(SystemSnapshot::default())
    }
}

#[derive(Clone)]
enum Outcome {
    Fail,
    Error,
    /// Succeed and flip the named signal back to OK, simulating a
    /// remediation that actually worked.
    SucceedClearing(String),
}

struct FakeEffector {
    signals: Arc<FakeSignals>,
    outcomes: Mutex<HashMap<RecoveryAction, Outcome>>,
    calls: Mutex<Vec<(RecoveryAction, Uuid)>>,
}

impl FakeEffector {
    fn new(signals: Arc<FakeSignals>) -> Self {
        Self {
            signals,
            outcomes: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn set_outcome(&self, action: RecoveryAction, outcome: Outcome) {
        self.outcomes.lock().unwrap().insert(action, outcome);
    }

    fn calls(&self) -> Vec<(RecoveryAction, Uuid)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Effector for FakeEffector {
    async fn execute(&self, action: RecoveryAction, incident: &Incident) -> Result<bool> {
        self.calls.lock().unwrap().push((action, incident.id));
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .get(&action)
            .cloned()
            .unwrap_or(Outcome::Fail);
        match outcome {
            Outcome::Fail => Ok(false),
            Outcome::Error => Err(anyhow!("effector blew up")),
            Outcome::SucceedClearing(signal) => {
                self.signals.set(&signal, SignalStatus::Ok);
                Ok(true)
            }
        }
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<(Uuid, AlertKind)>>,
}

impl RecordingSink {
    fn count(&self, kind: AlertKind) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, k)| *k == kind)
            .count()
    }
}

#[async_trait::async_trait]
impl AlertSink for RecordingSink {
    async fn notify(
        &self,
        incident: &Incident,
        _severity: Severity,
        kind: AlertKind,
    ) -> Result<()> {
        self.events.lock().unwrap().push((incident.id, kind));
        Ok(())
    }
}

fn rule(
    name: &str,
    signal: &str,
    actions: Vec<RecoveryAction>,
    escalation_minutes: i64,
) -> DetectionRule {
    DetectionRule {
        name: name.to_string(),
        description: format!("test rule {name}"),
        severity: Severity::P1,
        actions,
        escalation_minutes,
        business_impact_score: 90,
        affected_services: vec![format!("{name}-svc")],
        enabled: true,
        trigger: Trigger::AnyBreached {
            signals: vec![signal.to_string()],
        },
    }
}

struct Harness {
    monitor: Monitor,
    store: Arc<MemoryStore>,
    signals: Arc<FakeSignals>,
    effector: Arc<FakeEffector>,
    sink: Arc<RecordingSink>,
}

impl Harness {
    fn new(rules: Vec<DetectionRule>, auto_recovery: bool) -> Self {
        let catalog = RuleCatalog::new(rules).unwrap();
        let store = Arc::new(MemoryStore::new());
        let store_dyn: Arc<dyn StateStore> = store.clone();
        let signals = Arc::new(FakeSignals::default());
        let effector = Arc::new(FakeEffector::new(signals.clone()));
        let sink = Arc::new(RecordingSink::default());
        let timeout = Duration::from_secs(1);

        let engine = Arc::new(DetectionRuleEngine::new(signals.clone(), timeout));
        let lifecycle = Arc::new(IncidentLifecycleManager::new(
            store_dyn.clone(),
            sink.clone(),
            timeout,
            90,
        ));
        let mut registry = EffectorRegistry::new();
        registry.register_all(effector.clone());
        let orchestrator = Arc::new(RecoveryOrchestrator::new(
            store_dyn.clone(),
            Arc::new(registry),
            engine.clone(),
            lifecycle.clone(),
            Duration::ZERO, // no settle wait in tests
            timeout,
        ));
        let escalation = Arc::new(EscalationManager::new(
            store_dyn.clone(),
            sink.clone(),
            timeout,
        ));
        let aggregator = Arc::new(MetricsAggregator::new(store_dyn.clone(), 0));

        let monitor = Monitor::new(
            catalog,
            engine,
            lifecycle,
            orchestrator,
            escalation,
            aggregator,
            store_dyn,
            MonitorConfig {
                tick: Duration::from_secs(30),
                backoff: Duration::from_secs(60),
                auto_recovery,
            },
        );

        Self {
            monitor,
            store,
            signals,
            effector,
            sink,
        }
    }

    async fn tick(&self, now: DateTime<Utc>) {
        self.monitor.tick_at(now).await.unwrap();
    }
}

#[tokio::test]
async fn repeated_triggering_opens_exactly_one_incident() {
    // Scenario C: the rule fires in consecutive ticks before resolution.
    let h = Harness::new(
        vec![rule("database_outage", "db", vec![RecoveryAction::AlertHuman], 60)],
        true,
    );
    h.signals.set("db", SignalStatus::Breached);

    let t0 = Utc::now();
    h.tick(t0).await;
    h.tick(t0 + ChronoDuration::seconds(30)).await;
    h.tick(t0 + ChronoDuration::seconds(60)).await;

    let active = h.store.list_active();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].detection_source, "database_outage");
    assert_eq!(active[0].status, IncidentStatus::Investigating);
    assert_eq!(h.sink.count(AlertKind::Detected), 1);
}

#[tokio::test]
async fn quiet_rule_resolves_within_one_tick() {
    let h = Harness::new(
        vec![rule("api_outage", "api", vec![RecoveryAction::RestartService], 60)],
        false,
    );
    h.signals.set("api", SignalStatus::Critical);

    let t0 = Utc::now();
    h.tick(t0).await;
    assert_eq!(h.store.list_active().len(), 1);

    h.signals.set("api", SignalStatus::Ok);
    let t1 = t0 + ChronoDuration::seconds(30);
    h.tick(t1).await;

    assert!(h.store.list_active().is_empty());
    let history = h.store.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, IncidentStatus::Resolved);
    assert_eq!(history[0].resolved_at, Some(t1));
    assert!(history[0].has_event("incident_resolved"));
    assert_eq!(h.sink.count(AlertKind::Resolved), 1);
}

#[tokio::test]
async fn successful_action_resolves_in_same_tick() {
    // Scenario B: plan = [cache_clear], effector succeeds, re-evaluation
    // after the settle period reads the rule as quiet.
    let h = Harness::new(
        vec![rule("cache_storm", "cache", vec![RecoveryAction::CacheClear], 60)],
        true,
    );
    h.signals.set("cache", SignalStatus::Breached);
    h.effector.set_outcome(
        RecoveryAction::CacheClear,
        Outcome::SucceedClearing("cache".into()),
    );

    let t0 = Utc::now();
    h.tick(t0).await;

    assert!(h.store.list_active().is_empty());
    let history = h.store.history();
    assert_eq!(history.len(), 1);
    let incident = &history[0];
    assert_eq!(incident.status, IncidentStatus::Resolved);
    assert_eq!(incident.resolved_at, Some(t0));
    assert_eq!(incident.recovery_actions_taken.len(), 1);
    assert!(incident.recovery_actions_taken[0].success);
    assert_eq!(
        incident.recovery_actions_taken[0].action,
        RecoveryAction::CacheClear
    );
}

#[tokio::test]
async fn cooldown_is_shared_across_incidents() {
    // Scenario D: incident X attempts restart_service at t0; incident Y
    // wants the same action type at t0+120s and must be skipped silently.
    let h = Harness::new(
        vec![
            rule("outage_x", "sig_x", vec![RecoveryAction::RestartService], 60),
            rule("outage_y", "sig_y", vec![RecoveryAction::RestartService], 60),
        ],
        true,
    );
    h.signals.set("sig_x", SignalStatus::Breached);

    let t0 = Utc::now();
    h.tick(t0).await;
    assert_eq!(h.effector.calls().len(), 1);

    h.signals.set("sig_y", SignalStatus::Breached);
    h.tick(t0 + ChronoDuration::seconds(120)).await;

    // Y opened but its restart_service attempt was inside the 5 min
    // cooldown window: not invoked, not recorded.
    let active = h.store.list_active();
    assert_eq!(active.len(), 2);
    let y = active
        .iter()
        .find(|i| i.detection_source == "outage_y")
        .unwrap();
    assert!(y.recovery_actions_taken.is_empty());
    assert_eq!(h.effector.calls().len(), 1);

    // Past the cooldown the action is attempted again.
    h.tick(t0 + ChronoDuration::seconds(301)).await;
    assert_eq!(h.effector.calls().len(), 2);
}

#[tokio::test]
async fn escalation_fires_once_at_threshold() {
    // Scenario A: continuous triggering for 10 minutes with failing
    // remediation and a 3 minute escalation threshold.
    let h = Harness::new(
        vec![rule(
            "database_outage",
            "db",
            vec![RecoveryAction::RestartService],
            3,
        )],
        true,
    );
    h.signals.set("db", SignalStatus::Breached);

    let t0 = Utc::now();
    let mut now = t0;
    while now <= t0 + ChronoDuration::minutes(10) {
        h.tick(now).await;
        now += ChronoDuration::seconds(30);
    }

    let active = h.store.list_active();
    assert_eq!(active.len(), 1);
    let incident = &active[0];

    let escalations: Vec<_> = incident
        .timeline
        .iter()
        .filter(|e| e.event == "escalated")
        .collect();
    assert_eq!(escalations.len(), 1);
    assert!(escalations[0].timestamp >= t0 + ChronoDuration::minutes(3));
    assert_eq!(h.sink.count(AlertKind::Escalated), 1);
}

#[tokio::test]
async fn effector_error_is_a_failed_attempt_not_fatal() {
    let h = Harness::new(
        vec![rule(
            "flaky",
            "flaky_sig",
            vec![RecoveryAction::Failover, RecoveryAction::CacheClear],
            60,
        )],
        true,
    );
    h.signals.set("flaky_sig", SignalStatus::Breached);
    h.effector.set_outcome(RecoveryAction::Failover, Outcome::Error);

    let t0 = Utc::now();
    h.tick(t0).await;

    // Both plan steps ran: the error was recorded as a failure and the
    // walk continued to the next action.
    let active = h.store.list_active();
    assert_eq!(active.len(), 1);
    let records = &active[0].recovery_actions_taken;
    assert_eq!(records.len(), 2);
    assert!(!records[0].success);
    assert!(!records[1].success);
}

#[tokio::test]
async fn circuit_breaker_flags_set_and_released() {
    let h = Harness::new(
        vec![rule(
            "api_burn",
            "api_sig",
            vec![RecoveryAction::CircuitBreaker],
            60,
        )],
        true,
    );
    h.signals.set("api_sig", SignalStatus::Breached);
    // Succeeds but the rule keeps triggering, so the incident stays open
    // with the breaker engaged.
    h.effector.set_outcome(
        RecoveryAction::CircuitBreaker,
        Outcome::SucceedClearing("unrelated".into()),
    );

    let t0 = Utc::now();
    h.tick(t0).await;
    assert_eq!(h.store.circuit_breaker_count(), 1);

    h.signals.set("api_sig", SignalStatus::Ok);
    h.tick(t0 + ChronoDuration::seconds(30)).await;
    assert_eq!(h.store.circuit_breaker_count(), 0);
}

#[tokio::test]
async fn auto_recovery_off_still_detects_and_escalates() {
    let h = Harness::new(
        vec![rule(
            "frozen",
            "frozen_sig",
            vec![RecoveryAction::RestartService],
            1,
        )],
        false,
    );
    h.signals.set("frozen_sig", SignalStatus::Breached);

    let t0 = Utc::now();
    h.tick(t0).await;
    h.tick(t0 + ChronoDuration::minutes(2)).await;

    assert_eq!(h.store.list_active().len(), 1);
    assert!(h.effector.calls().is_empty());
    assert_eq!(h.sink.count(AlertKind::Escalated), 1);
}

#[tokio::test]
async fn metrics_rates_are_complementary() {
    let h = Harness::new(
        vec![
            rule("quick", "quick_sig", vec![RecoveryAction::CacheClear], 60),
            rule("slow", "slow_sig", vec![RecoveryAction::RestartService], 1),
        ],
        true,
    );

    // One incident resolves cleanly.
    h.signals.set("quick_sig", SignalStatus::Breached);
    h.effector.set_outcome(
        RecoveryAction::CacheClear,
        Outcome::SucceedClearing("quick_sig".into()),
    );
    let t0 = Utc::now();
    h.tick(t0).await;

    // The other escalates first, then resolves.
    h.signals.set("slow_sig", SignalStatus::Breached);
    h.tick(t0 + ChronoDuration::minutes(2)).await;
    h.tick(t0 + ChronoDuration::minutes(3)).await; // past the 1 min threshold
    h.signals.set("slow_sig", SignalStatus::Ok);
    h.tick(t0 + ChronoDuration::minutes(4)).await;

    let metrics = h.store.metrics();
    assert_eq!(metrics.total_incidents, 2);
    assert_eq!(metrics.recovery_success_rate + metrics.escalation_rate, 100.0);
    assert_eq!(metrics.recovery_success_rate, 50.0);
    assert!(metrics.business_impact_prevented > 0.0);
}

#[tokio::test]
async fn retention_purges_resolved_but_keeps_active() {
    // Scenario E: a 91-day-old resolved incident is purged; an active
    // incident of the same age survives.
    let h = Harness::new(
        vec![rule("ancient", "ancient_sig", vec![RecoveryAction::AlertHuman], 60)],
        false,
    );

    let old = Utc::now() - ChronoDuration::days(91);
    let ancient_rule = h.monitor.catalog().get("ancient").unwrap().clone();

    let mut resolved = Incident::from_rule(&ancient_rule, old);
    resolved.status = IncidentStatus::Resolved;
    resolved.resolved_at = Some(old + ChronoDuration::minutes(10));
    h.store.push_history(resolved);

    let lingering = Incident::from_rule(&ancient_rule, old);
    assert!(h.store.insert_active_if_absent(lingering));
    h.signals.set("ancient_sig", SignalStatus::Breached);

    h.tick(Utc::now()).await;

    assert!(h.store.history().is_empty());
    assert_eq!(h.store.list_active().len(), 1);
}

#[tokio::test]
async fn stop_is_honored_at_tick_boundary() {
    let h = Harness::new(
        vec![rule("idle", "idle_sig", vec![RecoveryAction::AlertHuman], 60)],
        false,
    );
    let monitor = Arc::new(h.monitor);
    let runner = tokio::spawn(monitor.clone().run());

    tokio::time::sleep(Duration::from_millis(50)).await;
    monitor.stop();

    tokio::time::timeout(Duration::from_secs(2), runner)
        .await
        .expect("monitor did not stop")
        .unwrap();
}
