//! Shared orchestration state behind an injected store.
//!
//! The monitor task is the single writer; everything the control loop
//! mutates between ticks (active incidents, resolved history, the
//! process-wide cooldown tracker, circuit-breaker and rate-limiter flags)
//! lives behind [`StateStore`] so tests can substitute a store and a
//! multi-instance deployment can back the trait with an external keyed
//! store. Correctness of dedup, cooldown and one-time escalation assumes a
//! single writer.

use crate::incident::Incident;
use crate::metrics::IncidentMetrics;
use crate::recovery::RecoveryAction;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use uuid::Uuid;

pub trait StateStore: Send + Sync {
    /// Insert an incident into the active set unless one already exists for
    /// the same detection source. Returns false (and drops the incident)
    /// when a duplicate is present. Check and insert are atomic.
    fn insert_active_if_absent(&self, incident: Incident) -> bool;

    /// Active incidents ordered by detection time.
    fn list_active(&self) -> Vec<Incident>;

    fn get_active(&self, id: Uuid) -> Option<Incident>;

    /// Write back a mutated active incident. No-op if it left the set.
    fn put_active(&self, incident: Incident);

    fn remove_active(&self, id: Uuid) -> Option<Incident>;

    /// Append a resolved incident to the bounded history.
    fn push_history(&self, incident: Incident);

    fn history(&self) -> Vec<Incident>;

    /// Drop history entries detected before the cutoff. Returns how many.
    fn purge_history_before(&self, cutoff: DateTime<Utc>) -> usize;

    fn last_attempt(&self, action: RecoveryAction) -> Option<DateTime<Utc>>;

    /// Stamp the cooldown tracker; called after every attempt regardless of
    /// outcome.
    fn record_attempt(&self, action: RecoveryAction, at: DateTime<Utc>);

    fn engage_circuit_breaker(&self, service: &str);
    fn engage_rate_limit(&self, service: &str);
    /// Clear both flags for a service; called when an incident resolves.
    fn release_service(&self, service: &str);
    fn circuit_breaker_count(&self) -> usize;
    fn rate_limit_count(&self) -> usize;

    fn set_metrics(&self, metrics: IncidentMetrics);
    fn metrics(&self) -> IncidentMetrics;
}

#[derive(Default)]
struct Inner {
    active: HashMap<Uuid, Incident>,
    history: VecDeque<Incident>,
    cooldowns: HashMap<RecoveryAction, DateTime<Utc>>,
    circuit_breakers: HashSet<String>,
    rate_limiters: HashSet<String>,
    metrics: IncidentMetrics,
}

/// In-memory store for a single-instance deployment.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn insert_active_if_absent(&self, incident: Incident) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let duplicate = inner
            .active
            .values()
            .any(|i| i.detection_source == incident.detection_source);
        if duplicate {
            return false;
        }
        inner.active.insert(incident.id, incident);
        true
    }

    fn list_active(&self) -> Vec<Incident> {
        let inner = self.inner.lock().unwrap();
        let mut active: Vec<Incident> = inner.active.values().cloned().collect();
        active.sort_by_key(|i| i.detected_at);
        active
    }

    fn get_active(&self, id: Uuid) -> Option<Incident> {
        self.inner.lock().unwrap().active.get(&id).cloned()
    }

    fn put_active(&self, incident: Incident) {
        let mut inner = self.inner.lock().unwrap();
        if inner.active.contains_key(&incident.id) {
            inner.active.insert(incident.id, incident);
        }
    }

    fn remove_active(&self, id: Uuid) -> Option<Incident> {
        self.inner.lock().unwrap().active.remove(&id)
    }

    fn push_history(&self, incident: Incident) {
        self.inner.lock().unwrap().history.push_back(incident);
    }

    fn history(&self) -> Vec<Incident> {
        self.inner.lock().unwrap().history.iter().cloned().collect()
    }

    fn purge_history_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.history.len();
        // Oldest entries sit at the front; history is append-ordered.
        while inner
            .history
            .front()
            .is_some_and(|i| i.detected_at < cutoff)
        {
            inner.history.pop_front();
        }
        // Out-of-order stragglers (e.g. replayed history) still get evicted.
        inner.history.retain(|i| i.detected_at >= cutoff);
        before - inner.history.len()
    }

    fn last_attempt(&self, action: RecoveryAction) -> Option<DateTime<Utc>> {
        self.inner.lock().unwrap().cooldowns.get(&action).copied()
    }

    fn record_attempt(&self, action: RecoveryAction, at: DateTime<Utc>) {
        self.inner.lock().unwrap().cooldowns.insert(action, at);
    }

    fn engage_circuit_breaker(&self, service: &str) {
        self.inner
            .lock()
            .unwrap()
            .circuit_breakers
            .insert(service.to_string());
    }

    fn engage_rate_limit(&self, service: &str) {
        self.inner
            .lock()
            .unwrap()
            .rate_limiters
            .insert(service.to_string());
    }

    fn release_service(&self, service: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.circuit_breakers.remove(service);
        inner.rate_limiters.remove(service);
    }

    fn circuit_breaker_count(&self) -> usize {
        self.inner.lock().unwrap().circuit_breakers.len()
    }

    fn rate_limit_count(&self) -> usize {
        self.inner.lock().unwrap().rate_limiters.len()
    }

    fn set_metrics(&self, metrics: IncidentMetrics) {
        self.inner.lock().unwrap().metrics = metrics;
    }

    fn metrics(&self) -> IncidentMetrics {
        self.inner.lock().unwrap().metrics.clone()
    }
}
