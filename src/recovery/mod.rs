//! Recovery actions, effector boundary, and plan execution.

pub mod orchestrator;
pub mod plan;

pub use self::orchestrator::RecoveryOrchestrator;
pub use self::plan::RecoveryPlan;

use crate::incident::Incident;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Remediation action types a rule can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    RestartService,
    ScaleUp,
    Failover,
    CircuitBreaker,
    RateLimit,
    CacheClear,
    Rollback,
    AlertHuman,
}

impl RecoveryAction {
    /// Nominal duration used to estimate total recovery time for a plan.
    pub fn estimated_duration(self) -> Duration {
        let minutes = match self {
            RecoveryAction::RestartService => 3,
            RecoveryAction::ScaleUp => 5,
            RecoveryAction::Failover => 2,
            RecoveryAction::CircuitBreaker => 1,
            RecoveryAction::RateLimit => 1,
            RecoveryAction::CacheClear => 1,
            RecoveryAction::Rollback => 10,
            RecoveryAction::AlertHuman => 0,
        };
        Duration::from_secs(minutes * 60)
    }

    /// Minimum gap between two attempts of this action type, process-wide.
    pub fn cooldown(self) -> Duration {
        let minutes = match self {
            RecoveryAction::RestartService => 5,
            RecoveryAction::ScaleUp => 10,
            RecoveryAction::Failover => 15,
            RecoveryAction::Rollback => 30,
            _ => 1,
        };
        Duration::from_secs(minutes * 60)
    }
}

impl std::fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecoveryAction::RestartService => "restart_service",
            RecoveryAction::ScaleUp => "scale_up",
            RecoveryAction::Failover => "failover",
            RecoveryAction::CircuitBreaker => "circuit_breaker",
            RecoveryAction::RateLimit => "rate_limit",
            RecoveryAction::CacheClear => "cache_clear",
            RecoveryAction::Rollback => "rollback",
            RecoveryAction::AlertHuman => "alert_human",
        };
        write!(f, "{s}")
    }
}

/// Executes one remediation action against the real world.
///
/// An `Err` or a timeout is a failed attempt, never fatal to the loop.
#[async_trait::async_trait]
pub trait Effector: Send + Sync {
    async fn execute(&self, action: RecoveryAction, incident: &Incident) -> Result<bool>;
}

/// Strategy table mapping action types to effector handlers.
///
/// The orchestrator dispatches through this table instead of branching on
/// the action type, so new actions only need an enum variant and a
/// registration.
#[derive(Default)]
pub struct EffectorRegistry {
    handlers: HashMap<RecoveryAction, Arc<dyn Effector>>,
}

impl EffectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, action: RecoveryAction, handler: Arc<dyn Effector>) {
        self.handlers.insert(action, handler);
    }

    /// Register one handler for every action type.
    pub fn register_all(&mut self, handler: Arc<dyn Effector>) {
        for action in [
            RecoveryAction::RestartService,
            RecoveryAction::ScaleUp,
            RecoveryAction::Failover,
            RecoveryAction::CircuitBreaker,
            RecoveryAction::RateLimit,
            RecoveryAction::CacheClear,
            RecoveryAction::Rollback,
            RecoveryAction::AlertHuman,
        ] {
            self.handlers.insert(action, handler.clone());
        }
    }

    pub fn handler(&self, action: RecoveryAction) -> Option<&Arc<dyn Effector>> {
        self.handlers.get(&action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_table() {
        assert_eq!(
            RecoveryAction::Rollback.estimated_duration(),
            Duration::from_secs(600)
        );
        assert_eq!(
            RecoveryAction::AlertHuman.estimated_duration(),
            Duration::ZERO
        );
    }

    #[test]
    fn cooldown_table() {
        assert_eq!(
            RecoveryAction::Failover.cooldown(),
            Duration::from_secs(900)
        );
        assert_eq!(
            RecoveryAction::CacheClear.cooldown(),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn action_names_round_trip() {
        let json = serde_json::to_string(&RecoveryAction::RestartService).unwrap();
        assert_eq!(json, "\"restart_service\"");
        assert_eq!(RecoveryAction::RestartService.to_string(), "restart_service");
    }
}
