//! Health-signal boundary.
//!
//! The orchestrator never computes SLO or resource health itself; it reads
//! a status per named signal from a [`SignalSource`] and acts on it.

use anyhow::Result;
use std::time::Duration;

/// Status of a named health signal as reported by the signal source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalStatus {
    Ok,
    Warning,
    Breached,
    Critical,
}

impl SignalStatus {
    /// Whether this status counts as a trigger for `any-breached` rules.
    pub fn is_breaching(self) -> bool {
        matches!(self, SignalStatus::Breached | SignalStatus::Critical)
    }
}

impl std::fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalStatus::Ok => write!(f, "ok"),
            SignalStatus::Warning => write!(f, "warning"),
            SignalStatus::Breached => write!(f, "breached"),
            SignalStatus::Critical => write!(f, "critical"),
        }
    }
}

/// Resource snapshot used by resource-pressure rules.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct SystemSnapshot {
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

/// Source of health signals consumed by the rule engine.
///
/// Calls may block on I/O; the rule engine wraps every call in a timeout and
/// treats errors as "not triggering" (fail-open).
#[async_trait::async_trait]
pub trait SignalSource: Send + Sync {
    /// Current status of a named signal.
    async fn signal_status(&self, name: &str) -> Result<SignalStatus>;

    /// Resource snapshot aggregated over the given window.
    async fn system_snapshot(&self, window: Duration) -> Result<SystemSnapshot>;
}
