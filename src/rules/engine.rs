use crate::rules::{DetectionRule, Trigger};
use crate::signal::SignalSource;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Evaluates detection rules against the signal source.
///
/// Evaluation is a pure read: it never touches incident state. A signal that
/// cannot be read (error or timeout) is treated as not triggering. Fail-open
/// avoids incident storms from a flaky signal source at the cost of possibly
/// masking a real outage while the source is down -- an accepted tradeoff.
pub struct DetectionRuleEngine {
    signals: Arc<dyn SignalSource>,
    call_timeout: Duration,
}

impl DetectionRuleEngine {
    pub fn new(signals: Arc<dyn SignalSource>, call_timeout: Duration) -> Self {
        Self {
            signals,
            call_timeout,
        }
    }

    /// Whether the rule is currently triggering. Disabled rules never trigger.
    pub async fn evaluate(&self, rule: &DetectionRule) -> bool {
        if !rule.enabled {
            return false;
        }

        match &rule.trigger {
            Trigger::AnyBreached { signals } => {
                for name in signals {
                    let read =
                        tokio::time::timeout(self.call_timeout, self.signals.signal_status(name))
                            .await;
                    match read {
                        Ok(Ok(status)) if status.is_breaching() => return true,
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => {
                            warn!(rule = %rule.name, signal = %name, "Signal read failed: {e}");
                        }
                        Err(_) => {
                            warn!(rule = %rule.name, signal = %name, "Signal read timed out");
                        }
                    }
                }
                false
            }
            Trigger::ResourcePressure {
                cpu_percent,
                memory_percent,
                window_minutes,
            } => {
                let window = Duration::from_secs(window_minutes * 60);
                let read =
                    tokio::time::timeout(self.call_timeout, self.signals.system_snapshot(window))
                        .await;
                match read {
                    Ok(Ok(snap)) => {
                        snap.cpu_percent >= *cpu_percent || snap.memory_percent >= *memory_percent
                    }
                    Ok(Err(e)) => {
                        warn!(rule = %rule.name, "Snapshot read failed: {e}");
                        false
                    }
                    Err(_) => {
                        warn!(rule = %rule.name, "Snapshot read timed out");
                        false
                    }
                }
            }
        }
    }
}
