//! TOML configuration surface.

use crate::rules::{DetectionRule, RuleCatalog};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub integrations: Integrations,
    /// Overrides the built-in catalog when non-empty.
    #[serde(default)]
    pub rules: Vec<DetectionRule>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorSettings {
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
    /// Wait after a successful action before re-checking the rule.
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    /// Timeout applied to every signal, effector, and alert call.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_true")]
    pub auto_recovery: bool,
    /// Reported in metrics as-is; detection is synchronous here.
    #[serde(default)]
    pub detection_latency_secs: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            backoff_secs: default_backoff_secs(),
            settle_secs: default_settle_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            retention_days: default_retention_days(),
            auto_recovery: true,
            detection_latency_secs: 0,
        }
    }
}

impl MonitorSettings {
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Integrations {
    /// Base URL of the signal source; required for `serve`.
    pub signals_url: Option<String>,
    /// Base URL of the remediation effector; without it auto-recovery is
    /// forced off.
    pub effector_url: Option<String>,
    /// Webhook for human alerts; without it alerts only go to the log.
    pub alert_webhook_url: Option<String>,
}

fn default_tick_secs() -> u64 {
    30
}
fn default_backoff_secs() -> u64 {
    60
}
fn default_settle_secs() -> u64 {
    30
}
fn default_call_timeout_secs() -> u64 {
    10
}
fn default_retention_days() -> i64 {
    90
}
fn default_true() -> bool {
    true
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// The effective rule catalog: configured rules, or the built-in
    /// defaults when none are configured.
    pub fn catalog(&self) -> Result<RuleCatalog> {
        if self.rules.is_empty() {
            Ok(RuleCatalog::default_catalog())
        } else {
            Ok(RuleCatalog::new(self.rules.clone())?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::RecoveryAction;
    use crate::rules::{Severity, Trigger};

    #[test]
    fn defaults_without_file() {
        let config = Config::default();
        assert_eq!(config.monitor.tick_secs, 30);
        assert_eq!(config.monitor.backoff_secs, 60);
        assert_eq!(config.monitor.retention_days, 90);
        assert!(config.monitor.auto_recovery);
        let catalog = config.catalog().unwrap();
        assert!(catalog.enabled_count() > 0);
    }

    #[test]
    fn parse_full_config() {
        let raw = r#"
            [monitor]
            tick_secs = 10
            settle_secs = 0
            auto_recovery = false

            [integrations]
            signals_url = "http://signals.internal:9200"

            [[rules]]
            name = "search_latency"
            description = "Search latency SLO breached"
            severity = "P2"
            actions = ["cache_clear", "scale_up"]
            escalation_minutes = 20
            business_impact_score = 55
            affected_services = ["search"]
            trigger = "any-breached"
            signals = ["search_latency"]
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.monitor.tick_secs, 10);
        assert!(!config.monitor.auto_recovery);
        assert_eq!(
            config.integrations.signals_url.as_deref(),
            Some("http://signals.internal:9200")
        );

        let catalog = config.catalog().unwrap();
        assert_eq!(catalog.len(), 1);
        let rule = catalog.get("search_latency").unwrap();
        assert_eq!(rule.severity, Severity::P2);
        assert_eq!(rule.actions[0], RecoveryAction::CacheClear);
        assert!(rule.enabled);
        assert!(matches!(rule.trigger, Trigger::AnyBreached { .. }));
    }

    #[test]
    fn parse_resource_pressure_rule() {
        let raw = r#"
            [[rules]]
            name = "fleet_pressure"
            description = "CPU pressure"
            severity = "P3"
            actions = ["scale_up"]
            escalation_minutes = 30
            business_impact_score = 40
            affected_services = ["fleet"]
            trigger = "resource-pressure"
            cpu_percent = 85.0
            memory_percent = 92.0
            window_minutes = 5
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        let rule = &config.rules[0];
        assert!(matches!(
            rule.trigger,
            Trigger::ResourcePressure { cpu_percent, .. } if cpu_percent == 85.0
        ));
    }

    #[test]
    fn unknown_keys_rejected() {
        let raw = r#"
            [monitor]
            tick_seconds = 10
        "#;
        assert!(toml::from_str::<Config>(raw).is_err());
    }
}
