//! Detection-rule catalog.

pub mod engine;

pub use self::engine::DetectionRuleEngine;

use crate::recovery::RecoveryAction;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("unknown rule: {0}")]
    UnknownRule(String),
    #[error("rule '{name}' has an empty action list")]
    EmptyActionList { name: String },
}

/// Severity tiers, P1 most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    P1,
    P2,
    P3,
    P4,
}

impl Severity {
    /// Dollars-per-hour multiplier for the revenue-impact heuristic.
    /// A deliberate approximation, not a financial model.
    pub fn revenue_multiplier(self) -> f64 {
        match self {
            Severity::P1 => 100.0,
            Severity::P2 => 50.0,
            Severity::P3 => 20.0,
            Severity::P4 => 5.0,
        }
    }

    /// Customers-affected multiplier, same linear tier-driven shape.
    pub fn customer_multiplier(self) -> f64 {
        match self {
            Severity::P1 => 25.0,
            Severity::P2 => 10.0,
            Severity::P3 => 4.0,
            Severity::P4 => 1.0,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::P1 => write!(f, "P1"),
            Severity::P2 => write!(f, "P2"),
            Severity::P3 => write!(f, "P3"),
            Severity::P4 => write!(f, "P4"),
        }
    }
}

/// How a rule decides it is triggering.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "trigger", rename_all = "kebab-case")]
pub enum Trigger {
    /// Any of the named signals reads BREACHED or CRITICAL.
    AnyBreached { signals: Vec<String> },
    /// CPU or memory percentage over the threshold in the snapshot window.
    ResourcePressure {
        cpu_percent: f64,
        memory_percent: f64,
        window_minutes: u64,
    },
}

/// A static catalog entry describing one failure mode and its response.
/// Immutable once loaded; only `enabled` is meant to be toggled.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DetectionRule {
    pub name: String,
    pub description: String,
    pub severity: Severity,
    /// Ordered remediation attempts.
    pub actions: Vec<RecoveryAction>,
    /// Minutes before an unresolved incident is handed to a human.
    pub escalation_minutes: i64,
    /// 1-100, feeds the revenue/customer heuristics.
    pub business_impact_score: u32,
    pub affected_services: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub trigger: Trigger,
}

fn default_enabled() -> bool {
    true
}

/// The loaded rule set.
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    rules: Vec<DetectionRule>,
}

impl RuleCatalog {
    pub fn new(rules: Vec<DetectionRule>) -> Result<Self, RuleError> {
        for rule in &rules {
            if rule.actions.is_empty() {
                return Err(RuleError::EmptyActionList {
                    name: rule.name.clone(),
                });
            }
        }
        Ok(Self { rules })
    }

    /// Built-in catalog used when no `[[rules]]` are configured.
    pub fn default_catalog() -> Self {
        Self {
            rules: vec![
                DetectionRule {
                    name: "database_outage".into(),
                    description: "Primary database unreachable or error budget exhausted".into(),
                    severity: Severity::P1,
                    actions: vec![
                        RecoveryAction::Failover,
                        RecoveryAction::RestartService,
                        RecoveryAction::AlertHuman,
                    ],
                    escalation_minutes: 5,
                    business_impact_score: 95,
                    affected_services: vec!["database".into(), "api".into()],
                    enabled: true,
                    trigger: Trigger::AnyBreached {
                        signals: vec!["db_availability".into(), "db_error_budget".into()],
                    },
                },
                DetectionRule {
                    name: "api_error_budget_burn".into(),
                    description: "API error budget burning faster than policy allows".into(),
                    severity: Severity::P2,
                    actions: vec![
                        RecoveryAction::CircuitBreaker,
                        RecoveryAction::RateLimit,
                        RecoveryAction::Rollback,
                    ],
                    escalation_minutes: 15,
                    business_impact_score: 70,
                    affected_services: vec!["api".into()],
                    enabled: true,
                    trigger: Trigger::AnyBreached {
                        signals: vec!["api_error_budget".into()],
                    },
                },
                DetectionRule {
                    name: "checkout_latency".into(),
                    description: "Checkout latency SLO breached".into(),
                    severity: Severity::P2,
                    actions: vec![
                        RecoveryAction::CacheClear,
                        RecoveryAction::ScaleUp,
                    ],
                    escalation_minutes: 20,
                    business_impact_score: 60,
                    affected_services: vec!["checkout".into()],
                    enabled: true,
                    trigger: Trigger::AnyBreached {
                        signals: vec!["checkout_latency".into()],
                    },
                },
                DetectionRule {
                    name: "resource_pressure".into(),
                    description: "Sustained CPU or memory pressure on the fleet".into(),
                    severity: Severity::P3,
                    actions: vec![RecoveryAction::ScaleUp, RecoveryAction::RestartService],
                    escalation_minutes: 30,
                    business_impact_score: 40,
                    affected_services: vec!["fleet".into()],
                    enabled: true,
                    trigger: Trigger::ResourcePressure {
                        cpu_percent: 90.0,
                        memory_percent: 90.0,
                        window_minutes: 5,
                    },
                },
            ],
        }
    }

    pub fn get(&self, name: &str) -> Option<&DetectionRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DetectionRule> {
        self.rules.iter()
    }

    /// Enabled rules only, in catalog order.
    pub fn enabled(&self) -> impl Iterator<Item = &DetectionRule> {
        self.rules.iter().filter(|r| r.enabled)
    }

    pub fn enabled_count(&self) -> usize {
        self.rules.iter().filter(|r| r.enabled).count()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_is_sane() {
        let catalog = RuleCatalog::default_catalog();
        assert!(catalog.len() >= 4);
        assert_eq!(catalog.enabled_count(), catalog.len());
        let db = catalog.get("database_outage").unwrap();
        assert_eq!(db.severity, Severity::P1);
        assert!(!db.actions.is_empty());
    }

    #[test]
    fn empty_action_list_rejected() {
        let mut rules = RuleCatalog::default_catalog().rules;
        rules[0].actions.clear();
        assert!(RuleCatalog::new(rules).is_err());
    }

    #[test]
    fn severity_multipliers_are_ordered() {
        assert!(Severity::P1.revenue_multiplier() > Severity::P2.revenue_multiplier());
        assert!(Severity::P3.revenue_multiplier() > Severity::P4.revenue_multiplier());
    }
}
