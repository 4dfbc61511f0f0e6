use crate::recovery::RecoveryAction;
use crate::rules::DetectionRule;
use uuid::Uuid;

/// The ordered response to one incident.
///
/// Built once when the incident opens, from the rule as it was at that
/// moment; immutable afterwards and discarded on resolution.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RecoveryPlan {
    pub incident_id: Uuid,
    pub actions: Vec<RecoveryAction>,
    pub estimated_recovery_minutes: u64,
    pub success_criteria: Vec<String>,
    pub rollback_plan: Vec<String>,
    /// Minutes before a human takes over, copied from the rule.
    pub human_intervention_minutes: i64,
}

impl RecoveryPlan {
    pub fn build(incident_id: Uuid, rule: &DetectionRule) -> Self {
        let estimated_recovery_minutes = rule
            .actions
            .iter()
            .map(|a| a.estimated_duration().as_secs() / 60)
            .sum();

        Self {
            incident_id,
            actions: rule.actions.clone(),
            estimated_recovery_minutes,
            success_criteria: vec![
                format!("Rule '{}' stops triggering", rule.name),
                "Affected services report healthy signals".into(),
            ],
            rollback_plan: vec![
                "Stop remediation and keep the incident open".into(),
                "Escalate to the on-call responder".into(),
            ],
            human_intervention_minutes: rule.escalation_minutes,
        }
    }
}
