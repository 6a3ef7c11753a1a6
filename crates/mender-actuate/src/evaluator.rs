//! Threshold evaluator — compares a snapshot against a policy's thresholds.
//!
//! Pure: no I/O, no clock. The actuator executes whatever this returns.

use std::fmt;

use tracing::debug;

use mender_core::ActionModel;
use mender_state::{HealingAction, HealingPolicySpec, MetricsSnapshot};

/// A threshold that the snapshot exceeded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Breach {
    Latency { observed: f64, threshold: f64 },
    ErrorRate { observed: f64, threshold: f64 },
}

impl Breach {
    /// Machine-readable reason used on alerts and events.
    pub fn reason(&self) -> &'static str {
        match self {
            Breach::Latency { .. } => "LatencyExceeded",
            Breach::ErrorRate { .. } => "ErrorRateExceeded",
        }
    }
}

impl fmt::Display for Breach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Breach::Latency { observed, threshold } => write!(
                f,
                "latency {observed:.3}s exceeds threshold {threshold:.3}s"
            ),
            Breach::ErrorRate { observed, threshold } => write!(
                f,
                "error rate {:.2}% exceeds threshold {:.2}%",
                observed * 100.0,
                threshold * 100.0
            ),
        }
    }
}

/// One action the actuator should carry out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedAction {
    pub action: HealingAction,
    pub breach: Breach,
}

/// Every enabled threshold the snapshot exceeds, latency first.
pub fn breaches(spec: &HealingPolicySpec, snapshot: &MetricsSnapshot) -> Vec<Breach> {
    let mut found = Vec::new();

    let latency = spec.latency_threshold_seconds;
    if latency > 0.0 && snapshot.last_duration_seconds > latency {
        found.push(Breach::Latency {
            observed: snapshot.last_duration_seconds,
            threshold: latency,
        });
    }

    let error_rate = spec.error_rate_threshold;
    let observed = snapshot.error_rate();
    if error_rate > 0.0 && observed > error_rate {
        found.push(Breach::ErrorRate {
            observed,
            threshold: error_rate,
        });
    }

    found
}

/// Decide which actions a snapshot calls for.
///
/// - `Independent`: latency breaches scale, error-rate breaches alert; both
///   can fire in one cycle.
/// - `Single`: any breach fires the policy's own action once, defaulting
///   to an alert when the policy names none.
pub fn evaluate(
    spec: &HealingPolicySpec,
    snapshot: &MetricsSnapshot,
    model: ActionModel,
) -> Vec<PlannedAction> {
    let found = breaches(spec, snapshot);

    let plan: Vec<PlannedAction> = match model {
        ActionModel::Independent => found
            .into_iter()
            .map(|breach| PlannedAction {
                action: match breach {
                    Breach::Latency { .. } => HealingAction::Scale,
                    Breach::ErrorRate { .. } => HealingAction::Alert,
                },
                breach,
            })
            .collect(),
        ActionModel::Single => found
            .into_iter()
            .next()
            .map(|breach| PlannedAction {
                action: spec.action.unwrap_or(HealingAction::Alert),
                breach,
            })
            .into_iter()
            .collect(),
    };

    if !plan.is_empty() {
        debug!(
            ?model,
            actions = plan.len(),
            requests = snapshot.requests_total,
            errors = snapshot.errors_total,
            latency = snapshot.last_duration_seconds,
            "thresholds breached"
        );
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(latency: f64, error_rate: f64) -> HealingPolicySpec {
        HealingPolicySpec {
            pipeline_name: "build".to_string(),
            pipeline_namespace: "ci".to_string(),
            deployment_name: "web".to_string(),
            deployment_namespace: "prod".to_string(),
            latency_threshold_seconds: latency,
            error_rate_threshold: error_rate,
            action: None,
            metrics_url: None,
        }
    }

    fn snapshot(requests: f64, errors: f64, latency: f64) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: requests,
            errors_total: errors,
            last_duration_seconds: latency,
        }
    }

    #[test]
    fn latency_breach_scales() {
        let plan = evaluate(&spec(0.5, 0.0), &snapshot(10.0, 0.0, 0.8), ActionModel::Independent);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].action, HealingAction::Scale);
        assert_eq!(
            plan[0].breach,
            Breach::Latency {
                observed: 0.8,
                threshold: 0.5
            }
        );
    }

    #[test]
    fn error_rate_breach_alerts() {
        let plan = evaluate(&spec(0.0, 0.05), &snapshot(100.0, 10.0, 0.1), ActionModel::Independent);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].action, HealingAction::Alert);
        assert_eq!(plan[0].breach.reason(), "ErrorRateExceeded");
    }

    #[test]
    fn both_checks_fire_independently() {
        let plan = evaluate(&spec(0.5, 0.05), &snapshot(100.0, 10.0, 0.8), ActionModel::Independent);
        let actions: Vec<_> = plan.iter().map(|p| p.action).collect();
        assert_eq!(actions, vec![HealingAction::Scale, HealingAction::Alert]);
    }

    #[test]
    fn disabled_thresholds_never_fire() {
        for threshold in [0.0, -1.0] {
            let plan = evaluate(
                &spec(threshold, threshold),
                &snapshot(100.0, 100.0, 1000.0),
                ActionModel::Independent,
            );
            assert!(plan.is_empty(), "threshold {threshold} fired");
        }
    }

    #[test]
    fn equal_to_threshold_is_not_a_breach() {
        let plan = evaluate(&spec(0.5, 0.1), &snapshot(100.0, 10.0, 0.5), ActionModel::Independent);
        assert!(plan.is_empty());
    }

    #[test]
    fn no_requests_means_no_error_alert() {
        let plan = evaluate(&spec(0.0, 0.05), &snapshot(0.0, 50.0, 0.0), ActionModel::Independent);
        assert!(plan.is_empty());
    }

    #[test]
    fn single_model_fires_policy_action_once() {
        let mut s = spec(0.5, 0.05);
        s.action = Some(HealingAction::Restart);
        let plan = evaluate(&s, &snapshot(100.0, 10.0, 0.8), ActionModel::Single);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].action, HealingAction::Restart);
        assert!(matches!(plan[0].breach, Breach::Latency { .. }));
    }

    #[test]
    fn single_model_defaults_to_alert() {
        let plan = evaluate(&spec(0.0, 0.05), &snapshot(100.0, 10.0, 0.0), ActionModel::Single);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].action, HealingAction::Alert);
    }

    #[test]
    fn single_model_quiet_without_breach() {
        let mut s = spec(0.5, 0.05);
        s.action = Some(HealingAction::Scale);
        assert!(evaluate(&s, &snapshot(100.0, 1.0, 0.1), ActionModel::Single).is_empty());
    }

    #[test]
    fn breach_messages() {
        let latency = Breach::Latency {
            observed: 0.8,
            threshold: 0.5,
        };
        assert_eq!(latency.to_string(), "latency 0.800s exceeds threshold 0.500s");
        let errors = Breach::ErrorRate {
            observed: 0.1,
            threshold: 0.05,
        };
        assert_eq!(errors.to_string(), "error rate 10.00% exceeds threshold 5.00%");
    }
}
