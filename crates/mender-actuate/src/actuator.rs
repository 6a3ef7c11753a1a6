//! Actuator — carries out planned actions against the deployment and the
//! alert channel.
//!
//! A failing action is logged and reported; it never stops the remaining
//! actions of the same plan.

use tracing::{info, warn};

use mender_state::*;

use crate::evaluator::PlannedAction;

/// What happened to one planned action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Scaled { from: i32, to: i32 },
    Restarted,
    Alerted,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionReport {
    pub action: HealingAction,
    pub outcome: ActionOutcome,
}

impl ActionReport {
    pub fn succeeded(&self) -> bool {
        !matches!(self.outcome, ActionOutcome::Failed(_))
    }
}

pub struct Actuator<'a> {
    deployments: &'a dyn Deployments,
    notifier: &'a dyn Notifier,
}

impl<'a> Actuator<'a> {
    pub fn new(deployments: &'a dyn Deployments, notifier: &'a dyn Notifier) -> Self {
        Self {
            deployments,
            notifier,
        }
    }

    /// Execute every planned action in order.
    pub async fn execute(
        &self,
        policy: &HealingPolicy,
        plan: &[PlannedAction],
    ) -> Vec<ActionReport> {
        let mut reports = Vec::with_capacity(plan.len());
        for planned in plan {
            let outcome = match planned.action {
                HealingAction::Scale => self.scale_up(policy, planned).await,
                HealingAction::Restart => self.restart(policy, planned).await,
                HealingAction::Alert => self.alert(policy, planned).await,
            };
            reports.push(ActionReport {
                action: planned.action,
                outcome,
            });
        }
        reports
    }

    /// Add exactly one replica.
    async fn scale_up(&self, policy: &HealingPolicy, planned: &PlannedAction) -> ActionOutcome {
        let key = policy.key();
        let ns = policy.spec.deployment_namespace.as_str();
        let name = policy.spec.deployment_name.as_str();

        let current = match self.deployments.replicas(ns, name).await {
            Ok(n) => n,
            Err(e) => {
                warn!(policy = %key, deployment = %name, error = %e, "failed to read replicas");
                return ActionOutcome::Failed(e.to_string());
            }
        };

        let desired = current.saturating_add(1);
        match self.deployments.set_replicas(ns, name, desired).await {
            Ok(()) => {
                info!(
                    policy = %key,
                    deployment = %name,
                    from = current,
                    to = desired,
                    breach = %planned.breach,
                    "deployment scaled up"
                );
                ActionOutcome::Scaled {
                    from: current,
                    to: desired,
                }
            }
            Err(e) => {
                warn!(policy = %key, deployment = %name, error = %e, "failed to scale deployment");
                ActionOutcome::Failed(e.to_string())
            }
        }
    }

    async fn restart(&self, policy: &HealingPolicy, planned: &PlannedAction) -> ActionOutcome {
        let key = policy.key();
        let ns = policy.spec.deployment_namespace.as_str();
        let name = policy.spec.deployment_name.as_str();

        match self.deployments.restart(ns, name).await {
            Ok(()) => {
                info!(policy = %key, deployment = %name, breach = %planned.breach, "deployment restarted");
                ActionOutcome::Restarted
            }
            Err(e) => {
                warn!(policy = %key, deployment = %name, error = %e, "failed to restart deployment");
                ActionOutcome::Failed(e.to_string())
            }
        }
    }

    async fn alert(&self, policy: &HealingPolicy, planned: &PlannedAction) -> ActionOutcome {
        let alert = Alert {
            reason: planned.breach.reason().to_string(),
            message: planned.breach.to_string(),
        };
        match self.notifier.alert(policy, &alert).await {
            Ok(()) => ActionOutcome::Alerted,
            Err(e) => {
                warn!(policy = %policy.key(), error = %e, "failed to deliver alert");
                ActionOutcome::Failed(e.to_string())
            }
        }
    }
}
