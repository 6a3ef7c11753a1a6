//! Reconciler — drives one healing cycle for a policy.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, error, info, warn};

use mender_actuate::{ActionReport, Actuator, evaluate};
use mender_core::OperatorConfig;
use mender_metrics::{Counter, MetricsSource, OperatorMetrics};
use mender_retry::{RetryController, RetryReport};
use mender_state::*;

use crate::error::ReconcileError;

/// What the dispatcher should do after a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Run the policy again after the delay.
    Requeue(Duration),
    /// The policy is gone; do not schedule it again.
    Stop,
}

/// The external capabilities a reconciler works through.
#[derive(Clone)]
pub struct Ports {
    pub policies: Arc<dyn PolicyStore>,
    pub runs: Arc<dyn PipelineRuns>,
    pub deployments: Arc<dyn Deployments>,
    pub metrics_source: Arc<dyn MetricsSource>,
    pub notifier: Arc<dyn Notifier>,
}

pub struct Reconciler {
    ports: Ports,
    config: OperatorConfig,
    metrics: Arc<OperatorMetrics>,
}

impl Reconciler {
    pub fn new(ports: Ports, config: OperatorConfig, metrics: Arc<OperatorMetrics>) -> Self {
        Self {
            ports,
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<OperatorMetrics> {
        &self.metrics
    }

    /// Run one cycle for `key`.
    ///
    /// Only a failure to load the policy (other than it being deleted) is
    /// returned as an error. Every later stage logs its failures and the
    /// cycle still completes with a requeue.
    pub async fn reconcile(&self, key: &PolicyKey) -> Result<ReconcileOutcome, ReconcileError> {
        self.metrics.inc(Counter::Reconciles);

        let policy = match self.ports.policies.get(key).await {
            Ok(Some(policy)) => policy,
            Ok(None) => return Ok(self.stop(key).await),
            Err(e) if e.is_not_found() => return Ok(self.stop(key).await),
            Err(source) => {
                return Err(ReconcileError::Load {
                    key: key.clone(),
                    source,
                });
            }
        };

        let mut status = policy.status_or_default();

        self.run_retries(&policy, &mut status).await;
        let exhausted = status.retry_count >= self.config.max_retries;

        self.check_service(&policy, &mut status).await;

        status.last_checked = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        if !self.persist(&policy, &status).await {
            return Ok(self.stop(key).await);
        }
        self.metrics
            .observe_policy(&key.to_string(), status.retry_count)
            .await;

        let delay = if exhausted {
            self.config.exhausted_requeue_after
        } else {
            self.config.requeue_after
        };
        debug!(
            policy = %key,
            retry_count = status.retry_count,
            last_action = ?status.last_action,
            requeue_after = ?delay,
            "cycle complete"
        );
        Ok(ReconcileOutcome::Requeue(delay))
    }

    async fn stop(&self, key: &PolicyKey) -> ReconcileOutcome {
        info!(policy = %key, "policy not found, stopping");
        self.metrics.inc(Counter::PoliciesStopped);
        self.metrics.forget_policy(&key.to_string()).await;
        ReconcileOutcome::Stop
    }

    async fn run_retries(&self, policy: &HealingPolicy, status: &mut HealingPolicyStatus) {
        let controller = RetryController::new(
            self.ports.runs.as_ref(),
            self.config.max_retries,
            self.config.retry_mode,
        );
        match controller.reconcile(policy, status).await {
            Ok(report) => self.record_retries(&report),
            Err(e) => warn!(
                policy = %policy.key(),
                namespace = %policy.spec.pipeline_namespace,
                error = %e,
                "failed to list pipeline runs, skipping retries"
            ),
        }
    }

    fn record_retries(&self, report: &RetryReport) {
        for _ in &report.created {
            self.metrics.inc(Counter::RetriesCreated);
        }
        for _ in 0..report.create_failures {
            self.metrics.inc(Counter::RetryFailures);
        }
        if report.reset {
            self.metrics.inc(Counter::Resets);
        }
    }

    /// Scrape the service, evaluate thresholds, and act on breaches.
    async fn check_service(&self, policy: &HealingPolicy, status: &mut HealingPolicyStatus) {
        let url = self.metrics_url(policy);
        let snapshot = match self.ports.metrics_source.fetch(&url).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.metrics.inc(Counter::FetchFailures);
                warn!(policy = %policy.key(), %url, error = %e, "metrics unavailable, skipping evaluation");
                return;
            }
        };

        let plan = evaluate(&policy.spec, &snapshot, self.config.action_model);
        if plan.is_empty() {
            return;
        }

        let actuator = Actuator::new(
            self.ports.deployments.as_ref(),
            self.ports.notifier.as_ref(),
        );
        for report in actuator.execute(policy, &plan).await {
            self.record_action(&report, status);
        }
    }

    fn record_action(&self, report: &ActionReport, status: &mut HealingPolicyStatus) {
        if !report.succeeded() {
            self.metrics.inc(Counter::ActionFailures);
            return;
        }
        self.metrics.inc(match report.action {
            HealingAction::Scale => Counter::ScaleUps,
            HealingAction::Restart => Counter::Restarts,
            HealingAction::Alert => Counter::Alerts,
        });
        status.last_action = Some(report.action.into());
    }

    /// `spec.metricsUrl` when set, else the configured template.
    fn metrics_url(&self, policy: &HealingPolicy) -> String {
        match policy.spec.metrics_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => self.config.metrics.url_for(
                &policy.spec.deployment_name,
                &policy.spec.deployment_namespace,
            ),
        }
    }

    /// Write status through the subresource, falling back to a whole-object
    /// replace.
    /// Write the status back. Returns `false` when the policy was deleted
    /// while the cycle ran.
    async fn persist(&self, policy: &HealingPolicy, status: &HealingPolicyStatus) -> bool {
        let key = policy.key();
        let e = match self.ports.policies.update_status(policy, status).await {
            Ok(()) => return true,
            Err(e) if e.is_not_found() => return false,
            Err(e) => e,
        };
        warn!(policy = %key, error = %e, "status update failed, falling back to replace");

        let mut updated = policy.clone();
        updated.status = Some(status.clone());
        match self.ports.policies.replace(&updated).await {
            Ok(()) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => {
                self.metrics.inc(Counter::StatusWriteFailures);
                error!(policy = %key, error = %e, "failed to persist policy status");
                true
            }
        }
    }
}
