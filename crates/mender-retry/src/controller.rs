//! Retry controller — correlates pipeline-run outcomes with a policy and
//! launches bounded retry attempts.
//!
//! One pass per reconciliation:
//!
//! ```text
//! list runs in pipelineNamespace
//!   └── keep runs of spec.pipelineName, oldest first
//!         ├── Succeeded (newest, unacknowledged) → ack; reset budget if spent
//!         ├── Failed → budget left? mode allows? → create attempt → charge
//!         └── Unknown → ignore
//! ```

use std::collections::HashSet;

use tracing::{debug, info, warn};

use mender_core::RetryMode;
use mender_state::*;

use crate::budget::RetryBudget;

/// What a retry pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryReport {
    /// Names of the attempts created this pass.
    pub created: Vec<String>,
    /// Attempts whose creation failed (budget not charged).
    pub create_failures: u32,
    /// The budget was reset by a newly observed success.
    pub reset: bool,
    /// Failed runs skipped because the budget was spent.
    pub exhausted_skips: u32,
    /// Failed runs skipped because they were already retried or superseded.
    pub deduplicated: u32,
}

/// Applies the retry policy for one `HealingPolicy`.
pub struct RetryController<'a> {
    runs: &'a dyn PipelineRuns,
    max_retries: u32,
    mode: RetryMode,
}

impl<'a> RetryController<'a> {
    pub fn new(runs: &'a dyn PipelineRuns, max_retries: u32, mode: RetryMode) -> Self {
        Self {
            runs,
            max_retries,
            mode,
        }
    }

    /// Run one pass, updating `status` in place.
    ///
    /// Fails only when the runs cannot be listed; in that case `status` is
    /// left untouched.
    pub async fn reconcile(
        &self,
        policy: &HealingPolicy,
        status: &mut HealingPolicyStatus,
    ) -> StateResult<RetryReport> {
        let key = policy.key();
        let pipeline = policy.spec.pipeline_name.as_str();
        let namespace = policy.spec.pipeline_namespace.as_str();

        let listed = self.runs.list(namespace).await?;
        let mut runs: Vec<PipelineRunInfo> = listed
            .into_iter()
            .filter(|r| r.runs_pipeline(pipeline))
            .collect();
        runs.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });

        // Runs that already have an attempt pointing back at them.
        let mut retried: HashSet<String> = runs
            .iter()
            .filter_map(|r| r.retry_of().map(str::to_string))
            .collect();

        let newest_success = runs
            .iter()
            .rposition(|r| r.outcome == RunOutcome::Succeeded);

        let mut budget = RetryBudget::new(status.retry_count, self.max_retries);
        let mut report = RetryReport::default();

        for (idx, run) in runs.iter().enumerate() {
            match run.outcome {
                RunOutcome::Unknown => {}
                RunOutcome::Succeeded => {
                    if Some(idx) != newest_success
                        || status.last_successful_run.as_deref() == Some(run.name.as_str())
                    {
                        continue;
                    }
                    status.last_successful_run = Some(run.name.clone());
                    if budget.reset() {
                        status.last_action = Some(LastAction::Reset);
                        report.reset = true;
                        info!(policy = %key, run = %run.name, "success observed, retry budget reset");
                    } else {
                        debug!(policy = %key, run = %run.name, "success acknowledged");
                    }
                }
                RunOutcome::Failed => {
                    if budget.is_exhausted() {
                        report.exhausted_skips += 1;
                        debug!(
                            policy = %key,
                            run = %run.name,
                            max = self.max_retries,
                            "retry budget exhausted, skipping failed run"
                        );
                        continue;
                    }

                    if self.mode == RetryMode::OncePerRun {
                        let superseded = newest_success.is_some_and(|s| s > idx);
                        if superseded || retried.contains(&run.name) {
                            report.deduplicated += 1;
                            continue;
                        }
                    }

                    info!(
                        policy = %key,
                        run = %run.name,
                        reason = run.reason.as_deref().unwrap_or("unknown"),
                        "failed pipeline run detected"
                    );

                    let attempt = NewPipelineRun::retry_of(pipeline, namespace, &key.name, &run.name);
                    match self.runs.create(&attempt).await {
                        Ok(name) => {
                            budget.consume();
                            retried.insert(run.name.clone());
                            status.last_action = Some(LastAction::Retry);
                            info!(
                                policy = %key,
                                failed = %run.name,
                                attempt = %name,
                                used = budget.used(),
                                max = budget.max(),
                                "pipeline run retried"
                            );
                            report.created.push(name);
                        }
                        Err(e) => {
                            report.create_failures += 1;
                            warn!(policy = %key, run = %run.name, error = %e, "failed to create retry attempt");
                        }
                    }
                }
            }
        }

        status.retry_count = budget.used();
        Ok(report)
    }
}
