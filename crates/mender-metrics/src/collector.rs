//! Operator metrics — counters for every corrective action and failure
//! path, plus the last observed retry count per policy.
//!
//! Counters are lock-free atomics; the per-policy gauge map sits behind an
//! async RwLock.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;
use tracing::debug;

/// A monotonically increasing operator counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Counter {
    Reconciles,
    RetriesCreated,
    RetryFailures,
    Resets,
    ScaleUps,
    Restarts,
    Alerts,
    ActionFailures,
    FetchFailures,
    StatusWriteFailures,
    PoliciesStopped,
}

impl Counter {
    pub const ALL: [Counter; 11] = [
        Counter::Reconciles,
        Counter::RetriesCreated,
        Counter::RetryFailures,
        Counter::Resets,
        Counter::ScaleUps,
        Counter::Restarts,
        Counter::Alerts,
        Counter::ActionFailures,
        Counter::FetchFailures,
        Counter::StatusWriteFailures,
        Counter::PoliciesStopped,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Exposition name, without the `_total` suffix.
    pub fn name(self) -> &'static str {
        match self {
            Counter::Reconciles => "mender_reconciles",
            Counter::RetriesCreated => "mender_retries_created",
            Counter::RetryFailures => "mender_retry_create_failures",
            Counter::Resets => "mender_retry_resets",
            Counter::ScaleUps => "mender_scale_ups",
            Counter::Restarts => "mender_restarts",
            Counter::Alerts => "mender_alerts",
            Counter::ActionFailures => "mender_action_failures",
            Counter::FetchFailures => "mender_metrics_fetch_failures",
            Counter::StatusWriteFailures => "mender_status_write_failures",
            Counter::PoliciesStopped => "mender_policies_stopped",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            Counter::Reconciles => "Reconciliation cycles run.",
            Counter::RetriesCreated => "Pipeline run retry attempts created.",
            Counter::RetryFailures => "Pipeline run retry attempts that failed to create.",
            Counter::Resets => "Retry budgets reset after an observed success.",
            Counter::ScaleUps => "Deployments scaled up by one replica.",
            Counter::Restarts => "Deployment rolling restarts triggered.",
            Counter::Alerts => "Alerts raised.",
            Counter::ActionFailures => "Corrective actions that failed.",
            Counter::FetchFailures => "Metrics scrapes that failed.",
            Counter::StatusWriteFailures => "Cycles whose status could not be persisted.",
            Counter::PoliciesStopped => "Policies found deleted during reconciliation.",
        }
    }
}

/// Point-in-time copy of every operator metric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsReport {
    pub counters: Vec<(Counter, u64)>,
    /// policy key → retry count after the last cycle.
    pub retry_counts: BTreeMap<String, u32>,
}

/// Shared operator metrics.
pub struct OperatorMetrics {
    counters: [AtomicU64; Counter::ALL.len()],
    retry_counts: RwLock<BTreeMap<String, u32>>,
}

impl Default for OperatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorMetrics {
    pub fn new() -> Self {
        Self {
            counters: std::array::from_fn(|_| AtomicU64::new(0)),
            retry_counts: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn inc(&self, counter: Counter) {
        self.counters[counter.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter.index()].load(Ordering::Relaxed)
    }

    /// Record the retry count a policy ended its cycle with.
    pub async fn observe_policy(&self, policy: &str, retry_count: u32) {
        self.retry_counts
            .write()
            .await
            .insert(policy.to_string(), retry_count);
    }

    /// Drop a deleted policy's gauge.
    pub async fn forget_policy(&self, policy: &str) {
        if self.retry_counts.write().await.remove(policy).is_some() {
            debug!(%policy, "policy removed from metrics");
        }
    }

    pub async fn report(&self) -> MetricsReport {
        MetricsReport {
            counters: Counter::ALL.iter().map(|c| (*c, self.get(*c))).collect(),
            retry_counts: self.retry_counts.read().await.clone(),
        }
    }
}
