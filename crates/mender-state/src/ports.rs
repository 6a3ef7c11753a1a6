//! Resource ports — the read/write operations the core needs from the
//! orchestrator.
//!
//! The reconciler only ever talks to these traits. `mender-kube` implements
//! them against the Kubernetes API and [`crate::MemoryCluster`] implements
//! them in memory for tests.

use async_trait::async_trait;

use crate::error::StateResult;
use crate::types::*;

/// Durable storage for `HealingPolicy` records.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Fetch a policy. `Ok(None)` means it was deleted.
    async fn get(&self, key: &PolicyKey) -> StateResult<Option<HealingPolicy>>;

    /// Write only the status subresource.
    async fn update_status(
        &self,
        policy: &HealingPolicy,
        status: &HealingPolicyStatus,
    ) -> StateResult<()>;

    /// Replace the whole object, status included. Fallback path when the
    /// status subresource cannot be written.
    async fn replace(&self, policy: &HealingPolicy) -> StateResult<()>;
}

/// Pipeline runs in a namespace.
#[async_trait]
pub trait PipelineRuns: Send + Sync {
    async fn list(&self, namespace: &str) -> StateResult<Vec<PipelineRunInfo>>;

    /// Create a run and return its generated name.
    async fn create(&self, run: &NewPipelineRun) -> StateResult<String>;
}

/// Replica control for the managed deployment.
#[async_trait]
pub trait Deployments: Send + Sync {
    async fn replicas(&self, namespace: &str, name: &str) -> StateResult<i32>;

    async fn set_replicas(&self, namespace: &str, name: &str, replicas: i32) -> StateResult<()>;

    /// Trigger a rolling restart of every pod in the deployment.
    async fn restart(&self, namespace: &str, name: &str) -> StateResult<()>;
}

/// Side channel for alerts.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn alert(&self, policy: &HealingPolicy, alert: &Alert) -> StateResult<()>;
}
