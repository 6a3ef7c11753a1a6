//! In-memory cluster — implements every resource port without an API server.
//!
//! Used by unit and integration tests. Individual operations can be made to
//! fail with [`MemoryCluster::fail`] to exercise error paths.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::ports::{Deployments, Notifier, PipelineRuns, PolicyStore};
use crate::types::*;

/// Base of the synthetic clock used for run creation timestamps.
const CLOCK_BASE_SECS: i64 = 1_735_689_600;

/// Operations that can be forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    GetPolicy,
    UpdateStatus,
    ReplacePolicy,
    ListRuns,
    CreateRun,
    ReadReplicas,
    WriteReplicas,
    Restart,
    Alert,
}

#[derive(Debug, Clone, Default)]
struct DeploymentRecord {
    replicas: i32,
    restarts: u32,
}

#[derive(Default)]
struct Inner {
    policies: BTreeMap<PolicyKey, HealingPolicy>,
    runs: Vec<PipelineRunInfo>,
    deployments: BTreeMap<(String, String), DeploymentRecord>,
    alerts: Vec<(PolicyKey, Alert)>,
    faults: HashSet<Fault>,
    status_writes: u32,
    replaces: u32,
    clock: i64,
    next_id: u64,
}

impl Inner {
    fn check(&self, fault: Fault) -> StateResult<()> {
        if self.faults.contains(&fault) {
            return Err(StateError::Api(format!("injected failure: {fault:?}")));
        }
        Ok(())
    }

    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        DateTime::from_timestamp(CLOCK_BASE_SECS + self.clock, 0).unwrap_or_default()
    }
}

/// Shared in-memory state. Clones see the same cluster.
#[derive(Clone, Default)]
pub struct MemoryCluster {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Fault injection ──────────────────────────────────────────

    pub async fn fail(&self, fault: Fault) {
        self.inner.lock().await.faults.insert(fault);
    }

    pub async fn heal(&self, fault: Fault) {
        self.inner.lock().await.faults.remove(&fault);
    }

    // ── Policies ────────────────────────────────────────────────

    pub async fn put_policy(&self, policy: HealingPolicy) {
        let mut inner = self.inner.lock().await;
        inner.policies.insert(policy.key(), policy);
    }

    pub async fn delete_policy(&self, key: &PolicyKey) -> bool {
        self.inner.lock().await.policies.remove(key).is_some()
    }

    pub async fn policy(&self, key: &PolicyKey) -> Option<HealingPolicy> {
        self.inner.lock().await.policies.get(key).cloned()
    }

    /// Number of successful status subresource writes.
    pub async fn status_writes(&self) -> u32 {
        self.inner.lock().await.status_writes
    }

    /// Number of successful whole-object replaces.
    pub async fn replaces(&self) -> u32 {
        self.inner.lock().await.replaces
    }

    // ── Runs ────────────────────────────────────────────────────

    /// Record a run of `pipeline` that already reached `outcome`.
    pub async fn add_run(&self, namespace: &str, name: &str, pipeline: &str, outcome: RunOutcome) {
        let mut inner = self.inner.lock().await;
        let created_at = inner.tick();
        inner.runs.push(PipelineRunInfo {
            name: name.to_string(),
            namespace: namespace.to_string(),
            pipeline_ref: Some(pipeline.to_string()),
            outcome,
            reason: None,
            created_at: Some(created_at),
            labels: BTreeMap::new(),
        });
    }

    /// Move an existing run to a new outcome, as the execution subsystem would.
    pub async fn set_outcome(&self, name: &str, outcome: RunOutcome) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.runs.iter_mut().find(|r| r.name == name) {
            Some(run) => {
                run.outcome = outcome;
                true
            }
            None => false,
        }
    }

    pub async fn runs(&self) -> Vec<PipelineRunInfo> {
        self.inner.lock().await.runs.clone()
    }

    /// Runs created through the `PipelineRuns` port.
    pub async fn created_runs(&self) -> Vec<PipelineRunInfo> {
        self.inner
            .lock()
            .await
            .runs
            .iter()
            .filter(|r| r.retry_of().is_some())
            .cloned()
            .collect()
    }

    // ── Deployments ─────────────────────────────────────────────

    pub async fn put_deployment(&self, namespace: &str, name: &str, replicas: i32) {
        let mut inner = self.inner.lock().await;
        inner.deployments.insert(
            (namespace.to_string(), name.to_string()),
            DeploymentRecord {
                replicas,
                restarts: 0,
            },
        );
    }

    pub async fn deployment_replicas(&self, namespace: &str, name: &str) -> Option<i32> {
        let inner = self.inner.lock().await;
        inner
            .deployments
            .get(&(namespace.to_string(), name.to_string()))
            .map(|d| d.replicas)
    }

    pub async fn deployment_restarts(&self, namespace: &str, name: &str) -> Option<u32> {
        let inner = self.inner.lock().await;
        inner
            .deployments
            .get(&(namespace.to_string(), name.to_string()))
            .map(|d| d.restarts)
    }

    // ── Alerts ──────────────────────────────────────────────────

    pub async fn alerts(&self) -> Vec<(PolicyKey, Alert)> {
        self.inner.lock().await.alerts.clone()
    }
}

#[async_trait]
impl PolicyStore for MemoryCluster {
    async fn get(&self, key: &PolicyKey) -> StateResult<Option<HealingPolicy>> {
        let inner = self.inner.lock().await;
        inner.check(Fault::GetPolicy)?;
        Ok(inner.policies.get(key).cloned())
    }

    async fn update_status(
        &self,
        policy: &HealingPolicy,
        status: &HealingPolicyStatus,
    ) -> StateResult<()> {
        let mut inner = self.inner.lock().await;
        inner.check(Fault::UpdateStatus)?;
        let key = policy.key();
        let stored = inner
            .policies
            .get_mut(&key)
            .ok_or_else(|| StateError::NotFound(key.to_string()))?;
        stored.status = Some(status.clone());
        inner.status_writes += 1;
        debug!(policy = %key, "status written");
        Ok(())
    }

    async fn replace(&self, policy: &HealingPolicy) -> StateResult<()> {
        let mut inner = self.inner.lock().await;
        inner.check(Fault::ReplacePolicy)?;
        let key = policy.key();
        if !inner.policies.contains_key(&key) {
            return Err(StateError::NotFound(key.to_string()));
        }
        inner.policies.insert(key, policy.clone());
        inner.replaces += 1;
        Ok(())
    }
}

#[async_trait]
impl PipelineRuns for MemoryCluster {
    async fn list(&self, namespace: &str) -> StateResult<Vec<PipelineRunInfo>> {
        let inner = self.inner.lock().await;
        inner.check(Fault::ListRuns)?;
        Ok(inner
            .runs
            .iter()
            .filter(|r| r.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn create(&self, run: &NewPipelineRun) -> StateResult<String> {
        let mut inner = self.inner.lock().await;
        inner.check(Fault::CreateRun)?;
        inner.next_id += 1;
        let name = format!("{}{:05x}", run.generate_name, inner.next_id);
        let created_at = inner.tick();
        inner.runs.push(PipelineRunInfo {
            name: name.clone(),
            namespace: run.namespace.clone(),
            pipeline_ref: Some(run.pipeline_ref.clone()),
            outcome: RunOutcome::Unknown,
            reason: None,
            created_at: Some(created_at),
            labels: run.labels.clone(),
        });
        Ok(name)
    }
}

#[async_trait]
impl Deployments for MemoryCluster {
    async fn replicas(&self, namespace: &str, name: &str) -> StateResult<i32> {
        let inner = self.inner.lock().await;
        inner.check(Fault::ReadReplicas)?;
        inner
            .deployments
            .get(&(namespace.to_string(), name.to_string()))
            .map(|d| d.replicas)
            .ok_or_else(|| StateError::NotFound(format!("deployment {namespace}/{name}")))
    }

    async fn set_replicas(&self, namespace: &str, name: &str, replicas: i32) -> StateResult<()> {
        let mut inner = self.inner.lock().await;
        inner.check(Fault::WriteReplicas)?;
        let record = inner
            .deployments
            .get_mut(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| StateError::NotFound(format!("deployment {namespace}/{name}")))?;
        record.replicas = replicas;
        Ok(())
    }

    async fn restart(&self, namespace: &str, name: &str) -> StateResult<()> {
        let mut inner = self.inner.lock().await;
        inner.check(Fault::Restart)?;
        let record = inner
            .deployments
            .get_mut(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| StateError::NotFound(format!("deployment {namespace}/{name}")))?;
        record.restarts += 1;
        Ok(())
    }
}

#[async_trait]
impl Notifier for MemoryCluster {
    async fn alert(&self, policy: &HealingPolicy, alert: &Alert) -> StateResult<()> {
        let mut inner = self.inner.lock().await;
        inner.check(Fault::Alert)?;
        inner.alerts.push((policy.key(), alert.clone()));
        Ok(())
    }
}
