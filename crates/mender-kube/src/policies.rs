//! `HealingPolicy` storage through the typed API.

use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use serde_json::json;
use tracing::debug;

use mender_state::*;

use crate::api_error;

#[derive(Clone)]
pub struct KubePolicyStore {
    client: Client,
}

impl KubePolicyStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<HealingPolicy> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Merge patch body carrying only the status.
pub(crate) fn status_patch(status: &HealingPolicyStatus) -> serde_json::Value {
    json!({ "status": status })
}

#[async_trait]
impl PolicyStore for KubePolicyStore {
    async fn get(&self, key: &PolicyKey) -> StateResult<Option<HealingPolicy>> {
        self.api(&key.namespace)
            .get_opt(&key.name)
            .await
            .map_err(api_error)
    }

    async fn update_status(
        &self,
        policy: &HealingPolicy,
        status: &HealingPolicyStatus,
    ) -> StateResult<()> {
        let key = policy.key();
        self.api(&key.namespace)
            .patch_status(
                &key.name,
                &PatchParams::default(),
                &Patch::Merge(status_patch(status)),
            )
            .await
            .map_err(api_error)?;
        debug!(policy = %key, "status patched");
        Ok(())
    }

    async fn replace(&self, policy: &HealingPolicy) -> StateResult<()> {
        let key = policy.key();
        self.api(&key.namespace)
            .replace(&policy.name_any(), &PostParams::default(), policy)
            .await
            .map_err(api_error)?;
        debug!(policy = %key, "policy replaced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_patch_uses_wire_names() {
        let status = HealingPolicyStatus {
            last_checked: Some("2025-01-01T00:00:00Z".to_string()),
            last_action: Some(LastAction::Retry),
            retry_count: 2,
            last_successful_run: None,
        };
        let patch = status_patch(&status);
        assert_eq!(patch["status"]["retryCount"], 2);
        assert_eq!(patch["status"]["lastAction"], "retry");
        assert_eq!(patch["status"]["lastChecked"], "2025-01-01T00:00:00Z");
        assert!(patch["status"].get("lastSuccessfulRun").is_none());
    }
}
