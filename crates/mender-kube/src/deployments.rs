//! Replica control for `apps/v1` deployments.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use kube::Client;
use kube::api::{Api, Patch, PatchParams};
use serde_json::json;
use tracing::debug;

use mender_state::*;

use crate::api_error;

/// Pod template annotation whose change triggers a rolling restart.
pub const RESTARTED_AT_ANNOTATION: &str = "kubectl.kubernetes.io/restartedAt";

#[derive(Clone)]
pub struct KubeDeployments {
    client: Client,
}

impl KubeDeployments {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn patch(&self, namespace: &str, name: &str, body: serde_json::Value) -> StateResult<()> {
        self.api(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(body))
            .await
            .map_err(api_error)?;
        Ok(())
    }
}

/// Replica count of a deployment; unset means the API default of 1.
pub(crate) fn replica_count(deployment: &Deployment) -> i32 {
    deployment
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1)
}

pub(crate) fn scale_patch(replicas: i32) -> serde_json::Value {
    json!({ "spec": { "replicas": replicas } })
}

pub(crate) fn restart_patch(at: &str) -> serde_json::Value {
    json!({
        "spec": {
            "template": {
                "metadata": {
                    "annotations": { (RESTARTED_AT_ANNOTATION): at },
                },
            },
        },
    })
}

#[async_trait]
impl Deployments for KubeDeployments {
    async fn replicas(&self, namespace: &str, name: &str) -> StateResult<i32> {
        let deployment = self
            .api(namespace)
            .get_opt(name)
            .await
            .map_err(api_error)?
            .ok_or_else(|| StateError::NotFound(format!("deployment {namespace}/{name}")))?;
        Ok(replica_count(&deployment))
    }

    async fn set_replicas(&self, namespace: &str, name: &str, replicas: i32) -> StateResult<()> {
        self.patch(namespace, name, scale_patch(replicas)).await?;
        debug!(%namespace, deployment = %name, replicas, "replicas patched");
        Ok(())
    }

    async fn restart(&self, namespace: &str, name: &str) -> StateResult<()> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        self.patch(namespace, name, restart_patch(&now)).await?;
        debug!(%namespace, deployment = %name, "restart annotation set");
        Ok(())
    }
}
