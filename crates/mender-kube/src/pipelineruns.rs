//! Tekton pipeline runs as dynamic objects.
//!
//! Only the fields the retry controller reads are extracted: the pipeline
//! reference, the `Succeeded` condition, the creation time, and labels.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kube::Client;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, ListParams, PostParams};
use serde_json::{Value, json};
use tracing::{debug, info};

use mender_state::*;

use crate::api_error;

/// `tekton.dev/v1beta1` `PipelineRun`.
pub fn pipeline_run_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk("tekton.dev", "v1beta1", "PipelineRun"))
}

#[derive(Clone)]
pub struct KubePipelineRuns {
    client: Client,
    resource: ApiResource,
}

impl KubePipelineRuns {
    pub fn new(client: Client, resource: ApiResource) -> Self {
        Self { client, resource }
    }

    fn api(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &self.resource)
    }
}

/// Narrow a listed object to what the retry controller needs.
pub(crate) fn run_info(obj: &DynamicObject, namespace: &str) -> PipelineRunInfo {
    let condition = obj.data["status"]["conditions"]
        .as_array()
        .and_then(|conds| conds.iter().find(|c| c["type"] == "Succeeded"));

    PipelineRunInfo {
        name: obj.metadata.name.clone().unwrap_or_default(),
        namespace: obj
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| namespace.to_string()),
        pipeline_ref: obj.data["spec"]["pipelineRef"]["name"]
            .as_str()
            .map(str::to_string),
        outcome: RunOutcome::from_condition_status(
            condition.and_then(|c| c["status"].as_str()),
        ),
        reason: condition
            .and_then(|c| c["reason"].as_str())
            .map(str::to_string),
        created_at: obj
            .metadata
            .creation_timestamp
            .as_ref()
            .and_then(|t| serde_json::to_value(t).ok())
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc)),
        labels: obj.metadata.labels.clone().unwrap_or_default(),
    }
}

/// Build the object for a fresh attempt. The API server assigns the name.
pub(crate) fn run_object(run: &NewPipelineRun, resource: &ApiResource) -> DynamicObject {
    let mut obj = DynamicObject::new("", resource).within(&run.namespace);
    obj.metadata.name = None;
    obj.metadata.generate_name = Some(run.generate_name.clone());
    obj.metadata.labels = Some(run.labels.clone());
    obj.data = json!({
        "spec": {
            "pipelineRef": { "name": run.pipeline_ref },
        },
    });
    obj
}

#[async_trait]
impl PipelineRuns for KubePipelineRuns {
    async fn list(&self, namespace: &str) -> StateResult<Vec<PipelineRunInfo>> {
        let list = self
            .api(namespace)
            .list(&ListParams::default())
            .await
            .map_err(api_error)?;
        debug!(%namespace, count = list.items.len(), "pipeline runs listed");
        Ok(list.items.iter().map(|o| run_info(o, namespace)).collect())
    }

    async fn create(&self, run: &NewPipelineRun) -> StateResult<String> {
        let obj = run_object(run, &self.resource);
        let created = self
            .api(&run.namespace)
            .create(&PostParams::default(), &obj)
            .await
            .map_err(api_error)?;
        let name = created
            .metadata
            .name
            .ok_or_else(|| StateError::Invalid("created run has no name".to_string()))?;
        info!(run = %name, namespace = %run.namespace, pipeline = %run.pipeline_ref, "pipeline run created");
        Ok(name)
    }
}
