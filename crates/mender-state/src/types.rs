//! Domain types for Mender.
//!
//! `HealingPolicy` is the custom resource operators create; everything else
//! is a narrowed view of a resource owned by someone else (Tekton pipeline
//! runs, apps/v1 deployments) or an ephemeral value computed each cycle.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Label on retry attempts naming the run they retry.
pub const RETRY_OF_LABEL: &str = "mender.dev/retry-of";

/// Label on retry attempts naming the policy that created them.
pub const POLICY_LABEL: &str = "mender.dev/policy";

// ── HealingPolicy ────────────────────────────────────────────────

/// Desired thresholds for a (pipeline, deployment) pair.
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[kube(
    group = "demo.kcd2025",
    version = "v1alpha1",
    kind = "HealingPolicy",
    plural = "healingpolicies",
    shortname = "hp",
    namespaced,
    status = "HealingPolicyStatus",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct HealingPolicySpec {
    pub pipeline_name: String,
    pub pipeline_namespace: String,
    pub deployment_name: String,
    pub deployment_namespace: String,
    /// Seconds; values `<= 0` disable the latency check.
    #[serde(default)]
    pub latency_threshold_seconds: f64,
    /// Fraction in [0, 1]; values `<= 0` disable the error-rate check.
    #[serde(default)]
    pub error_rate_threshold: f64,
    /// Action fired by the single-action model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<HealingAction>,
    /// Explicit metrics URL, overriding the operator-wide template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_url: Option<String>,
}

/// State written back by the reconciler.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealingPolicyStatus {
    /// RFC 3339 timestamp of the last completed cycle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_action: Option<LastAction>,
    #[serde(default)]
    pub retry_count: u32,
    /// Newest succeeded run already acknowledged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_successful_run: Option<String>,
}

/// Corrective action a policy can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealingAction {
    Restart,
    Scale,
    Alert,
}

/// The most recent action recorded in a policy's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LastAction {
    Reset,
    Retry,
    Scale,
    Restart,
    Alert,
}

impl From<HealingAction> for LastAction {
    fn from(action: HealingAction) -> Self {
        match action {
            HealingAction::Restart => LastAction::Restart,
            HealingAction::Scale => LastAction::Scale,
            HealingAction::Alert => LastAction::Alert,
        }
    }
}

impl fmt::Display for HealingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HealingAction::Restart => "restart",
            HealingAction::Scale => "scale",
            HealingAction::Alert => "alert",
        })
    }
}

impl HealingPolicy {
    /// Current status, or an empty one for a freshly created policy.
    pub fn status_or_default(&self) -> HealingPolicyStatus {
        self.status.clone().unwrap_or_default()
    }

    pub fn key(&self) -> PolicyKey {
        PolicyKey::new(self.namespace().unwrap_or_default(), self.name_any())
    }
}

/// Namespace-qualified identity of a policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolicyKey {
    pub namespace: String,
    pub name: String,
}

impl PolicyKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PolicyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// ── PipelineRun ─────────────────────────────────────────────────

/// Tri-state outcome of the `Succeeded` condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Unknown,
    Succeeded,
    Failed,
}

impl RunOutcome {
    /// Map a condition status string (`"True"`, `"False"`, `"Unknown"`).
    pub fn from_condition_status(status: Option<&str>) -> Self {
        match status {
            Some("True") => RunOutcome::Succeeded,
            Some("False") => RunOutcome::Failed,
            _ => RunOutcome::Unknown,
        }
    }
}

/// The parts of a pipeline run the retry controller looks at.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRunInfo {
    pub name: String,
    pub namespace: String,
    /// `spec.pipelineRef.name`, absent for inline pipeline specs.
    pub pipeline_ref: Option<String>,
    pub outcome: RunOutcome,
    /// Reason attached to the `Succeeded` condition.
    pub reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub labels: BTreeMap<String, String>,
}

impl PipelineRunInfo {
    /// Name of the run this one retries, if it was created by Mender.
    pub fn retry_of(&self) -> Option<&str> {
        self.labels.get(RETRY_OF_LABEL).map(String::as_str)
    }

    pub fn runs_pipeline(&self, pipeline: &str) -> bool {
        self.pipeline_ref.as_deref() == Some(pipeline)
    }
}

/// A retry attempt to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPipelineRun {
    pub namespace: String,
    pub generate_name: String,
    pub pipeline_ref: String,
    pub labels: BTreeMap<String, String>,
}

impl NewPipelineRun {
    /// A fresh attempt of `pipeline`, retrying `failed_run`. No parameters
    /// are carried over from the failed run.
    pub fn retry_of(pipeline: &str, namespace: &str, policy: &str, failed_run: &str) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert(POLICY_LABEL.to_string(), policy.to_string());
        labels.insert(RETRY_OF_LABEL.to_string(), failed_run.to_string());
        Self {
            namespace: namespace.to_string(),
            generate_name: format!("{pipeline}-retry-"),
            pipeline_ref: pipeline.to_string(),
            labels,
        }
    }
}

// ── Metrics ──────────────────────────────────────────────────────

/// Point-in-time service metrics, derived each cycle and never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub requests_total: f64,
    pub errors_total: f64,
    pub last_duration_seconds: f64,
}

impl MetricsSnapshot {
    /// errors / requests, or 0 when no requests were served.
    ///
    /// Clamped to [0, 1] so counter resets between scrapes cannot produce
    /// a nonsensical rate.
    pub fn error_rate(&self) -> f64 {
        if self.requests_total <= 0.0 {
            return 0.0;
        }
        (self.errors_total / self.requests_total).clamp(0.0, 1.0)
    }
}

// ── Alerts ───────────────────────────────────────────────────────

/// A side-channel notification raised by the actuator.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    /// Short machine-readable reason, e.g. `ErrorRateExceeded`.
    pub reason: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    fn spec() -> HealingPolicySpec {
        HealingPolicySpec {
            pipeline_name: "build".to_string(),
            pipeline_namespace: "ci".to_string(),
            deployment_name: "web".to_string(),
            deployment_namespace: "prod".to_string(),
            latency_threshold_seconds: 0.5,
            error_rate_threshold: 0.05,
            action: None,
            metrics_url: None,
        }
    }

    #[test]
    fn error_rate_zero_without_requests() {
        let snap = MetricsSnapshot {
            requests_total: 0.0,
            errors_total: 42.0,
            last_duration_seconds: 0.0,
        };
        assert_eq!(snap.error_rate(), 0.0);
    }

    #[test]
    fn error_rate_is_fraction() {
        let snap = MetricsSnapshot {
            requests_total: 100.0,
            errors_total: 10.0,
            last_duration_seconds: 0.0,
        };
        assert!((snap.error_rate() - 0.10).abs() < 1e-9);
    }

    #[test]
    fn error_rate_clamped_after_counter_reset() {
        let snap = MetricsSnapshot {
            requests_total: 5.0,
            errors_total: 9.0,
            last_duration_seconds: 0.0,
        };
        assert_eq!(snap.error_rate(), 1.0);
    }

    #[test]
    fn spec_serializes_camel_case() {
        let json = serde_json::to_value(spec()).unwrap();
        assert_eq!(json["pipelineName"], "build");
        assert_eq!(json["deploymentNamespace"], "prod");
        assert_eq!(json["latencyThresholdSeconds"], 0.5);
        assert!(json.get("action").is_none());
    }

    #[test]
    fn spec_parses_single_action_variant() {
        let json = serde_json::json!({
            "pipelineName": "build",
            "pipelineNamespace": "ci",
            "deploymentName": "web",
            "deploymentNamespace": "prod",
            "action": "restart"
        });
        let parsed: HealingPolicySpec = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.action, Some(HealingAction::Restart));
        // Thresholds default to disabled.
        assert_eq!(parsed.latency_threshold_seconds, 0.0);
        assert_eq!(parsed.error_rate_threshold, 0.0);
    }

    #[test]
    fn status_serializes_last_action_lowercase() {
        let status = HealingPolicyStatus {
            last_action: Some(LastAction::Retry),
            retry_count: 2,
            ..Default::default()
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["lastAction"], "retry");
        assert_eq!(json["retryCount"], 2);
    }

    #[test]
    fn policy_key_from_metadata() {
        let mut policy = HealingPolicy::new("heal-web", spec());
        policy.metadata.namespace = Some("ops".to_string());
        assert_eq!(policy.key().to_string(), "ops/heal-web");
        assert_eq!(policy.status_or_default().retry_count, 0);
    }

    #[test]
    fn retry_attempt_labels() {
        let run = NewPipelineRun::retry_of("build", "ci", "heal-web", "build-abc12");
        assert_eq!(run.generate_name, "build-retry-");
        assert_eq!(run.labels[RETRY_OF_LABEL], "build-abc12");
        assert_eq!(run.labels[POLICY_LABEL], "heal-web");
    }

    #[test]
    fn condition_status_mapping() {
        assert_eq!(RunOutcome::from_condition_status(Some("True")), RunOutcome::Succeeded);
        assert_eq!(RunOutcome::from_condition_status(Some("False")), RunOutcome::Failed);
        assert_eq!(RunOutcome::from_condition_status(Some("Unknown")), RunOutcome::Unknown);
        assert_eq!(RunOutcome::from_condition_status(None), RunOutcome::Unknown);
    }

    #[test]
    fn crd_identity() {
        let crd = HealingPolicy::crd();
        assert_eq!(crd.spec.group, "demo.kcd2025");
        assert_eq!(crd.spec.names.kind, "HealingPolicy");
        assert_eq!(crd.spec.names.plural, "healingpolicies");
    }
}
