//! mender-kube — Kubernetes implementations of the Mender ports.
//!
//! ```text
//! KubePolicyStore   Api<HealingPolicy>       get_opt / patch_status / replace
//! KubePipelineRuns  Api<DynamicObject>       tekton.dev/v1beta1 PipelineRun
//! KubeDeployments   Api<Deployment>          replicas / merge patch / restartedAt
//! EventNotifier     events::Recorder         Warning events on the policy
//! ```
//!
//! [`run_controller`] drives a [`mender_reconcile::Reconciler`] from a
//! `kube::runtime::Controller` watching `HealingPolicy` objects, which
//! serializes reconciliations per object. Status-only updates are filtered
//! out of the trigger stream by generation.

pub mod controller;
pub mod deployments;
pub mod events;
pub mod pipelineruns;
pub mod policies;

pub use controller::run_controller;
pub use deployments::KubeDeployments;
pub use events::EventNotifier;
pub use pipelineruns::{KubePipelineRuns, pipeline_run_resource};
pub use policies::KubePolicyStore;

use mender_state::StateError;

/// Map a client error onto the port error, keeping 404 and 409 distinct.
pub(crate) fn api_error(e: kube::Error) -> StateError {
    match e {
        kube::Error::Api(resp) if resp.code == 404 => StateError::NotFound(resp.message),
        kube::Error::Api(resp) if resp.code == 409 => StateError::Conflict(resp.message),
        other => StateError::Api(other.to_string()),
    }
}
