//! Policy controller — feeds `HealingPolicy` watch events into the
//! reconciler.
//!
//! Only spec edits (a new `metadata.generation`) trigger a cycle; the
//! reconciler's own status writes do not. Periodic work comes from the
//! requeue each cycle returns.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use kube::Client;
use kube::api::Api;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::{WatchStreamExt, predicates, reflector, watcher};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use mender_reconcile::{ReconcileError, ReconcileOutcome, Reconciler};
use mender_state::HealingPolicy;

struct Context {
    reconciler: Arc<Reconciler>,
}

/// Map a cycle outcome onto a controller action.
pub(crate) fn action_for(outcome: ReconcileOutcome) -> Action {
    match outcome {
        ReconcileOutcome::Requeue(delay) => Action::requeue(delay),
        ReconcileOutcome::Stop => Action::await_change(),
    }
}

async fn reconcile(
    policy: Arc<HealingPolicy>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let outcome = ctx.reconciler.reconcile(&policy.key()).await?;
    Ok(action_for(outcome))
}

fn error_policy(policy: Arc<HealingPolicy>, error: &ReconcileError, ctx: Arc<Context>) -> Action {
    warn!(policy = %policy.key(), error = %error, "reconcile failed");
    Action::requeue(ctx.reconciler.config().requeue_after)
}

/// Drop watch events that leave `metadata.generation` unchanged.
pub(crate) fn spec_changes<S>(
    policies: S,
) -> impl Stream<Item = Result<HealingPolicy, watcher::Error>>
where
    S: Stream<Item = Result<HealingPolicy, watcher::Error>>,
{
    policies.predicate_filter(predicates::generation)
}

/// Watch policies (in `namespace`, or cluster-wide) until `shutdown` flips.
pub async fn run_controller(
    client: Client,
    namespace: Option<String>,
    reconciler: Arc<Reconciler>,
    mut shutdown: watch::Receiver<bool>,
) {
    let policies: Api<HealingPolicy> = match namespace.as_deref() {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    };
    info!(namespace = namespace.as_deref().unwrap_or("*"), "policy controller starting");

    let (reader, writer) = reflector::store();
    let applied = watcher(policies, watcher::Config::default())
        .default_backoff()
        .reflect(writer)
        .applied_objects();

    let ctx = Arc::new(Context { reconciler });
    let controller = Controller::for_stream(spec_changes(applied), reader)
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, action)) => debug!(policy = %obj, ?action, "reconciled"),
                Err(e) => warn!(error = %e, "controller error"),
            }
        });

    tokio::select! {
        _ = controller => {}
        _ = shutdown.wait_for(|stop| *stop) => {}
    }

    info!("policy controller stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use mender_state::{HealingPolicySpec, HealingPolicyStatus};
    use std::time::Duration;

    #[test]
    fn outcomes_map_to_actions() {
        assert_eq!(
            action_for(ReconcileOutcome::Requeue(Duration::from_secs(30))),
            Action::requeue(Duration::from_secs(30))
        );
        assert_eq!(action_for(ReconcileOutcome::Stop), Action::await_change());
    }

    fn policy(generation: i64, retry_count: u32) -> HealingPolicy {
        let mut p = HealingPolicy::new(
            "heal-web",
            HealingPolicySpec {
                pipeline_name: "build".to_string(),
                pipeline_namespace: "ci".to_string(),
                deployment_name: "web".to_string(),
                deployment_namespace: "prod".to_string(),
                latency_threshold_seconds: 0.5,
                error_rate_threshold: 0.0,
                action: None,
                metrics_url: None,
            },
        );
        p.metadata.namespace = Some("ops".to_string());
        p.metadata.generation = Some(generation);
        p.status = Some(HealingPolicyStatus {
            retry_count,
            ..Default::default()
        });
        p
    }

    #[tokio::test]
    async fn status_only_updates_do_not_trigger() {
        let events = futures::stream::iter(vec![
            Ok(policy(1, 0)),
            // Status write by the reconciler: same generation.
            Ok(policy(1, 1)),
            // Spec edit.
            Ok(policy(2, 1)),
        ]);

        let triggered: Vec<_> = spec_changes(events).collect().await;

        let generations: Vec<_> = triggered
            .into_iter()
            .map(|r| r.unwrap().metadata.generation)
            .collect();
        assert_eq!(generations, vec![Some(1), Some(2)]);
    }
}
