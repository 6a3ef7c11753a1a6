//! Alerts as Kubernetes `Warning` events attached to the policy.

use async_trait::async_trait;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource};
use tracing::warn;

use mender_state::*;

use crate::api_error;

/// Controller name recorded on every event.
pub const REPORTER: &str = "mender";

pub struct EventNotifier {
    recorder: Recorder,
}

impl EventNotifier {
    pub fn new(client: Client, instance: Option<String>) -> Self {
        let reporter = Reporter {
            controller: REPORTER.to_string(),
            instance,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

pub(crate) fn alert_event(alert: &Alert) -> Event {
    Event {
        type_: EventType::Warning,
        reason: alert.reason.clone(),
        note: Some(alert.message.clone()),
        action: "Alert".to_string(),
        secondary: None,
    }
}

#[async_trait]
impl Notifier for EventNotifier {
    async fn alert(&self, policy: &HealingPolicy, alert: &Alert) -> StateResult<()> {
        warn!(
            policy = %policy.key(),
            deployment = %policy.spec.deployment_name,
            reason = %alert.reason,
            "ALERT: {}",
            alert.message
        );
        self.recorder
            .publish(&alert_event(alert), &policy.object_ref(&()))
            .await
            .map_err(api_error)
    }
}
