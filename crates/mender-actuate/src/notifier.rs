//! Log-based alert channel.

use async_trait::async_trait;
use tracing::warn;

use mender_state::{Alert, HealingPolicy, Notifier, StateResult};

/// Emits alerts as structured `warn` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn alert(&self, policy: &HealingPolicy, alert: &Alert) -> StateResult<()> {
        warn!(
            policy = %policy.key(),
            deployment = %policy.spec.deployment_name,
            reason = %alert.reason,
            "ALERT: {}",
            alert.message
        );
        Ok(())
    }
}
