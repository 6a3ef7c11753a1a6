//! Errors surfaced to the dispatcher.

use thiserror::Error;

use mender_state::{PolicyKey, StateError};

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The policy could not be read for a reason other than deletion.
    #[error("failed to load policy {key}: {source}")]
    Load {
        key: PolicyKey,
        #[source]
        source: StateError,
    },
}
