//! mender-reconcile — the reconciliation driver.
//!
//! One call to [`Reconciler::reconcile`] is one healing cycle for one
//! policy:
//!
//! ```text
//! LoadPolicy ──not found──▶ Stop
//!     │
//!     ▼
//! RetryController ──list failed──▶ (skip retries)
//!     │
//!     ▼
//! FetchMetrics ──failed──▶ (skip evaluation)
//!     │
//!     ▼
//! Evaluate + Actuate
//!     │
//!     ▼
//! PersistStatus (status subresource, falling back to replace)
//!     │
//!     ▼
//! Requeue(30s | 60s when the retry budget is spent)
//! ```
//!
//! The dispatcher guarantees at most one cycle per policy at a time, so the
//! driver does no locking of its own.

pub mod error;
pub mod reconciler;

pub use error::ReconcileError;
pub use reconciler::{Ports, ReconcileOutcome, Reconciler};
