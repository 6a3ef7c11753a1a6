//! mender-retry — bounded re-execution of failed pipeline runs.
//!
//! The controller looks at every run of a policy's target pipeline and
//! launches a fresh attempt for failures while the retry budget lasts.
//!
//! # Budget
//!
//! The persisted `retryCount` lives in `[0, maxRetries]`. A retry is only
//! charged after the attempt was created, and the count returns to 0 the
//! first time a new success is observed.
//!
//! # Deduplication
//!
//! Listing is level-triggered, so the same failed run is seen on every
//! cycle. [`RetryMode::OncePerRun`](mender_core::RetryMode) recognizes runs
//! that already have an attempt (via the `mender.dev/retry-of` label) or
//! that a newer success superseded. [`RetryMode::PerCycle`](mender_core::RetryMode)
//! retries every failed run on every cycle and relies on the budget alone.

pub mod budget;
pub mod controller;

pub use budget::RetryBudget;
pub use controller::{RetryController, RetryReport};
