//! mender-actuate — threshold evaluation and corrective actions.
//!
//! # Action models
//!
//! ```text
//! Independent (default)
//!   last_duration > latencyThresholdSeconds  → scale up by one replica
//!   error_rate    > errorRateThreshold       → alert
//!
//! Single
//!   any breach → spec.action (restart | scale | alert), at most once
//! ```
//!
//! Thresholds `<= 0` are disabled. There is no scale-down path: this is
//! detect-and-escalate, not an autoscaler.

pub mod actuator;
pub mod evaluator;
pub mod notifier;

pub use actuator::{ActionOutcome, ActionReport, Actuator};
pub use evaluator::{Breach, PlannedAction, breaches, evaluate};
pub use notifier::LogNotifier;
