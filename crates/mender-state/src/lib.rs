//! mender-state — domain types and resource ports for Mender.
//!
//! # Architecture
//!
//! ```text
//! HealingPolicy (CRD, demo.kcd2025/v1alpha1)
//!   ├── spec   → thresholds, target pipeline + deployment
//!   └── status → retry count, last action, last checked
//!
//! Ports (async traits)
//!   ├── PolicyStore   get / update_status / replace
//!   ├── PipelineRuns  list / create
//!   ├── Deployments   replicas / set_replicas / restart
//!   └── Notifier      alert
//! ```
//!
//! The core never touches a process-wide type registry: each port
//! implementation carries its own typed API handle. [`MemoryCluster`]
//! implements every port in memory for tests.

pub mod error;
pub mod memory;
pub mod ports;
pub mod types;

pub use error::{StateError, StateResult};
pub use memory::{Fault, MemoryCluster};
pub use ports::{Deployments, Notifier, PipelineRuns, PolicyStore};
pub use types::*;
