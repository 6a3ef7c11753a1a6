//! mender-metrics — both directions of metrics for Mender.
//!
//! # Architecture
//!
//! ```text
//! Inbound (managed service)
//!   HttpMetricsSource::fetch(url)
//!     └── parse_exposition() → MetricsSnapshot
//!
//! Outbound (the operator itself)
//!   OperatorMetrics (atomic counters + per-policy retry gauge)
//!     └── render_prometheus() → text/plain for /metrics
//! ```

pub mod collector;
pub mod exposition;
pub mod fetcher;
pub mod prometheus;

pub use collector::{Counter, MetricsReport, OperatorMetrics};
pub use exposition::{MetricNames, parse_exposition};
pub use fetcher::{FetchError, HttpMetricsSource, MetricsSource};
pub use prometheus::render_prometheus;
