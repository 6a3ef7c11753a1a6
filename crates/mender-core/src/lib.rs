//! mender-core — operator configuration shared by every Mender crate.

pub mod config;

pub use config::{
    ActionModel, ConfigError, MetricsConfig, OperatorConfig, RetryMode, parse_duration,
};
