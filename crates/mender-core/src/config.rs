//! mender.toml configuration parser.
//!
//! Every field has a default so an empty file (or no file at all) yields a
//! working operator configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default requeue delay between reconciliations.
pub const DEFAULT_REQUEUE_AFTER: Duration = Duration::from_secs(30);

/// Requeue delay once the retry budget is spent.
pub const DEFAULT_EXHAUSTED_REQUEUE_AFTER: Duration = Duration::from_secs(60);

/// Default retry budget per policy.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// How failed pipeline runs are deduplicated across cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryMode {
    /// Each failed run gets at most one retry attempt.
    #[default]
    OncePerRun,
    /// Every failed run is retried on every cycle until the budget runs out.
    PerCycle,
}

impl std::str::FromStr for RetryMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "once-per-run" => Ok(RetryMode::OncePerRun),
            "per-cycle" => Ok(RetryMode::PerCycle),
            other => Err(ConfigError::Invalid(format!("unknown retry mode: {other}"))),
        }
    }
}

/// How threshold breaches map to corrective actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionModel {
    /// Latency breaches scale, error-rate breaches alert.
    #[default]
    Independent,
    /// Any breach fires the single action named on the policy.
    Single,
}

impl std::str::FromStr for ActionModel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "independent" => Ok(ActionModel::Independent),
            "single" => Ok(ActionModel::Single),
            other => Err(ConfigError::Invalid(format!("unknown action model: {other}"))),
        }
    }
}

/// Top-level operator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    #[serde(with = "duration_str")]
    pub requeue_after: Duration,
    #[serde(with = "duration_str")]
    pub exhausted_requeue_after: Duration,
    pub max_retries: u32,
    pub retry_mode: RetryMode,
    pub action_model: ActionModel,
    pub metrics: MetricsConfig,
}

/// Where and how service metrics are scraped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// URL template; `{name}` and `{namespace}` are replaced with the
    /// target deployment identity.
    pub url_template: String,
    pub requests_metric: String,
    pub errors_metric: String,
    pub duration_metric: String,
    #[serde(with = "duration_str")]
    pub timeout: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            requeue_after: DEFAULT_REQUEUE_AFTER,
            exhausted_requeue_after: DEFAULT_EXHAUSTED_REQUEUE_AFTER,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_mode: RetryMode::default(),
            action_model: ActionModel::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            url_template: "http://{name}.{namespace}.svc:8080/metrics".to_string(),
            requests_metric: "demo_requests_total".to_string(),
            errors_metric: "demo_errors_total".to_string(),
            duration_metric: "demo_last_request_duration_seconds".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl OperatorConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: OperatorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the control loop spin or never scrape.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.requeue_after.is_zero() {
            return Err(ConfigError::Invalid("requeue_after must be non-zero".into()));
        }
        if self.exhausted_requeue_after.is_zero() {
            return Err(ConfigError::Invalid(
                "exhausted_requeue_after must be non-zero".into(),
            ));
        }
        if self.metrics.timeout.is_zero() {
            return Err(ConfigError::Invalid("metrics.timeout must be non-zero".into()));
        }
        if !self.metrics.url_template.contains("{name}") {
            return Err(ConfigError::Invalid(
                "metrics.url_template must contain {name}".into(),
            ));
        }
        Ok(())
    }
}

impl MetricsConfig {
    /// Expand the URL template for a deployment.
    pub fn url_for(&self, name: &str, namespace: &str) -> String {
        self.url_template
            .replace("{name}", name)
            .replace("{namespace}", namespace)
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

fn format_duration(d: &Duration) -> String {
    if d.subsec_millis() != 0 {
        format!("{}ms", d.as_millis())
    } else {
        format!("{}s", d.as_secs())
    }
}

mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_duration(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid duration: {raw}")))
    }
}
