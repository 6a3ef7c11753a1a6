//! Plain-text exposition parsing.
//!
//! Only unlabelled `<name> <value>` lines are considered. Anything else
//! (comments, labelled series, garbage) is skipped without failing the
//! parse.

use mender_core::MetricsConfig;
use mender_state::MetricsSnapshot;

/// The three series a snapshot is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricNames {
    pub requests: String,
    pub errors: String,
    pub duration: String,
}

impl Default for MetricNames {
    fn default() -> Self {
        Self::from(&MetricsConfig::default())
    }
}

impl From<&MetricsConfig> for MetricNames {
    fn from(config: &MetricsConfig) -> Self {
        Self {
            requests: config.requests_metric.clone(),
            errors: config.errors_metric.clone(),
            duration: config.duration_metric.clone(),
        }
    }
}

/// Extract a snapshot from exposition text. Missing series read as 0 and
/// the first valid occurrence of a series wins.
pub fn parse_exposition(text: &str, names: &MetricNames) -> MetricsSnapshot {
    let mut requests = None;
    let mut errors = None;
    let mut duration = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let (Some(name), Some(raw)) = (fields.next(), fields.next()) else {
            continue;
        };

        let slot = if name == names.requests {
            &mut requests
        } else if name == names.errors {
            &mut errors
        } else if name == names.duration {
            &mut duration
        } else {
            continue;
        };

        if slot.is_some() {
            continue;
        }
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => *slot = Some(value),
            _ => continue,
        }
    }

    MetricsSnapshot {
        requests_total: requests.unwrap_or(0.0),
        errors_total: errors.unwrap_or(0.0),
        last_duration_seconds: duration.unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# HELP demo_requests_total Total HTTP requests
# TYPE demo_requests_total counter
demo_requests_total 100
# HELP demo_errors_total Simulated errors
# TYPE demo_errors_total counter
demo_errors_total 10
# HELP demo_last_request_duration_seconds Duration of the last request
# TYPE demo_last_request_duration_seconds gauge
demo_last_request_duration_seconds 0.812
go_goroutines 12
";

    #[test]
    fn parses_all_three_series() {
        let snap = parse_exposition(SAMPLE, &MetricNames::default());
        assert_eq!(snap.requests_total, 100.0);
        assert_eq!(snap.errors_total, 10.0);
        assert_eq!(snap.last_duration_seconds, 0.812);
    }

    #[test]
    fn missing_series_default_to_zero() {
        let snap = parse_exposition("demo_requests_total 7\n", &MetricNames::default());
        assert_eq!(snap.requests_total, 7.0);
        assert_eq!(snap.errors_total, 0.0);
        assert_eq!(snap.last_duration_seconds, 0.0);
    }

    #[test]
    fn empty_payload_is_all_zero() {
        assert_eq!(
            parse_exposition("", &MetricNames::default()),
            MetricsSnapshot::default()
        );
    }

    #[test]
    fn name_must_match_exactly() {
        let text = "demo_requests_total_created 1.7e9\ndemo_requests_totalx 5\ndemo_requests_total 3\n";
        let snap = parse_exposition(text, &MetricNames::default());
        assert_eq!(snap.requests_total, 3.0);
    }

    #[test]
    fn labelled_series_are_ignored() {
        let text = "demo_errors_total{code=\"500\"} 9\n";
        let snap = parse_exposition(text, &MetricNames::default());
        assert_eq!(snap.errors_total, 0.0);
    }

    #[test]
    fn malformed_lines_do_not_abort_parse() {
        let text = "demo_requests_total\ndemo_errors_total abc\ndemo_errors_total 4\ngarbage line here\ndemo_last_request_duration_seconds NaN\n";
        let snap = parse_exposition(text, &MetricNames::default());
        assert_eq!(snap.requests_total, 0.0);
        assert_eq!(snap.errors_total, 4.0);
        assert_eq!(snap.last_duration_seconds, 0.0);
    }

    #[test]
    fn scientific_notation_values() {
        let snap = parse_exposition("demo_requests_total 1.5e+06\n", &MetricNames::default());
        assert_eq!(snap.requests_total, 1_500_000.0);
    }

    #[test]
    fn custom_names_from_config() {
        let config = MetricsConfig {
            requests_metric: "http_requests_total".to_string(),
            ..MetricsConfig::default()
        };
        let names = MetricNames::from(&config);
        let snap = parse_exposition("http_requests_total 12\ndemo_requests_total 1\n", &names);
        assert_eq!(snap.requests_total, 12.0);
    }
}
