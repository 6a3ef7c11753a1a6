//! Prometheus text exposition of operator metrics.

use crate::collector::MetricsReport;

/// Render a metrics report in Prometheus text format.
pub fn render_prometheus(report: &MetricsReport) -> String {
    let mut out = String::new();

    for (counter, value) in &report.counters {
        let name = counter.name();
        out.push_str(&format!("# HELP {name}_total {}\n", counter.help()));
        out.push_str(&format!("# TYPE {name}_total counter\n"));
        out.push_str(&format!("{name}_total {value}\n"));
    }

    out.push_str("# HELP mender_policy_retry_count Retry count after the last reconciliation.\n");
    out.push_str("# TYPE mender_policy_retry_count gauge\n");
    for (policy, count) in &report.retry_counts {
        out.push_str(&format!(
            "mender_policy_retry_count{{policy=\"{policy}\"}} {count}\n"
        ));
    }

    out
}
