//! Operator HTTP surface: Prometheus metrics and a liveness probe.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;

use mender_metrics::{OperatorMetrics, render_prometheus};

pub fn build_router(metrics: Arc<OperatorMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(prometheus_metrics))
        .route("/healthz", get(healthz))
        .with_state(metrics)
}

/// GET /metrics
async fn prometheus_metrics(State(metrics): State<Arc<OperatorMetrics>>) -> impl IntoResponse {
    let body = render_prometheus(&metrics.report().await);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// GET /healthz
async fn healthz() -> &'static str {
    "ok"
}
