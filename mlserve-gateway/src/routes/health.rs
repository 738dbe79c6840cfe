//! Liveness, readiness and metrics endpoints.

use std::fmt::Write;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use mlserve_common::ModelStatus;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: DateTime<Utc>,
}

/// Build the health router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
        .route("/metrics", get(metrics))
}

/// GET /health - Liveness.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
    })
}

/// GET /health/ready - 200 once at least one model is ready.
async fn ready(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let (code, status) = if state.registry.has_ready().await {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };
    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            timestamp: Utc::now(),
        }),
    )
}

/// GET /metrics - Per-model counters in Prometheus text format.
async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let entries = state.registry.list().await;
    let mut body = String::new();

    let _ = writeln!(body, "# HELP mlserve_up Whether the service is up");
    let _ = writeln!(body, "# TYPE mlserve_up gauge");
    let _ = writeln!(body, "mlserve_up 1");

    let _ = writeln!(body, "# HELP mlserve_model_ready Whether the model is ready to serve");
    let _ = writeln!(body, "# TYPE mlserve_model_ready gauge");
    for entry in &entries {
        let ready = u8::from(entry.status == ModelStatus::Ready);
        let _ = writeln!(body, "mlserve_model_ready{{model=\"{}\"}} {}", escape_label(&entry.name), ready);
    }

    let _ = writeln!(body, "# HELP mlserve_requests_total Prediction requests forwarded to a backend");
    let _ = writeln!(body, "# TYPE mlserve_requests_total counter");
    for entry in &entries {
        let _ = writeln!(
            body,
            "mlserve_requests_total{{model=\"{}\"}} {}",
            escape_label(&entry.name),
            entry.counters.requests()
        );
    }

    let _ = writeln!(body, "# HELP mlserve_request_failures_total Forwarded requests that failed");
    let _ = writeln!(body, "# TYPE mlserve_request_failures_total counter");
    for entry in &entries {
        let _ = writeln!(
            body,
            "mlserve_request_failures_total{{model=\"{}\"}} {}",
            escape_label(&entry.name),
            entry.counters.failures()
        );
    }

    let _ = writeln!(body, "# HELP mlserve_request_latency_ms_sum Total backend latency in milliseconds");
    let _ = writeln!(body, "# TYPE mlserve_request_latency_ms_sum counter");
    for entry in &entries {
        let _ = writeln!(
            body,
            "mlserve_request_latency_ms_sum{{model=\"{}\"}} {}",
            escape_label(&entry.name),
            entry.counters.latency_ms_total()
        );
    }

    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}

/// Escape a Prometheus label value (backslash, double quote, newline).
fn escape_label(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}
