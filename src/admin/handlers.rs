use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::time::Instant;

/// State shared by the admin endpoints.
#[derive(Clone)]
pub struct AdminState {
    metrics: Option<PrometheusHandle>,
    started_at: Instant,
}

impl AdminState {
    /// State rendering `metrics`, if a recorder is installed.
    pub fn new(metrics: Option<PrometheusHandle>) -> Self {
        Self {
            metrics,
            started_at: Instant::now(),
        }
    }
}

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

pub async fn ping() -> &'static str {
    "pong"
}

pub async fn healthcheck(State(state): State<AdminState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

pub async fn metrics(State(state): State<AdminState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::admin_router;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn get(path: &str) -> (StatusCode, String) {
        let response = admin_router(AdminState::new(None))
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn ping_pongs() {
        assert_eq!(get("/ping").await, (StatusCode::OK, "pong".to_string()));
    }

    #[tokio::test]
    async fn healthcheck_reports_healthy() {
        let (status, body) = get("/healthcheck").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn metrics_missing_without_recorder() {
        let (status, _) = get("/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
