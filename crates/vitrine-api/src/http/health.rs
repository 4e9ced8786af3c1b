//! Health and diagnostics endpoints.

use std::sync::Arc;

use axum::{Json, body::Body, extract::State, http::StatusCode, response::Response};
use serde::Serialize;
use tracing::{error, warn};
use vitrine_telemetry::build_sha;

use crate::http::errors::ApiError;
use crate::state::ApiState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
    pub(crate) revision: i64,
    pub(crate) build: String,
    pub(crate) degraded: Vec<String>,
}

pub(crate) async fn health(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<HealthResponse>, ApiError> {
    match state.settings.selection().await {
        Ok(selection) => {
            state.remove_degraded_component("database");
            state.telemetry.set_settings_revision(selection.revision);
            let degraded = state.current_health_degraded();
            let status = if degraded.is_empty() { "ok" } else { "degraded" };
            Ok(Json(HealthResponse {
                status,
                revision: selection.revision,
                build: build_sha().to_string(),
                degraded,
            }))
        }
        Err(err) => {
            state.add_degraded_component("database");
            warn!(error = %err, "health check failed to reach database");
            Err(ApiError::service_unavailable(
                "database is currently unavailable",
            ))
        }
    }
}

pub(crate) async fn metrics(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    match state.telemetry.render() {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )
            .body(Body::from(body))
            .map_err(|err| {
                error!(error = %err, "failed to build metrics response");
                ApiError::internal("failed to build metrics response")
            }),
        Err(err) => {
            error!(error = %err, "failed to render metrics");
            Err(ApiError::internal("failed to render metrics"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{state_with, stub_settings};

    #[tokio::test]
    async fn health_reports_revision_and_status() {
        let state = state_with(stub_settings(vec!["system.site"], vec!["system.site"]));
        let Json(body) = health(State(state)).await.expect("health should succeed");
        assert_eq!(body.status, "ok");
        assert_eq!(body.revision, 1);
        assert!(body.degraded.is_empty());
    }

    #[tokio::test]
    async fn metrics_render_in_exposition_format() {
        let state = state_with(stub_settings(vec![], vec![]));
        state.telemetry.inc_http_request("/health", 200);
        let response = metrics(State(state)).await.expect("metrics should render");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
