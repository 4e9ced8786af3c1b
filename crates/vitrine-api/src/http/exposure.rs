//! Configuration exposure gate handlers.
//!
//! Both handlers read the allow-list fresh from storage on every request and
//! tag successful responses with the settings cache tag; nothing is cached in
//! process.

use std::sync::Arc;

use axum::extract::{Path, State};
use serde_json::{Map, Value};
use vitrine_config::ExposureError;

use crate::http::cache::Tagged;
use crate::http::errors::{ApiError, map_exposure_error};
use crate::state::ApiState;

pub(crate) async fn allowed_configs(
    State(state): State<Arc<ApiState>>,
) -> Result<Tagged<Vec<String>>, ApiError> {
    match state.settings.allowed_names().await {
        Ok(selection) => {
            state.telemetry.set_settings_revision(selection.revision);
            Ok(Tagged::new(selection.names, selection.revision))
        }
        Err(err) => Err(map_exposure_error(
            &err,
            "failed to list allowed configurations",
        )),
    }
}

pub(crate) async fn export_configuration(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
) -> Result<Tagged<Map<String, Value>>, ApiError> {
    match state.settings.export(&name).await {
        Ok(export) => {
            state.telemetry.set_settings_revision(export.revision);
            let mut body = Map::new();
            body.insert(export.name, export.content);
            Ok(Tagged::new(body, export.revision))
        }
        Err(err) => {
            if matches!(err, ExposureError::NotExposed { .. }) {
                state.telemetry.inc_exposure_denied();
            }
            Err(map_exposure_error(&err, "failed to export configuration"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::constants::{
        CACHE_TAG_EXPOSURE_SETTINGS, HEADER_CACHE_TAG, PROBLEM_NOT_EXPOSED,
        PROBLEM_NOTHING_EXPOSED,
    };
    use crate::test_support::{state_with, stub_settings};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use serde_json::json;

    #[tokio::test]
    async fn allowed_configs_returns_tagged_list() {
        let state = state_with(stub_settings(
            vec!["system.site", "system.mail"],
            vec!["system.site"],
        ));

        let response = allowed_configs(State(state))
            .await
            .expect("allowed configs should succeed")
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(HEADER_CACHE_TAG)
                .and_then(|value| value.to_str().ok()),
            Some(CACHE_TAG_EXPOSURE_SETTINGS)
        );

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let names: Vec<String> = serde_json::from_slice(&bytes).expect("json array");
        assert_eq!(names, vec!["system.site"]);
    }

    #[tokio::test]
    async fn allowed_configs_fails_when_nothing_exposed() {
        let state = state_with(stub_settings(vec!["system.site"], vec![]));

        let err = allowed_configs(State(state))
            .await
            .expect_err("empty allow-list must fail");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.kind, PROBLEM_NOTHING_EXPOSED);
    }

    #[tokio::test]
    async fn export_returns_content_keyed_by_name() {
        let stub = stub_settings(vec!["system.site"], vec!["system.site"]);
        stub.put_document_sync("system.site", json!({"name": "Vitrine", "page_size": 50}));
        let state = state_with(stub);

        let response = export_configuration(State(state), Path("system.site".to_string()))
            .await
            .expect("export should succeed")
            .into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json object");
        assert_eq!(body["system.site"]["name"], "Vitrine");
    }

    #[tokio::test]
    async fn export_rejects_unlisted_names() {
        let state = state_with(stub_settings(
            vec!["system.site", "system.mail"],
            vec!["system.site"],
        ));

        let err = export_configuration(State(state), Path("system.mail".to_string()))
            .await
            .expect_err("unlisted name must fail");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.kind, PROBLEM_NOT_EXPOSED);
    }

    #[tokio::test]
    async fn export_of_listed_but_missing_document_is_null() {
        let state = state_with(stub_settings(vec![], vec!["ghost.config"]));

        let response = export_configuration(State(state), Path("ghost.config".to_string()))
            .await
            .expect("membership implies existence")
            .into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json object");
        assert!(body["ghost.config"].is_null());
    }
}
