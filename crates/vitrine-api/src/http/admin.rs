//! Administrative handlers: the exposure selection form, configuration
//! document ingestion, and account provisioning.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::{Json, http::StatusCode};
use serde_json::Value;
use tracing::info;
use vitrine_config::{Account, AccountUpsert, ExposureSelection, catalog_entries};

use crate::http::errors::{ApiError, map_exposure_error};
use crate::models::{ExposureForm, ExposureUpdateRequest};
use crate::state::ApiState;

pub(crate) async fn exposure_form(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ExposureForm>, ApiError> {
    let catalog = state
        .settings
        .catalog()
        .await
        .map_err(|err| map_exposure_error(&err, "failed to list the configuration catalog"))?;
    let selection = state
        .settings
        .selection()
        .await
        .map_err(|err| map_exposure_error(&err, "failed to load the exposure selection"))?;

    Ok(Json(ExposureForm {
        catalog: catalog_entries(catalog, &selection),
        revision: selection.revision,
    }))
}

pub(crate) async fn update_exposure(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ExposureUpdateRequest>,
) -> Result<Json<ExposureSelection>, ApiError> {
    let selection = state
        .settings
        .set_selection(request.selections)
        .await
        .map_err(|err| map_exposure_error(&err, "failed to save the exposure selection"))?;

    state.telemetry.set_settings_revision(selection.revision);
    info!(
        revision = selection.revision,
        exposed = selection.names.len(),
        "exposure selection updated"
    );
    Ok(Json(selection))
}

pub(crate) async fn put_config_document(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
    Json(content): Json<Value>,
) -> Result<StatusCode, ApiError> {
    state
        .settings
        .put_document(&name, content)
        .await
        .map_err(|err| map_exposure_error(&err, "failed to store the configuration document"))?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn upsert_account(
    State(state): State<Arc<ApiState>>,
    Json(payload): Json<AccountUpsert>,
) -> Result<Json<Account>, ApiError> {
    let account = state
        .settings
        .upsert_account(payload)
        .await
        .map_err(|err| map_exposure_error(&err, "failed to provision the account"))?;
    Ok(Json(account))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{state_with, stub_settings};
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn exposure_form_defaults_to_current_selection() {
        let state = state_with(stub_settings(
            vec!["system.mail", "system.site"],
            vec!["system.site"],
        ));

        let Json(form) = exposure_form(State(state))
            .await
            .expect("form should render");
        assert_eq!(form.catalog.len(), 2);
        let site = form
            .catalog
            .iter()
            .find(|entry| entry.name == "system.site")
            .expect("site entry");
        assert!(site.selected);
        let mail = form
            .catalog
            .iter()
            .find(|entry| entry.name == "system.mail")
            .expect("mail entry");
        assert!(!mail.selected);
    }

    #[tokio::test]
    async fn update_exposure_persists_only_truthy_entries() {
        let stub = stub_settings(vec!["a.one", "b.two", "c.three"], vec![]);
        let state = state_with(stub);

        let mut selections = BTreeMap::new();
        selections.insert("a.one".to_string(), true);
        selections.insert("b.two".to_string(), false);
        selections.insert("c.three".to_string(), true);

        let Json(selection) = update_exposure(
            State(state),
            Json(ExposureUpdateRequest { selections }),
        )
        .await
        .expect("update should succeed");
        assert_eq!(selection.names, vec!["a.one", "c.three"]);
    }

    #[tokio::test]
    async fn put_config_document_returns_no_content() {
        let state = state_with(stub_settings(vec![], vec![]));
        let status = put_config_document(
            State(state),
            Path("system.site".to_string()),
            Json(serde_json::json!({"name": "Vitrine"})),
        )
        .await
        .expect("upsert should succeed");
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
