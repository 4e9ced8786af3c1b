//! RFC9457-style API error wrapper.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;
use vitrine_config::ExposureError;

use crate::http::constants::{
    PROBLEM_DELIVERY_FAILED, PROBLEM_FORBIDDEN, PROBLEM_INTERNAL, PROBLEM_NOT_EXPOSED,
    PROBLEM_NOTHING_EXPOSED, PROBLEM_SERVICE_UNAVAILABLE, PROBLEM_UNAUTHORIZED,
    PROBLEM_VALIDATION_FAILED,
};
use crate::models::{ProblemDetails, ProblemInvalidParam};

/// Structured API error with optional RFC9457 fields.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) kind: &'static str,
    title: &'static str,
    detail: Option<String>,
    pub(crate) invalid_params: Option<Vec<ProblemInvalidParam>>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
            invalid_params: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn with_invalid_params(mut self, params: Vec<ProblemInvalidParam>) -> Self {
        self.invalid_params = Some(params);
        self
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(message)
    }

    pub(crate) fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            PROBLEM_UNAUTHORIZED,
            "authentication required",
        )
        .with_detail(detail)
    }

    pub(crate) fn forbidden(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, PROBLEM_FORBIDDEN, "forbidden").with_detail(detail)
    }

    pub(crate) fn not_exposed(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            PROBLEM_NOT_EXPOSED,
            "configuration not exposed",
        )
        .with_detail(detail)
    }

    pub(crate) fn nothing_exposed(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            PROBLEM_NOTHING_EXPOSED,
            "no configurations exposed",
        )
        .with_detail(detail)
    }

    pub(crate) fn validation_failed(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            PROBLEM_VALIDATION_FAILED,
            "validation failed",
        )
        .with_detail(detail)
    }

    pub(crate) fn delivery_failed(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_DELIVERY_FAILED,
            "mail delivery failed",
        )
        .with_detail(detail)
    }

    pub(crate) fn service_unavailable(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            PROBLEM_SERVICE_UNAVAILABLE,
            "service unavailable",
        )
        .with_detail(detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
            invalid_params: self.invalid_params,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Map infrastructure-level exposure errors onto an internal problem.
///
/// Gate-level client errors (`NotExposed`, `NothingExposed`) are expected to
/// be handled by the calling handler before reaching this fallback.
pub(crate) fn map_exposure_error(err: &ExposureError, context: &'static str) -> ApiError {
    match err {
        ExposureError::NotExposed { name } => ApiError::not_exposed(format!(
            "The configuration ({name}) is not exposed for viewing."
        )),
        ExposureError::NothingExposed => ApiError::nothing_exposed(
            "No configurations have been allowed for viewing by the site administrator.",
        ),
        ExposureError::SecretRequired { key_id } => ApiError::validation_failed(format!(
            "A secret is required when provisioning the new account '{key_id}'."
        )),
        other => {
            error!(error = %other, "{context}");
            ApiError::internal(context)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_errors_map_to_client_problems() {
        let not_exposed = map_exposure_error(
            &ExposureError::NotExposed {
                name: "system.site".to_string(),
            },
            "context",
        );
        assert_eq!(not_exposed.status, StatusCode::BAD_REQUEST);
        assert_eq!(not_exposed.kind, PROBLEM_NOT_EXPOSED);

        let nothing = map_exposure_error(&ExposureError::NothingExposed, "context");
        assert_eq!(nothing.status, StatusCode::BAD_REQUEST);
        assert_eq!(nothing.kind, PROBLEM_NOTHING_EXPOSED);
    }

    #[test]
    fn infrastructure_errors_map_to_internal_problems() {
        let database = map_exposure_error(
            &ExposureError::Database {
                operation: "fetch exposure selection",
                source: sqlx_row_not_found(),
            },
            "failed to read selection",
        );
        assert_eq!(database.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(database.kind, PROBLEM_INTERNAL);
    }

    fn sqlx_row_not_found() -> sqlx::Error {
        sqlx::Error::RowNotFound
    }
}
