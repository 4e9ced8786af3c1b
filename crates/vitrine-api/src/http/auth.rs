//! Authentication and authorization middleware for the HTTP layer.

use std::sync::Arc;

use axum::{extract::State, http::Request, middleware::Next, response::Response};
use tracing::error;
use vitrine_config::Account;

use crate::http::constants::HEADER_API_KEY;
use crate::http::errors::ApiError;
use crate::state::ApiState;

/// Authenticated caller attached to the request extensions.
#[derive(Clone)]
pub(crate) struct AuthContext {
    pub(crate) account: Account,
}

pub(crate) async fn require_api_key(
    State(state): State<Arc<ApiState>>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let api_key_raw = extract_api_key(&req)
        .ok_or_else(|| ApiError::unauthorized("missing API key header"))?;

    let (key_id, secret) = api_key_raw
        .split_once(':')
        .ok_or_else(|| ApiError::unauthorized("API key must be provided as key_id:secret"))?;

    let account = state
        .settings
        .authenticate_api_key(key_id, secret)
        .await
        .map_err(|err| {
            error!(error = %err, "failed to verify API key");
            ApiError::internal("failed to verify API key")
        })?;

    let Some(account) = account else {
        return Err(ApiError::unauthorized("invalid API key"));
    };

    req.extensions_mut().insert(AuthContext { account });

    Ok(next.run(req).await)
}

pub(crate) async fn require_admin(
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let context = req
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| ApiError::internal("authentication context missing on admin route"))?;

    if !context.account.admin {
        return Err(ApiError::forbidden(
            "administrator privileges are required for this operation",
        ));
    }

    Ok(next.run(req).await)
}

pub(crate) fn extract_api_key(req: &Request<axum::body::Body>) -> Option<String> {
    req.headers()
        .get(HEADER_API_KEY)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
