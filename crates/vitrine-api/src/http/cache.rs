//! Cache-tag response wrapper for gate responses.
//!
//! Every successful gate response is tagged with the settings record's
//! identity. A reverse proxy (or any tag-aware cache) that indexes responses
//! by the `Cache-Tag` header can drop all of them the moment the allow-list
//! is saved again; the revision-derived `ETag` gives validator-based caches
//! the same signal.

use axum::{
    Json,
    http::{HeaderName, HeaderValue, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::http::constants::{CACHE_TAG_EXPOSURE_SETTINGS, HEADER_CACHE_TAG};

/// JSON response carrying the settings cache tag and a revision ETag.
#[derive(Debug)]
pub(crate) struct Tagged<T> {
    body: T,
    revision: i64,
}

impl<T> Tagged<T> {
    pub(crate) const fn new(body: T, revision: i64) -> Self {
        Self { body, revision }
    }
}

/// Render the revision-derived entity tag attached to gate responses.
pub(crate) fn revision_etag(revision: i64) -> String {
    format!("\"{CACHE_TAG_EXPOSURE_SETTINGS}-r{revision}\"")
}

impl<T: Serialize> IntoResponse for Tagged<T> {
    fn into_response(self) -> Response {
        let mut response = Json(self.body).into_response();
        let headers = response.headers_mut();
        headers.insert(
            HeaderName::from_static(HEADER_CACHE_TAG),
            HeaderValue::from_static(CACHE_TAG_EXPOSURE_SETTINGS),
        );
        if let Ok(etag) = HeaderValue::from_str(&revision_etag(self.revision)) {
            headers.insert(header::ETAG, etag);
        }
        response
    }
}
