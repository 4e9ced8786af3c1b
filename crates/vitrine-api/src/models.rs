//! Shared HTTP DTOs for the Vitrine public API.
//!
//! The types here define the wire contract; conversions live close to the
//! handlers so the mapping from domain objects remains a single source of
//! truth.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use vitrine_config::CatalogEntry;

/// RFC9457-compatible problem document surfaced on validation/runtime errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    /// Problem type URI.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short human-readable summary.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Optional human-readable detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Optional per-parameter failure pointers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_params: Option<Vec<ProblemInvalidParam>>,
}

/// Invalid parameter pointer surfaced alongside a [`ProblemDetails`] payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemInvalidParam {
    /// JSON pointer to the offending parameter.
    pub pointer: String,
    /// Human-readable description of the failure.
    pub message: String,
}

/// Admin view of the catalog with the current selection applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExposureForm {
    /// Every known configuration document name with its checked state.
    pub catalog: Vec<CatalogEntry>,
    /// Settings revision the form was rendered against.
    pub revision: i64,
}

/// Checkbox-style admin submission replacing the allow-list wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExposureUpdateRequest {
    /// Map of configuration name to checked state.
    pub selections: BTreeMap<String, bool>,
}

/// Confirmation payload returned by the contact endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactResponse {
    /// Human-readable confirmation message.
    pub message: String,
}
