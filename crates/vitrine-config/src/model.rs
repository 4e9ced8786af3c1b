//! Typed exposure settings models and selection normalisation.
//!
//! # Design
//! - Pure data carriers used by the exposure service and API.
//! - Keeps domain types separate from IO/wiring code in `service.rs`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The persisted allow-list together with the settings revision it was read
/// at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExposureSelection {
    /// Ordered configuration document names permitted for external reads.
    pub names: Vec<String>,
    /// Settings revision recorded at read time.
    pub revision: i64,
}

impl ExposureSelection {
    /// Whether the named document is currently exposed.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|entry| entry == name)
    }
}

/// Raw content of an exposed configuration document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigExport {
    /// Name of the exported document.
    pub name: String,
    /// Stored content; `null` when the listed document has been removed.
    pub content: Value,
    /// Settings revision recorded at read time.
    pub revision: i64,
}

/// Catalog entry rendered by the admin selection surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Configuration document name.
    pub name: String,
    /// Whether the name is on the current allow-list.
    pub selected: bool,
}

/// Account record surfaced to authentication and the contact relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    /// Numeric account identifier.
    pub id: i64,
    /// API key identifier used for authentication.
    pub key_id: String,
    /// Display name recorded on relayed messages.
    pub display_name: String,
    /// Email address recorded on relayed messages.
    pub email: String,
    /// Whether the account has opted in to being contacted.
    pub contact_enabled: bool,
    /// Whether the account may use the admin surface.
    pub admin: bool,
}

/// Payload accepted when provisioning or updating an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountUpsert {
    /// API key identifier (unique).
    pub key_id: String,
    /// New secret; may be omitted when updating an existing account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Display name recorded on relayed messages.
    pub display_name: String,
    /// Email address recorded on relayed messages.
    pub email: String,
    /// Whether the account has opted in to being contacted.
    #[serde(default)]
    pub contact_enabled: bool,
    /// Whether the account may use the admin surface.
    #[serde(default)]
    pub admin: bool,
}

/// Structured change payload emitted by LISTEN/NOTIFY.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsChange {
    /// Database table that triggered the notification.
    pub table: String,
    /// Revision recorded after applying the change.
    pub revision: i64,
    /// Operation descriptor (`insert`, `update`, `delete`).
    pub operation: String,
}

/// Reduce checkbox-style admin input to the list that gets persisted.
///
/// Only truthy entries with non-empty trimmed names survive; the result
/// carries the map's stable iteration order, which is what the admin form
/// renders. Duplicate names cannot occur because the input is keyed by name.
#[must_use]
pub fn normalize_selection(picks: &BTreeMap<String, bool>) -> Vec<String> {
    picks
        .iter()
        .filter(|(name, checked)| **checked && !name.trim().is_empty())
        .map(|(name, _)| name.trim().to_string())
        .collect()
}

/// Merge the catalog with the current selection for admin-form rendering.
#[must_use]
pub fn catalog_entries(catalog: Vec<String>, selection: &ExposureSelection) -> Vec<CatalogEntry> {
    catalog
        .into_iter()
        .map(|name| {
            let selected = selection.contains(&name);
            CatalogEntry { name, selected }
        })
        .collect()
}
