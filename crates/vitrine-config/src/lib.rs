#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Database-backed exposure settings facade built on `PostgreSQL`.
//!
//! Layout: `model.rs` (typed models and selection normalisation),
//! `error.rs` (`ExposureError`), `service.rs` (`ExposureService` +
//! `SettingsFacade` and the LISTEN/NOTIFY change stream).

pub mod error;
pub mod model;
pub mod service;

pub use error::{ExposureError, ExposureResult};
pub use model::{
    Account, AccountUpsert, CatalogEntry, ConfigExport, ExposureSelection, SettingsChange,
    catalog_entries, normalize_selection,
};
pub use service::{ExposureService, SettingsFacade, SettingsStream};
