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
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Shared data access layer for Vitrine: migrations, row projections, and
//! query helpers for the Postgres store.

pub mod directory;
pub mod error;
pub mod exposure;

pub use error::{DataError, Result as DataResult};
