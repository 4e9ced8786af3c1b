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

//! HTTP delivery surface for Vitrine.
//!
//! Layout: `http/` (router, middleware, handlers), `models.rs` (wire DTOs),
//! `state.rs` (shared application state), `error.rs` (server lifecycle
//! errors).

/// Server lifecycle error types.
pub mod error;
/// HTTP surface modules (router, middleware, handlers).
pub mod http;
/// Shared HTTP DTOs for the public API.
pub mod models;

mod state;
#[cfg(test)]
mod test_support;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::ApiServer;
