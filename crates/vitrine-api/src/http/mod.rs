//! HTTP surface modules (router, middleware, handlers).

/// Administrative handlers (exposure form, documents, accounts).
pub mod admin;
/// Authentication middleware and helpers.
pub mod auth;
/// Cache-tag response wrapper for gate responses.
pub mod cache;
/// Shared constants and header names for HTTP surfaces.
pub mod constants;
/// Contact relay handler.
pub mod contact;
/// Problem response helpers and error types.
pub mod errors;
/// Configuration exposure gate handlers.
pub mod exposure;
/// Health and diagnostics endpoints.
pub mod health;
/// Router construction and server host.
pub mod router;
/// Metrics middleware for HTTP requests.
pub mod telemetry;
