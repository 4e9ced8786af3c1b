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

//! Contact relay for Vitrine.
//!
//! Validates contact submissions, persists a message record, and dispatches
//! mail through a gateway. Layout: `mailer.rs` (the `MailHandler` seam and
//! the HTTP gateway client), `service.rs` (`ContactRelay` and its
//! collaborator traits), `error.rs` (`RelayError`).

pub mod error;
pub mod mailer;
pub mod service;

pub use error::{RelayError, RelayResult};
pub use mailer::{GatewayMailer, MailError, MailHandler, OutgoingMail};
pub use service::{
    CONFIRMATION, ContactRelay, ContactRequest, MessageStore, Receipt, RecipientDirectory,
};
