//! Error types for the contact relay.

use thiserror::Error;

use crate::mailer::MailError;

/// Primary error type for contact relay operations.
#[derive(Debug, Error)]
pub enum RelayError {
    /// One or more required fields were absent or empty.
    #[error("missing required contact fields")]
    MissingFields {
        /// Names of the missing fields, in submission order.
        fields: Vec<&'static str>,
    },
    /// The recipient identifier did not resolve to an account.
    #[error("unknown recipient")]
    UnknownRecipient {
        /// Identifier supplied by the caller.
        recipient: String,
    },
    /// The recipient exists but has not opted in to being contacted.
    #[error("recipient has disabled contact")]
    RecipientOptedOut {
        /// Recipient account identifier.
        recipient: i64,
    },
    /// Recipient lookup failed at the directory layer.
    #[error("recipient lookup failed")]
    Directory {
        /// Source directory error.
        source: vitrine_config::ExposureError,
    },
    /// Persisting the message record failed.
    #[error("failed to persist contact message")]
    Persist {
        /// Source data-layer error.
        source: vitrine_data::DataError,
    },
    /// Mail dispatch failed after the message record was persisted.
    #[error("mail delivery failed")]
    Delivery {
        /// Recipient account identifier the message was addressed to.
        recipient: i64,
        /// Source mail transport error.
        source: MailError,
    },
}

/// Convenience alias for contact relay results.
pub type RelayResult<T> = Result<T, RelayError>;
