//! Error types for exposure settings operations.

use argon2::password_hash::Error as PasswordHashError;
use thiserror::Error;

/// Primary error type for exposure settings operations.
#[derive(Debug, Error)]
pub enum ExposureError {
    /// Requested configuration name is absent from the allow-list.
    #[error("configuration not exposed")]
    NotExposed {
        /// Name the caller asked for.
        name: String,
    },
    /// The allow-list is empty; nothing has been exposed.
    #[error("no configurations exposed")]
    NothingExposed,
    /// A new account was submitted without a secret.
    #[error("account secret required")]
    SecretRequired {
        /// Key identifier of the offending account payload.
        key_id: String,
    },
    /// Failed to hash secret material.
    #[error("failed to hash secret material")]
    SecretHashFailed {
        /// Hashing error detail.
        detail: PasswordHashError,
    },
    /// Stored secret hash payload was invalid.
    #[error("invalid stored hash")]
    StoredHashInvalid {
        /// Hash parsing error detail.
        detail: PasswordHashError,
    },
    /// Secret verification failed.
    #[error("failed to verify secret")]
    SecretVerifyFailed {
        /// Verification error detail.
        detail: PasswordHashError,
    },
    /// Settings change notification payload was invalid.
    #[error("invalid notification payload")]
    NotificationPayloadInvalid {
        /// Raw payload received on the channel.
        payload: String,
    },
    /// Underlying database operation failed.
    #[error("database operation failed")]
    Database {
        /// Operation identifier.
        operation: &'static str,
        /// Source database error.
        source: sqlx::Error,
    },
    /// Data layer operation failed.
    #[error("data access failed")]
    DataAccess {
        /// Operation identifier.
        operation: &'static str,
        /// Source data-layer error.
        source: vitrine_data::DataError,
    },
}

/// Convenience alias for exposure settings results.
pub type ExposureResult<T> = Result<T, ExposureError>;
