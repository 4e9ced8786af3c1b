//! Mail dispatch seam and the HTTP gateway implementation.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Errors raised while dispatching mail.
#[derive(Debug, Error)]
pub enum MailError {
    /// The gateway request could not be performed.
    #[error("mail gateway request failed")]
    Request {
        /// Source HTTP client error.
        source: reqwest::Error,
    },
    /// The gateway answered with a non-success status.
    #[error("mail gateway rejected the message")]
    Rejected {
        /// HTTP status code returned by the gateway.
        status: u16,
    },
}

/// Message payload handed to the mail transport.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OutgoingMail {
    /// Recipient email address.
    pub to: String,
    /// Optional carbon-copy address (the sender, when requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copy_to: Option<String>,
    /// Display name of the sender.
    pub sender_name: String,
    /// Email address of the sender.
    pub sender_email: String,
    /// Message subject.
    pub subject: String,
    /// Message body.
    pub body: String,
}

/// Abstraction over the mail transport used by the relay.
#[async_trait]
pub trait MailHandler: Send + Sync {
    /// Hand the message to the transport.
    async fn deliver(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// Mail transport that posts the message as JSON to an HTTP mail gateway.
#[derive(Clone)]
pub struct GatewayMailer {
    client: reqwest::Client,
    endpoint: String,
}

impl GatewayMailer {
    /// Construct a mailer targeting the provided gateway endpoint.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl MailHandler for GatewayMailer {
    async fn deliver(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(mail)
            .send()
            .await
            .map_err(|source| MailError::Request { source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MailError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
