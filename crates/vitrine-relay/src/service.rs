//! Contact relay service.
//!
//! The relay validates the submission, persists the message record, and only
//! then dispatches mail: a transport failure surfaces to the caller but never
//! rolls the persisted record back.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;
use vitrine_config::{Account, ExposureResult, ExposureService, SettingsFacade};
use vitrine_data::DataResult;
use vitrine_data::directory::{self as data_directory, NewContactMessage};

use crate::error::{RelayError, RelayResult};
use crate::mailer::{MailHandler, OutgoingMail};

/// Confirmation string returned to the caller on success.
pub const CONFIRMATION: &str = "Your contact form has been successfully submitted.";

/// JSON body accepted by the contact endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactRequest {
    /// Recipient account identifier, as a string.
    #[serde(default)]
    pub recipient: Option<String>,
    /// Message subject.
    #[serde(default)]
    pub subject: Option<String>,
    /// Message body.
    #[serde(default)]
    pub message: Option<String>,
    /// Whether the sender wants a copy of the mail.
    #[serde(default)]
    pub copy: Option<bool>,
}

/// Outcome of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Identifier of the persisted message record.
    pub message_id: Uuid,
    /// Recipient account identifier.
    pub recipient: i64,
}

/// Directory lookup seam used to resolve recipients.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// Look up an account by its numeric identifier.
    async fn find_recipient(&self, id: i64) -> ExposureResult<Option<Account>>;
}

#[async_trait]
impl RecipientDirectory for ExposureService {
    async fn find_recipient(&self, id: i64) -> ExposureResult<Option<Account>> {
        self.find_account(id).await
    }
}

/// Persistence seam for contact message records.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message record.
    async fn save(&self, message: &NewContactMessage<'_>) -> DataResult<()>;
}

#[async_trait]
impl MessageStore for sqlx::PgPool {
    async fn save(&self, message: &NewContactMessage<'_>) -> DataResult<()> {
        data_directory::insert_contact_message(self, message).await
    }
}

/// Contact relay composed from directory, persistence, and mail seams.
#[derive(Clone)]
pub struct ContactRelay {
    directory: Arc<dyn RecipientDirectory>,
    store: Arc<dyn MessageStore>,
    mailer: Arc<dyn MailHandler>,
}

impl ContactRelay {
    /// Construct a relay from its collaborators.
    #[must_use]
    pub fn new(
        directory: Arc<dyn RecipientDirectory>,
        store: Arc<dyn MessageStore>,
        mailer: Arc<dyn MailHandler>,
    ) -> Self {
        Self {
            directory,
            store,
            mailer,
        }
    }

    /// Validate and relay a contact submission on behalf of `sender`.
    ///
    /// # Errors
    ///
    /// Returns a validation error before anything is persisted, a persistence
    /// error when the insert fails, or a delivery error when the transport
    /// rejects the mail after the record was stored.
    pub async fn submit(&self, sender: &Account, request: ContactRequest) -> RelayResult<Receipt> {
        let recipient_raw = non_empty(request.recipient.as_deref());
        let subject = non_empty(request.subject.as_deref());
        let body = non_empty(request.message.as_deref());

        let mut missing = Vec::new();
        if recipient_raw.is_none() {
            missing.push("recipient");
        }
        if subject.is_none() {
            missing.push("subject");
        }
        if body.is_none() {
            missing.push("message");
        }
        if !missing.is_empty() {
            return Err(RelayError::MissingFields { fields: missing });
        }

        let (recipient_raw, subject, body) = (
            recipient_raw.unwrap_or_default(),
            subject.unwrap_or_default(),
            body.unwrap_or_default(),
        );

        let recipient_id =
            recipient_raw
                .parse::<i64>()
                .map_err(|_| RelayError::UnknownRecipient {
                    recipient: recipient_raw.to_string(),
                })?;
        let recipient = self
            .directory
            .find_recipient(recipient_id)
            .await
            .map_err(|source| RelayError::Directory { source })?
            .ok_or_else(|| RelayError::UnknownRecipient {
                recipient: recipient_raw.to_string(),
            })?;

        if !recipient.contact_enabled {
            return Err(RelayError::RecipientOptedOut {
                recipient: recipient_id,
            });
        }

        let send_copy = request.copy.unwrap_or(false);
        let message_id = Uuid::new_v4();
        let record = NewContactMessage {
            id: message_id,
            recipient: recipient_id,
            sender_name: &sender.display_name,
            sender_email: &sender.email,
            subject,
            body,
            send_copy,
        };
        self.store
            .save(&record)
            .await
            .map_err(|source| RelayError::Persist { source })?;

        let mail = OutgoingMail {
            to: recipient.email,
            copy_to: send_copy.then(|| sender.email.clone()),
            sender_name: sender.display_name.clone(),
            sender_email: sender.email.clone(),
            subject: subject.to_string(),
            body: body.to_string(),
        };
        if let Err(source) = self.mailer.deliver(&mail).await {
            error!(recipient = recipient_id, error = %source, "failed to deliver contact mail");
            return Err(RelayError::Delivery {
                recipient: recipient_id,
                source,
            });
        }

        info!(recipient = recipient_id, message = %message_id, "contact message relayed");
        Ok(Receipt {
            message_id,
            recipient: recipient_id,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|trimmed| !trimmed.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::MailError;
    use std::sync::Mutex;

    struct StubDirectory {
        accounts: Vec<Account>,
    }

    #[async_trait]
    impl RecipientDirectory for StubDirectory {
        async fn find_recipient(&self, id: i64) -> ExposureResult<Option<Account>> {
            Ok(self
                .accounts
                .iter()
                .find(|account| account.id == id)
                .cloned())
        }
    }

    #[derive(Default)]
    struct StubStore {
        saved: Mutex<Vec<(Uuid, i64, String)>>,
    }

    #[async_trait]
    impl MessageStore for StubStore {
        async fn save(&self, message: &NewContactMessage<'_>) -> DataResult<()> {
            self.saved
                .lock()
                .expect("store mutex poisoned")
                .push((message.id, message.recipient, message.subject.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct StubMailer {
        fail: bool,
        delivered: Mutex<Vec<OutgoingMail>>,
    }

    #[async_trait]
    impl MailHandler for StubMailer {
        async fn deliver(&self, mail: &OutgoingMail) -> Result<(), MailError> {
            if self.fail {
                return Err(MailError::Rejected { status: 502 });
            }
            self.delivered
                .lock()
                .expect("mailer mutex poisoned")
                .push(mail.clone());
            Ok(())
        }
    }

    fn account(id: i64, contact_enabled: bool) -> Account {
        Account {
            id,
            key_id: format!("account-{id}"),
            display_name: format!("Account {id}"),
            email: format!("account-{id}@example.org"),
            contact_enabled,
            admin: false,
        }
    }

    fn relay_with(
        directory: StubDirectory,
        store: Arc<StubStore>,
        mailer: Arc<StubMailer>,
    ) -> ContactRelay {
        ContactRelay::new(Arc::new(directory), store, mailer)
    }

    fn request(recipient: &str, subject: &str, message: &str) -> ContactRequest {
        ContactRequest {
            recipient: Some(recipient.to_string()),
            subject: Some(subject.to_string()),
            message: Some(message.to_string()),
            copy: None,
        }
    }

    #[tokio::test]
    async fn happy_path_persists_and_delivers() {
        let store = Arc::new(StubStore::default());
        let mailer = Arc::new(StubMailer::default());
        let relay = relay_with(
            StubDirectory {
                accounts: vec![account(42, true)],
            },
            store.clone(),
            mailer.clone(),
        );

        let sender = account(7, false);
        let receipt = relay
            .submit(&sender, request("42", "Hi", "Hello"))
            .await
            .expect("submission should succeed");
        assert_eq!(receipt.recipient, 42);

        let saved = store.saved.lock().expect("store mutex poisoned");
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].1, 42);
        assert_eq!(saved[0].2, "Hi");

        let delivered = mailer.delivered.lock().expect("mailer mutex poisoned");
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].to, "account-42@example.org");
        assert_eq!(delivered[0].sender_email, "account-7@example.org");
        assert_eq!(delivered[0].copy_to, None);
    }

    #[tokio::test]
    async fn copy_flag_carbon_copies_the_sender() {
        let store = Arc::new(StubStore::default());
        let mailer = Arc::new(StubMailer::default());
        let relay = relay_with(
            StubDirectory {
                accounts: vec![account(42, true)],
            },
            store,
            mailer.clone(),
        );

        let sender = account(7, false);
        let mut payload = request("42", "Hi", "Hello");
        payload.copy = Some(true);
        relay
            .submit(&sender, payload)
            .await
            .expect("submission should succeed");

        let delivered = mailer.delivered.lock().expect("mailer mutex poisoned");
        assert_eq!(
            delivered[0].copy_to.as_deref(),
            Some("account-7@example.org")
        );
    }

    #[tokio::test]
    async fn missing_subject_is_rejected_before_persistence() {
        let store = Arc::new(StubStore::default());
        let relay = relay_with(
            StubDirectory {
                accounts: vec![account(42, true)],
            },
            store.clone(),
            Arc::new(StubMailer::default()),
        );

        let sender = account(7, false);
        let payload = ContactRequest {
            recipient: Some("42".to_string()),
            subject: None,
            message: Some("Hello".to_string()),
            copy: None,
        };
        let err = relay
            .submit(&sender, payload)
            .await
            .expect_err("missing subject must fail");
        match err {
            RelayError::MissingFields { fields } => assert_eq!(fields, vec!["subject"]),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.saved.lock().expect("store mutex poisoned").is_empty());
    }

    #[tokio::test]
    async fn opted_out_recipient_is_rejected_before_persistence() {
        let store = Arc::new(StubStore::default());
        let relay = relay_with(
            StubDirectory {
                accounts: vec![account(42, false)],
            },
            store.clone(),
            Arc::new(StubMailer::default()),
        );

        let sender = account(7, false);
        let err = relay
            .submit(&sender, request("42", "Hi", "Hello"))
            .await
            .expect_err("opted-out recipient must fail");
        assert!(matches!(
            err,
            RelayError::RecipientOptedOut { recipient: 42 }
        ));
        assert!(store.saved.lock().expect("store mutex poisoned").is_empty());
    }

    #[tokio::test]
    async fn unknown_and_unparsable_recipients_are_rejected() {
        let relay = relay_with(
            StubDirectory { accounts: vec![] },
            Arc::new(StubStore::default()),
            Arc::new(StubMailer::default()),
        );
        let sender = account(7, false);

        let unknown = relay
            .submit(&sender, request("42", "Hi", "Hello"))
            .await
            .expect_err("unknown recipient must fail");
        assert!(matches!(unknown, RelayError::UnknownRecipient { .. }));

        let unparsable = relay
            .submit(&sender, request("forty-two", "Hi", "Hello"))
            .await
            .expect_err("unparsable recipient must fail");
        assert!(matches!(unparsable, RelayError::UnknownRecipient { .. }));
    }

    #[tokio::test]
    async fn delivery_failure_keeps_the_persisted_record() {
        let store = Arc::new(StubStore::default());
        let mailer = Arc::new(StubMailer {
            fail: true,
            delivered: Mutex::new(Vec::new()),
        });
        let relay = relay_with(
            StubDirectory {
                accounts: vec![account(42, true)],
            },
            store.clone(),
            mailer,
        );

        let sender = account(7, false);
        let err = relay
            .submit(&sender, request("42", "Hi", "Hello"))
            .await
            .expect_err("gateway rejection must surface");
        assert!(matches!(
            err,
            RelayError::Delivery {
                recipient: 42,
                source: MailError::Rejected { status: 502 }
            }
        ));
        assert_eq!(store.saved.lock().expect("store mutex poisoned").len(), 1);
    }
}
