//! Stub collaborators shared by handler unit tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use vitrine_config::{
    Account, AccountUpsert, ConfigExport, ExposureError, ExposureResult, ExposureSelection,
    SettingsFacade, normalize_selection,
};
use vitrine_data::DataResult;
use vitrine_data::directory::NewContactMessage;
use vitrine_events::EventBus;
use vitrine_relay::{ContactRelay, MailError, MailHandler, MessageStore, OutgoingMail, RecipientDirectory};
use vitrine_telemetry::Metrics;

use crate::state::ApiState;

pub(crate) struct StubSettings {
    catalog: Vec<String>,
    selection: Mutex<ExposureSelection>,
    documents: Mutex<BTreeMap<String, Value>>,
    accounts: Vec<Account>,
}

impl StubSettings {
    pub(crate) fn put_document_sync(&self, name: &str, content: Value) {
        self.documents
            .lock()
            .expect("documents mutex poisoned")
            .insert(name.to_string(), content);
    }
}

pub(crate) fn stub_settings(catalog: Vec<&str>, selected: Vec<&str>) -> StubSettings {
    StubSettings {
        catalog: catalog.into_iter().map(str::to_string).collect(),
        selection: Mutex::new(ExposureSelection {
            names: selected.into_iter().map(str::to_string).collect(),
            revision: 1,
        }),
        documents: Mutex::new(BTreeMap::new()),
        accounts: Vec::new(),
    }
}

pub(crate) fn stub_settings_with_accounts(accounts: Vec<(i64, bool)>) -> StubSettings {
    let accounts = accounts
        .into_iter()
        .map(|(id, contact_enabled)| Account {
            id,
            key_id: format!("account-{id}"),
            display_name: format!("Account {id}"),
            email: format!("account-{id}@example.org"),
            contact_enabled,
            admin: false,
        })
        .collect();
    StubSettings {
        catalog: Vec::new(),
        selection: Mutex::new(ExposureSelection {
            names: Vec::new(),
            revision: 1,
        }),
        documents: Mutex::new(BTreeMap::new()),
        accounts,
    }
}

pub(crate) fn sender_account() -> Account {
    Account {
        id: 7,
        key_id: "sender".to_string(),
        display_name: "Sender".to_string(),
        email: "sender@example.org".to_string(),
        contact_enabled: false,
        admin: false,
    }
}

#[async_trait]
impl SettingsFacade for StubSettings {
    async fn catalog(&self) -> ExposureResult<Vec<String>> {
        Ok(self.catalog.clone())
    }

    async fn selection(&self) -> ExposureResult<ExposureSelection> {
        Ok(self.selection.lock().expect("selection mutex poisoned").clone())
    }

    async fn set_selection(
        &self,
        picks: BTreeMap<String, bool>,
    ) -> ExposureResult<ExposureSelection> {
        let names = normalize_selection(&picks);
        let mut guard = self.selection.lock().expect("selection mutex poisoned");
        guard.names = names;
        guard.revision += 1;
        Ok(guard.clone())
    }

    async fn allowed_names(&self) -> ExposureResult<ExposureSelection> {
        let selection = self.selection.lock().expect("selection mutex poisoned").clone();
        if selection.names.is_empty() {
            return Err(ExposureError::NothingExposed);
        }
        Ok(selection)
    }

    async fn export(&self, name: &str) -> ExposureResult<ConfigExport> {
        let selection = self.selection.lock().expect("selection mutex poisoned").clone();
        if !selection.contains(name) {
            return Err(ExposureError::NotExposed {
                name: name.to_string(),
            });
        }
        let content = self
            .documents
            .lock()
            .expect("documents mutex poisoned")
            .get(name)
            .cloned()
            .unwrap_or(Value::Null);
        Ok(ConfigExport {
            name: name.to_string(),
            content,
            revision: selection.revision,
        })
    }

    async fn put_document(&self, name: &str, content: Value) -> ExposureResult<()> {
        self.put_document_sync(name, content);
        Ok(())
    }

    async fn authenticate_api_key(
        &self,
        key_id: &str,
        secret: &str,
    ) -> ExposureResult<Option<Account>> {
        Ok(self
            .accounts
            .iter()
            .find(|account| account.key_id == key_id && secret == "s3cret")
            .cloned())
    }

    async fn find_account(&self, id: i64) -> ExposureResult<Option<Account>> {
        Ok(self.accounts.iter().find(|account| account.id == id).cloned())
    }

    async fn upsert_account(&self, payload: AccountUpsert) -> ExposureResult<Account> {
        if payload.secret.is_none() {
            return Err(ExposureError::SecretRequired {
                key_id: payload.key_id,
            });
        }
        Ok(Account {
            id: i64::try_from(self.accounts.len()).expect("account count fits") + 1,
            key_id: payload.key_id,
            display_name: payload.display_name,
            email: payload.email,
            contact_enabled: payload.contact_enabled,
            admin: payload.admin,
        })
    }

    async fn has_accounts(&self) -> ExposureResult<bool> {
        Ok(!self.accounts.is_empty())
    }
}

#[async_trait]
impl RecipientDirectory for StubSettings {
    async fn find_recipient(&self, id: i64) -> ExposureResult<Option<Account>> {
        self.find_account(id).await
    }
}

#[derive(Default)]
struct StubStore;

#[async_trait]
impl MessageStore for StubStore {
    async fn save(&self, _message: &NewContactMessage<'_>) -> DataResult<()> {
        Ok(())
    }
}

struct StubMailer {
    fail: bool,
}

#[async_trait]
impl MailHandler for StubMailer {
    async fn deliver(&self, _mail: &OutgoingMail) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Rejected { status: 502 });
        }
        Ok(())
    }
}

pub(crate) fn state_with(stub: StubSettings) -> Arc<ApiState> {
    build_state(stub, false)
}

pub(crate) fn state_with_failing_mailer(stub: StubSettings) -> Arc<ApiState> {
    build_state(stub, true)
}

fn build_state(stub: StubSettings, fail_mail: bool) -> Arc<ApiState> {
    let stub = Arc::new(stub);
    let relay = ContactRelay::new(
        stub.clone(),
        Arc::new(StubStore),
        Arc::new(StubMailer { fail: fail_mail }),
    );
    Arc::new(ApiState::new(
        stub,
        relay,
        Metrics::new().expect("metrics registry"),
        EventBus::new(),
    ))
}
