//! `PostgreSQL`-backed exposure settings service.
//!
//! The service owns the singleton allow-list record, the configuration
//! document catalog, and the account directory. Every save of the allow-list
//! replaces the stored list wholesale, bumps the settings revision inside the
//! same transaction, and broadcasts the new revision on the settings channel
//! so dependent caches can drop every tagged response at once.

use std::collections::BTreeMap;
use std::time::Duration;

use argon2::Argon2;
use argon2::password_hash::{
    Error as PasswordHashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    rand_core::OsRng,
};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgListener, PgPoolOptions};
use tracing::{info, instrument, warn};
use vitrine_data::DataError;
use vitrine_data::directory::{self as data_directory, AccountRow, UpsertAccount};
use vitrine_data::exposure::{self as data_exposure, EXPOSURE_SETTINGS_ID, SETTINGS_CHANNEL};

use crate::error::{ExposureError, ExposureResult};
use crate::model::{
    Account, AccountUpsert, ConfigExport, ExposureSelection, SettingsChange, normalize_selection,
};

/// Abstraction over the exposure settings backend used by delivery surfaces.
#[async_trait]
pub trait SettingsFacade: Send + Sync {
    /// Enumerate every known configuration document name.
    async fn catalog(&self) -> ExposureResult<Vec<String>>;
    /// Retrieve the currently persisted allow-list.
    async fn selection(&self) -> ExposureResult<ExposureSelection>;
    /// Replace the allow-list with the truthy subset of checkbox input.
    async fn set_selection(
        &self,
        picks: BTreeMap<String, bool>,
    ) -> ExposureResult<ExposureSelection>;
    /// Retrieve the allow-list, failing when nothing has been exposed.
    async fn allowed_names(&self) -> ExposureResult<ExposureSelection>;
    /// Retrieve the raw content of an exposed configuration document.
    async fn export(&self, name: &str) -> ExposureResult<ConfigExport>;
    /// Insert or replace a configuration document.
    async fn put_document(&self, name: &str, content: Value) -> ExposureResult<()>;
    /// Validate an API key/secret pair and return the matching account.
    async fn authenticate_api_key(
        &self,
        key_id: &str,
        secret: &str,
    ) -> ExposureResult<Option<Account>>;
    /// Look up an account by its numeric identifier.
    async fn find_account(&self, id: i64) -> ExposureResult<Option<Account>>;
    /// Provision or update an account.
    async fn upsert_account(&self, payload: AccountUpsert) -> ExposureResult<Account>;
    /// Whether any accounts have been provisioned.
    async fn has_accounts(&self) -> ExposureResult<bool>;
}

/// Concrete implementation backed by `PostgreSQL` + `SQLx`.
#[derive(Clone)]
pub struct ExposureService {
    pool: sqlx::PgPool,
    database_url: String,
}

impl ExposureService {
    /// Establish a connection pool and ensure migrations are applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the `PostgreSQL` connection cannot be established
    /// or migrations fail to run.
    #[instrument(name = "exposure_service.new", skip(database_url))]
    pub async fn new(database_url: impl Into<String>) -> ExposureResult<Self> {
        let database_url = database_url.into();
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&database_url)
            .await
            .map_err(|source| ExposureError::Database {
                operation: "connect to PostgreSQL",
                source,
            })?;

        data_exposure::run_migrations(&pool)
            .await
            .map_err(data_err("run migrations"))?;

        Ok(Self { pool, database_url })
    }

    /// Access the underlying `SQLx` connection pool.
    #[must_use]
    pub const fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }

    /// Subscribe to settings change notifications.
    ///
    /// The stream is advisory: gate correctness never depends on it because
    /// the selection is read fresh from storage on every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the LISTEN connection cannot be established.
    pub async fn subscribe_changes(&self) -> ExposureResult<SettingsStream> {
        let mut listener = PgListener::connect(&self.database_url)
            .await
            .map_err(|source| ExposureError::Database {
                operation: "open LISTEN connection",
                source,
            })?;
        listener
            .listen(SETTINGS_CHANNEL)
            .await
            .map_err(|source| ExposureError::Database {
                operation: "LISTEN on settings channel",
                source,
            })?;

        Ok(SettingsStream { listener })
    }
}

#[async_trait]
impl SettingsFacade for ExposureService {
    async fn catalog(&self) -> ExposureResult<Vec<String>> {
        data_exposure::list_document_names(&self.pool)
            .await
            .map_err(data_err("list catalog"))
    }

    async fn selection(&self) -> ExposureResult<ExposureSelection> {
        let row = data_exposure::fetch_exposure_settings(&self.pool, EXPOSURE_SETTINGS_ID)
            .await
            .map_err(data_err("fetch exposure selection"))?;
        Ok(ExposureSelection {
            names: row.selected_configs,
            revision: row.revision,
        })
    }

    async fn set_selection(
        &self,
        picks: BTreeMap<String, bool>,
    ) -> ExposureResult<ExposureSelection> {
        let names = normalize_selection(&picks);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|source| ExposureError::Database {
                operation: "begin selection transaction",
                source,
            })?;
        let revision =
            data_exposure::replace_selection(tx.as_mut(), EXPOSURE_SETTINGS_ID, &names)
                .await
                .map_err(data_err("replace exposure selection"))?;
        data_exposure::notify_settings_changed(tx.as_mut(), revision)
            .await
            .map_err(data_err("notify settings change"))?;
        tx.commit().await.map_err(|source| ExposureError::Database {
            operation: "commit selection transaction",
            source,
        })?;

        info!(revision, exposed = names.len(), "exposure selection replaced");
        Ok(ExposureSelection { names, revision })
    }

    async fn allowed_names(&self) -> ExposureResult<ExposureSelection> {
        let selection = self.selection().await?;
        if selection.names.is_empty() {
            return Err(ExposureError::NothingExposed);
        }
        Ok(selection)
    }

    async fn export(&self, name: &str) -> ExposureResult<ConfigExport> {
        let selection = self.selection().await?;
        if !selection.contains(name) {
            warn!(config = name, "rejected export of unlisted configuration");
            return Err(ExposureError::NotExposed {
                name: name.to_string(),
            });
        }

        // Membership is the only precondition enforced here; a listed name
        // whose document row has been removed exports as null content.
        let content = data_exposure::fetch_document_content(&self.pool, name)
            .await
            .map_err(data_err("fetch document content"))?
            .unwrap_or(Value::Null);

        Ok(ConfigExport {
            name: name.to_string(),
            content,
            revision: selection.revision,
        })
    }

    async fn put_document(&self, name: &str, content: Value) -> ExposureResult<()> {
        data_exposure::upsert_document(&self.pool, name, &content)
            .await
            .map_err(data_err("upsert document"))
    }

    async fn authenticate_api_key(
        &self,
        key_id: &str,
        secret: &str,
    ) -> ExposureResult<Option<Account>> {
        let record = data_directory::fetch_account_by_key(&self.pool, key_id)
            .await
            .map_err(data_err("fetch account by key"))?;

        let Some(record) = record else {
            return Ok(None);
        };

        if !verify_secret(&record.secret_hash, secret)? {
            return Ok(None);
        }

        Ok(Some(map_account(record)))
    }

    async fn find_account(&self, id: i64) -> ExposureResult<Option<Account>> {
        let record = data_directory::fetch_account_by_id(&self.pool, id)
            .await
            .map_err(data_err("fetch account by id"))?;
        Ok(record.map(map_account))
    }

    async fn upsert_account(&self, payload: AccountUpsert) -> ExposureResult<Account> {
        let secret_hash = match &payload.secret {
            Some(secret) => hash_secret(secret)?,
            None => {
                let existing = data_directory::fetch_account_by_key(&self.pool, &payload.key_id)
                    .await
                    .map_err(data_err("fetch account by key"))?;
                existing
                    .map(|record| record.secret_hash)
                    .ok_or_else(|| ExposureError::SecretRequired {
                        key_id: payload.key_id.clone(),
                    })?
            }
        };

        let upsert = UpsertAccount {
            key_id: &payload.key_id,
            secret_hash: &secret_hash,
            display_name: &payload.display_name,
            email: &payload.email,
            contact_enabled: payload.contact_enabled,
            admin: payload.admin,
        };
        let id = data_directory::upsert_account(&self.pool, &upsert)
            .await
            .map_err(data_err("upsert account"))?;

        info!(account = %payload.key_id, id, "account provisioned");
        Ok(Account {
            id,
            key_id: payload.key_id,
            display_name: payload.display_name,
            email: payload.email,
            contact_enabled: payload.contact_enabled,
            admin: payload.admin,
        })
    }

    async fn has_accounts(&self) -> ExposureResult<bool> {
        let count = data_directory::count_accounts(&self.pool)
            .await
            .map_err(data_err("count accounts"))?;
        Ok(count > 0)
    }
}

/// Stream wrapper around a `PostgreSQL` LISTEN connection.
pub struct SettingsStream {
    listener: PgListener,
}

impl SettingsStream {
    /// Receive the next settings change notification.
    pub async fn next(&mut self) -> Option<ExposureResult<SettingsChange>> {
        match self.listener.recv().await {
            Ok(notification) => Some(parse_notification(notification.payload())),
            Err(source) => Some(Err(ExposureError::Database {
                operation: "receive settings notification",
                source,
            })),
        }
    }
}

fn parse_notification(payload: &str) -> ExposureResult<SettingsChange> {
    let mut parts = payload.split(':');
    let table = parts
        .next()
        .filter(|table| !table.is_empty())
        .ok_or_else(|| ExposureError::NotificationPayloadInvalid {
            payload: payload.to_string(),
        })?
        .to_string();
    let revision = parts
        .next()
        .and_then(|raw| raw.parse::<i64>().ok())
        .ok_or_else(|| ExposureError::NotificationPayloadInvalid {
            payload: payload.to_string(),
        })?;
    let operation = parts.next().unwrap_or("unknown").to_string();

    Ok(SettingsChange {
        table,
        revision,
        operation,
    })
}

fn map_account(row: AccountRow) -> Account {
    Account {
        id: row.id,
        key_id: row.key_id,
        display_name: row.display_name,
        email: row.email,
        contact_enabled: row.contact_enabled,
        admin: row.admin,
    }
}

fn data_err(operation: &'static str) -> impl FnOnce(DataError) -> ExposureError {
    move |source| ExposureError::DataAccess { operation, source }
}

fn hash_secret(input: &str) -> ExposureResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon = Argon2::default();
    argon
        .hash_password(input.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|detail| ExposureError::SecretHashFailed { detail })
}

fn verify_secret(expected_hash: &str, candidate: &str) -> ExposureResult<bool> {
    let parsed = PasswordHash::new(expected_hash)
        .map_err(|detail| ExposureError::StoredHashInvalid { detail })?;
    match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(PasswordHashError::Password) => Ok(false),
        Err(detail) => Err(ExposureError::SecretVerifyFailed { detail }),
    }
}
