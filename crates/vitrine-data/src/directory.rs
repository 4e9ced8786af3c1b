//! Account directory and contact message queries.

use sqlx::{Executor, FromRow, Postgres};
use uuid::Uuid;

use crate::error::{Result, map_query_err};

/// Raw projection of an `accounts` row.
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    /// Numeric account identifier.
    pub id: i64,
    /// API key identifier used for authentication.
    pub key_id: String,
    /// Argon2 hash of the account secret.
    pub secret_hash: String,
    /// Display name recorded on relayed messages.
    pub display_name: String,
    /// Email address recorded on relayed messages.
    pub email: String,
    /// Whether the account has opted in to being contacted.
    pub contact_enabled: bool,
    /// Whether the account may use the admin surface.
    pub admin: bool,
}

/// Load an account by its API key identifier.
///
/// # Errors
///
/// Returns an error when the query fails.
pub async fn fetch_account_by_key<'e, E>(executor: E, key_id: &str) -> Result<Option<AccountRow>>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, AccountRow>(
        "SELECT id, key_id, secret_hash, display_name, email, contact_enabled, admin \
         FROM accounts WHERE key_id = $1",
    )
    .bind(key_id)
    .fetch_optional(executor)
    .await
    .map_err(map_query_err("fetch account by key"))
}

/// Load an account by its numeric identifier.
///
/// # Errors
///
/// Returns an error when the query fails.
pub async fn fetch_account_by_id<'e, E>(executor: E, id: i64) -> Result<Option<AccountRow>>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, AccountRow>(
        "SELECT id, key_id, secret_hash, display_name, email, contact_enabled, admin \
         FROM accounts WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
    .map_err(map_query_err("fetch account by id"))
}

/// Count provisioned accounts.
///
/// # Errors
///
/// Returns an error when the query fails.
pub async fn count_accounts<'e, E>(executor: E) -> Result<i64>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar("SELECT count(*) FROM accounts")
        .fetch_one(executor)
        .await
        .map_err(map_query_err("count accounts"))
}

/// Borrowed payload for an account upsert.
#[derive(Debug, Clone)]
pub struct UpsertAccount<'a> {
    /// API key identifier (unique).
    pub key_id: &'a str,
    /// Argon2 hash of the account secret.
    pub secret_hash: &'a str,
    /// Display name recorded on relayed messages.
    pub display_name: &'a str,
    /// Email address recorded on relayed messages.
    pub email: &'a str,
    /// Whether the account has opted in to being contacted.
    pub contact_enabled: bool,
    /// Whether the account may use the admin surface.
    pub admin: bool,
}

/// Insert or replace an account keyed by `key_id`.
///
/// Returns the numeric identifier of the stored account.
///
/// # Errors
///
/// Returns an error when the upsert fails.
pub async fn upsert_account<'e, E>(executor: E, account: &UpsertAccount<'_>) -> Result<i64>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar(
        "INSERT INTO accounts (key_id, secret_hash, display_name, email, contact_enabled, admin) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (key_id) DO UPDATE SET \
             secret_hash = EXCLUDED.secret_hash, \
             display_name = EXCLUDED.display_name, \
             email = EXCLUDED.email, \
             contact_enabled = EXCLUDED.contact_enabled, \
             admin = EXCLUDED.admin \
         RETURNING id",
    )
    .bind(account.key_id)
    .bind(account.secret_hash)
    .bind(account.display_name)
    .bind(account.email)
    .bind(account.contact_enabled)
    .bind(account.admin)
    .fetch_one(executor)
    .await
    .map_err(map_query_err("upsert account"))
}

/// Borrowed payload for a contact message insert.
#[derive(Debug, Clone)]
pub struct NewContactMessage<'a> {
    /// Message identifier.
    pub id: Uuid,
    /// Recipient account identifier.
    pub recipient: i64,
    /// Sender display name captured at submission time.
    pub sender_name: &'a str,
    /// Sender email captured at submission time.
    pub sender_email: &'a str,
    /// Message subject.
    pub subject: &'a str,
    /// Message body.
    pub body: &'a str,
    /// Whether the sender requested a copy.
    pub send_copy: bool,
}

/// Persist a contact message record.
///
/// # Errors
///
/// Returns an error when the insert fails.
pub async fn insert_contact_message<'e, E>(
    executor: E,
    message: &NewContactMessage<'_>,
) -> Result<()>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        "INSERT INTO contact_messages \
         (id, recipient, sender_name, sender_email, subject, body, send_copy) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(message.id)
    .bind(message.recipient)
    .bind(message.sender_name)
    .bind(message.sender_email)
    .bind(message.subject)
    .bind(message.body)
    .bind(message.send_copy)
    .execute(executor)
    .await
    .map_err(map_query_err("insert contact message"))?;
    Ok(())
}
