//! Exposure settings and configuration document queries.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Executor, FromRow, PgPool, Postgres};
use uuid::Uuid;

use crate::error::{DataError, Result, map_query_err};

/// LISTEN/NOTIFY channel for exposure settings revision broadcasts.
pub const SETTINGS_CHANNEL: &str = "vitrine_settings_changed";

/// Fixed identity of the singleton exposure settings record.
pub const EXPOSURE_SETTINGS_ID: Uuid = Uuid::from_u128(1);

/// Apply all schema migrations.
///
/// # Errors
///
/// Returns an error when migration execution fails.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|source| DataError::MigrationFailed { source })?;
    Ok(())
}

/// Raw projection of the `exposure_settings` singleton row.
#[derive(Debug, Clone, FromRow)]
pub struct ExposureSettingsRow {
    /// Fixed identity of the settings record.
    pub id: Uuid,
    /// Ordered allow-list of configuration document names.
    pub selected_configs: Vec<String>,
    /// Monotonic revision bumped on every save.
    pub revision: i64,
    /// Timestamp of the most recent save.
    pub updated_at: DateTime<Utc>,
}

/// Load the exposure settings row for the provided identity.
///
/// # Errors
///
/// Returns an error when the query fails.
pub async fn fetch_exposure_settings<'e, E>(executor: E, id: Uuid) -> Result<ExposureSettingsRow>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, ExposureSettingsRow>(
        "SELECT id, selected_configs, revision, updated_at FROM exposure_settings WHERE id = $1",
    )
    .bind(id)
    .fetch_one(executor)
    .await
    .map_err(map_query_err("fetch exposure settings"))
}

/// Replace the persisted allow-list wholesale, bumping the revision.
///
/// Returns the revision recorded after the save.
///
/// # Errors
///
/// Returns an error when the update fails.
pub async fn replace_selection<'e, E>(executor: E, id: Uuid, names: &[String]) -> Result<i64>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar(
        "UPDATE exposure_settings \
         SET selected_configs = $2, revision = revision + 1, updated_at = now() \
         WHERE id = $1 RETURNING revision",
    )
    .bind(id)
    .bind(names)
    .fetch_one(executor)
    .await
    .map_err(map_query_err("replace exposure selection"))
}

/// Broadcast a settings change on [`SETTINGS_CHANNEL`].
///
/// The payload follows the `table:revision:operation` convention consumed by
/// the settings stream.
///
/// # Errors
///
/// Returns an error when the notification statement fails.
pub async fn notify_settings_changed<'e, E>(executor: E, revision: i64) -> Result<()>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query("SELECT pg_notify($1, $2)")
        .bind(SETTINGS_CHANNEL)
        .bind(format!("exposure_settings:{revision}:update"))
        .execute(executor)
        .await
        .map_err(map_query_err("notify settings changed"))?;
    Ok(())
}

/// Enumerate every known configuration document name, sorted.
///
/// # Errors
///
/// Returns an error when the query fails.
pub async fn list_document_names<'e, E>(executor: E) -> Result<Vec<String>>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar("SELECT name FROM config_documents ORDER BY name")
        .fetch_all(executor)
        .await
        .map_err(map_query_err("list configuration document names"))
}

/// Load the raw content of a configuration document by name.
///
/// # Errors
///
/// Returns an error when the query fails.
pub async fn fetch_document_content<'e, E>(executor: E, name: &str) -> Result<Option<Value>>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar("SELECT content FROM config_documents WHERE name = $1")
        .bind(name)
        .fetch_optional(executor)
        .await
        .map_err(map_query_err("fetch configuration document"))
}

/// Insert or replace a configuration document.
///
/// # Errors
///
/// Returns an error when the upsert fails.
pub async fn upsert_document<'e, E>(executor: E, name: &str, content: &Value) -> Result<()>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        "INSERT INTO config_documents (name, content) VALUES ($1, $2) \
         ON CONFLICT (name) DO UPDATE SET content = EXCLUDED.content, updated_at = now()",
    )
    .bind(name)
    .bind(content)
    .execute(executor)
    .await
    .map_err(map_query_err("upsert configuration document"))?;
    Ok(())
}
