//! Application bootstrap: environment loading, service wiring, and the
//! settings change listener.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};
use vitrine_api::ApiServer;
use vitrine_config::{AccountUpsert, ExposureService, SettingsFacade, SettingsStream};
use vitrine_events::{Event, EventBus};
use vitrine_relay::{ContactRelay, GatewayMailer};
use vitrine_telemetry::{GlobalContextGuard, LoggingConfig, Metrics};

use crate::error::{AppError, AppResult};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1";
const DEFAULT_HTTP_PORT: u16 = 8600;

/// Service configuration resolved from the environment.
pub(crate) struct ServiceSettings {
    database_url: String,
    bind_addr: IpAddr,
    http_port: u16,
    mail_gateway: String,
    bootstrap_key: Option<(String, String)>,
}

impl ServiceSettings {
    /// Resolve the production configuration from environment variables.
    pub(crate) fn from_env() -> AppResult<Self> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| AppError::MissingEnv {
            name: "DATABASE_URL",
        })?;
        let mail_gateway =
            std::env::var("VITRINE_MAIL_GATEWAY").map_err(|_| AppError::MissingEnv {
                name: "VITRINE_MAIL_GATEWAY",
            })?;
        let bind_addr = parse_bind_addr(
            std::env::var("VITRINE_BIND_ADDR")
                .ok()
                .as_deref()
                .unwrap_or(DEFAULT_BIND_ADDR),
        )?;
        let http_port = match std::env::var("VITRINE_HTTP_PORT").ok() {
            Some(raw) => parse_port(&raw)?,
            None => DEFAULT_HTTP_PORT,
        };
        let bootstrap_key = std::env::var("VITRINE_BOOTSTRAP_KEY")
            .ok()
            .map(|raw| parse_bootstrap_key(&raw))
            .transpose()?;

        Ok(Self {
            database_url,
            bind_addr,
            http_port,
            mail_gateway,
            bootstrap_key,
        })
    }
}

/// Entry point for the Vitrine application boot sequence.
///
/// # Errors
///
/// Returns an error if environment loading or application startup fails.
pub async fn run_app() -> AppResult<()> {
    let settings = ServiceSettings::from_env()?;
    Box::pin(run_app_with(settings)).await
}

/// Boot sequence that relies entirely on injected settings to simplify
/// testing.
pub(crate) async fn run_app_with(settings: ServiceSettings) -> AppResult<()> {
    vitrine_telemetry::init_logging(&LoggingConfig::default())
        .map_err(|detail| AppError::telemetry("telemetry.init", detail))?;
    let _context = GlobalContextGuard::new("bootstrap");

    info!("Vitrine application bootstrap starting");

    let config = ExposureService::new(settings.database_url)
        .await
        .map_err(|source| AppError::config("exposure_service.new", source))?;
    let events = EventBus::new();
    let telemetry =
        Metrics::new().map_err(|detail| AppError::telemetry("telemetry.metrics", detail))?;

    ensure_bootstrap_account(&config, settings.bootstrap_key.as_ref()).await?;

    let listener_task = match config.subscribe_changes().await {
        Ok(stream) => Some(spawn_settings_listener(
            stream,
            events.clone(),
            telemetry.clone(),
        )),
        Err(err) => {
            warn!(error = %err, "failed to attach settings listener; change events disabled");
            None
        }
    };

    let relay = ContactRelay::new(
        Arc::new(config.clone()),
        Arc::new(config.pool().clone()),
        Arc::new(GatewayMailer::new(settings.mail_gateway)),
    );
    let api = ApiServer::new(config, relay, events, telemetry);

    let addr = SocketAddr::new(settings.bind_addr, settings.http_port);
    info!(addr = %addr, "Launching API listener");
    let serve_result = api.serve(addr).await;

    if let Some(task) = listener_task {
        if !task.is_finished() {
            task.abort();
        }
        if let Err(err) = task.await {
            warn!(error = %err, "settings listener join failed");
        }
    }

    serve_result.map_err(|source| AppError::api_server("api_server.serve", source))?;
    info!("API server shutdown complete");
    Ok(())
}

/// Provision the first administrator account when the directory is empty.
async fn ensure_bootstrap_account(
    config: &ExposureService,
    bootstrap_key: Option<&(String, String)>,
) -> AppResult<()> {
    let Some((key_id, secret)) = bootstrap_key else {
        return Ok(());
    };

    let has_accounts = config
        .has_accounts()
        .await
        .map_err(|source| AppError::config("exposure_service.has_accounts", source))?;
    if has_accounts {
        return Ok(());
    }

    config
        .upsert_account(AccountUpsert {
            key_id: key_id.clone(),
            secret: Some(secret.clone()),
            display_name: "Administrator".to_string(),
            email: "admin@localhost".to_string(),
            contact_enabled: false,
            admin: true,
        })
        .await
        .map_err(|source| AppError::config("exposure_service.upsert_account", source))?;

    info!(account = %key_id, "bootstrap administrator account provisioned");
    Ok(())
}

/// Forward settings change notifications to the in-process event bus.
///
/// Saves made by other replicas surface here too, so every instance can mark
/// its tagged responses stale.
fn spawn_settings_listener(
    mut stream: SettingsStream,
    events: EventBus,
    telemetry: Metrics,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            match result {
                Ok(change) => {
                    telemetry.set_settings_revision(change.revision);
                    telemetry.inc_event("exposure_changed");
                    let _ = events.publish(Event::ExposureChanged {
                        revision: change.revision,
                    });
                    info!(
                        revision = change.revision,
                        table = %change.table,
                        "exposure settings changed"
                    );
                }
                Err(err) => {
                    warn!(error = %err, "settings listener terminated");
                    break;
                }
            }
        }
    })
}

fn parse_bind_addr(raw: &str) -> AppResult<IpAddr> {
    raw.trim()
        .parse::<IpAddr>()
        .map_err(|_| AppError::InvalidConfig {
            field: "bind_addr",
            reason: "unparsable",
            value: Some(raw.to_string()),
        })
}

fn parse_port(raw: &str) -> AppResult<u16> {
    let port = raw
        .trim()
        .parse::<u16>()
        .map_err(|_| AppError::InvalidConfig {
            field: "http_port",
            reason: "unparsable",
            value: Some(raw.to_string()),
        })?;
    if port == 0 {
        return Err(AppError::InvalidConfig {
            field: "http_port",
            reason: "zero",
            value: Some(raw.to_string()),
        });
    }
    Ok(port)
}

fn parse_bootstrap_key(raw: &str) -> AppResult<(String, String)> {
    raw.split_once(':')
        .map(|(key_id, secret)| (key_id.trim().to_string(), secret.to_string()))
        .filter(|(key_id, secret)| !key_id.is_empty() && !secret.is_empty())
        .ok_or_else(|| AppError::InvalidConfig {
            field: "bootstrap_key",
            reason: "expected key_id:secret",
            value: None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_addr_parses_and_rejects_garbage() -> AppResult<()> {
        assert_eq!(parse_bind_addr("127.0.0.1")?, IpAddr::from([127, 0, 0, 1]));
        assert_eq!(parse_bind_addr(" ::1 ")?, "::1".parse::<IpAddr>().expect("ipv6"));
        assert!(parse_bind_addr("not-an-address").is_err());
        Ok(())
    }

    #[test]
    fn port_parses_and_rejects_zero() -> AppResult<()> {
        assert_eq!(parse_port("8600")?, 8600);
        assert!(parse_port("0").is_err());
        assert!(parse_port("seventy").is_err());
        Ok(())
    }

    #[test]
    fn bootstrap_key_requires_both_halves() -> AppResult<()> {
        let (key_id, secret) = parse_bootstrap_key("admin:swordfish")?;
        assert_eq!(key_id, "admin");
        assert_eq!(secret, "swordfish");
        assert!(parse_bootstrap_key("admin").is_err());
        assert!(parse_bootstrap_key(":swordfish").is_err());
        assert!(parse_bootstrap_key("admin:").is_err());
        Ok(())
    }
}
