//! Router construction and server host for the API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{HeaderName, Method, Request, header::CONTENT_TYPE},
    middleware,
    routing::{get, post, put},
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::Span;
use vitrine_config::{ExposureService, SettingsFacade};
use vitrine_events::EventBus;
use vitrine_relay::ContactRelay;
use vitrine_telemetry::{Metrics, build_sha};

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::admin::{exposure_form, put_config_document, update_exposure, upsert_account};
use crate::http::auth::{require_admin, require_api_key};
use crate::http::constants::{HEADER_API_KEY, HEADER_REQUEST_ID};
use crate::http::contact::contact_user;
use crate::http::exposure::{allowed_configs, export_configuration};
use crate::http::health::{health, metrics};
use crate::http::telemetry::HttpMetricsLayer;
use crate::state::ApiState;

/// Axum router wrapper that hosts the Vitrine API services.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Construct a new API server with shared dependencies wired through
    /// application state.
    #[must_use]
    pub fn new(
        settings: ExposureService,
        relay: ContactRelay,
        events: EventBus,
        telemetry: Metrics,
    ) -> Self {
        Self::with_facade(Arc::new(settings), relay, events, telemetry)
    }

    /// Construct the server against any settings backend implementation.
    #[must_use]
    pub fn with_facade(
        settings: Arc<dyn SettingsFacade>,
        relay: ContactRelay,
        events: EventBus,
        telemetry: Metrics,
    ) -> Self {
        let state = Arc::new(ApiState::new(settings, relay, telemetry.clone(), events));

        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE, HeaderName::from_static(HEADER_API_KEY)]);
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let method = request.method().clone();
                let uri_path = request.uri().path();
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();

                tracing::info_span!(
                    "http.request",
                    method = %method,
                    route = %uri_path,
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    let status = response.status().as_u16();
                    span.record("status_code", status);
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(vitrine_telemetry::propagate_request_id_layer())
            .layer(vitrine_telemetry::set_request_id_layer())
            .layer(trace_layer)
            .layer(HttpMetricsLayer::new(telemetry));

        let router = Self::build_router(&state)
            .layer(cors_layer)
            .route_layer(layered)
            .with_state(state);

        Self { router }
    }

    fn build_router(state: &Arc<ApiState>) -> Router<Arc<ApiState>> {
        Self::public_routes()
            .merge(Self::api_routes(state))
            .merge(Self::admin_routes(state))
    }

    fn public_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/health", get(health))
            .route("/metrics", get(metrics))
    }

    fn api_routes(state: &Arc<ApiState>) -> Router<Arc<ApiState>> {
        let require_api = middleware::from_fn_with_state(state.clone(), require_api_key);

        Router::new()
            .route("/api/allowed-configs", get(allowed_configs))
            .route(
                "/api/configuration-export/{name}",
                get(export_configuration),
            )
            .route("/api/contact-user", post(contact_user))
            .layer(require_api)
    }

    fn admin_routes(state: &Arc<ApiState>) -> Router<Arc<ApiState>> {
        let require_api = middleware::from_fn_with_state(state.clone(), require_api_key);
        let require_admin = middleware::from_fn(require_admin);

        Router::new()
            .route(
                "/admin/exposure",
                get(exposure_form).put(update_exposure),
            )
            .route("/admin/configs/{name}", put(put_config_document))
            .route("/admin/accounts", post(upsert_account))
            .layer(require_admin)
            .layer(require_api)
    }

    /// Serve the API using the configured router on the supplied address.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind or the server
    /// terminates unexpectedly.
    pub async fn serve(self, addr: SocketAddr) -> ApiServerResult<()> {
        tracing::info!("Starting API on {}", addr);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        axum::serve(listener, self.router.into_make_service())
            .await
            .map_err(|source| ApiServerError::Serve { source })?;
        Ok(())
    }
}
