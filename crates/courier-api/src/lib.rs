//! # Courier API
//!
//! HTTP surface of the Courier webhook dispatch engine.
//!
//! This crate provides:
//! - The webhook endpoint that feeds inbound requests to an [`EventReceiver`]
//! - A health endpoint
//! - Mapping of receive outcomes and errors to HTTP responses
//! - Service configuration and its layered loading
//! - Server start-up with graceful shutdown that drains in-flight async dispatches

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use courier_core::{
    ContextBuilder, CredentialToken, DispatchOutcome, Dispatcher, EventReceiver, InboundRequest,
    InMemoryCredentialStore, ReceiveOutcome, Registry, RequestVerifier, SigningSecret,
    TaskExecutor, TenantId, TokioExecutor,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info, instrument, warn};

pub mod config;
pub mod errors;

pub use config::{
    load_config, ApiConfig, InstallationConfig, LoggingConfig, ServerConfig, ServiceConfig,
    WebhookConfig,
};
pub use errors::{ConfigError, ServiceError, WebhookHandlerError};

/// Header carrying the per-request correlation id.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

// ============================================================================
// Application State
// ============================================================================

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub receiver: EventReceiver,
}

impl AppState {
    pub fn new(config: ServiceConfig, receiver: EventReceiver) -> Self {
        Self {
            config: Arc::new(config),
            receiver,
        }
    }
}

/// Build the credential store from the configured installations.
///
/// # Errors
///
/// Returns `ConfigError::Invalid` for an installation with an empty tenant id.
pub fn credential_store_from_config(
    config: &ServiceConfig,
) -> Result<InMemoryCredentialStore, ConfigError> {
    let installations = config
        .installations
        .iter()
        .map(|installation| {
            let tenant_id = TenantId::new(installation.tenant_id.as_str()).map_err(|e| {
                ConfigError::Invalid {
                    message: format!("installation tenant_id: {}", e),
                }
            })?;
            Ok((tenant_id, CredentialToken::new(installation.token.as_str())))
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    Ok(InMemoryCredentialStore::with_credentials(installations))
}

/// Wire an [`EventReceiver`] from configuration.
///
/// Credentials come from `config.installations`; handlers and middleware
/// from `registry`; asynchronous work goes to `executor`.
///
/// # Errors
///
/// Returns a `ConfigError` when the configuration fails validation.
pub fn build_receiver(
    config: &ServiceConfig,
    registry: Arc<dyn Registry>,
    executor: Arc<dyn TaskExecutor>,
) -> Result<EventReceiver, ConfigError> {
    config.validate()?;

    let verifier = RequestVerifier::new(SigningSecret::new(config.webhooks.signing_secret.as_str()))
        .with_freshness_window(config.webhooks.freshness_window()?);
    let store = credential_store_from_config(config)?;
    let contexts = ContextBuilder::new(Arc::new(store), config.api.parsed_base_url()?);
    let dispatcher = Dispatcher::new(registry, executor);

    info!(
        installations = config.installations.len(),
        freshness_window_seconds = config.webhooks.freshness_window_seconds,
        "Event receiver configured"
    );

    Ok(EventReceiver::new(verifier, contexts, dispatcher).with_header_names(
        config.webhooks.timestamp_header.as_str(),
        config.webhooks.signature_header.as_str(),
    ))
}

// ============================================================================
// Router and Server
// ============================================================================

/// Create the HTTP router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let max_body_size = state.config.server.max_body_size;

    let webhook_routes =
        Router::new().route(&state.config.webhooks.endpoint_path, post(handle_webhook));

    let health_routes = Router::new().route("/health", get(handle_health_check));

    Router::new()
        .merge(webhook_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_logging_middleware))
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(max_body_size))
                .into_inner(),
        )
        .with_state(state)
}

/// Start the HTTP server and run until a shutdown signal arrives.
///
/// After the server stops accepting requests, in-flight async dispatches on
/// `executor` are given `server.shutdown_timeout_seconds` to finish.
pub async fn start_server(
    config: ServiceConfig,
    receiver: EventReceiver,
    executor: TokioExecutor,
) -> Result<(), ServiceError> {
    let address = format!("{}:{}", config.server.host, config.server.port);
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);

    let app = create_router(AppState::new(config, receiver));

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        })?;

    info!("Starting HTTP server on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_timeout))
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    if !executor.drain(shutdown_timeout).await {
        warn!(
            in_flight = executor.in_flight(),
            "Shutdown timeout reached with async dispatches still running"
        );
    }

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
///
/// A signal source that cannot be installed is logged and never fires.
async fn shutdown_signal(shutdown_timeout: Duration) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
        },
    }
}

// ============================================================================
// HTTP Handlers
// ============================================================================

/// Handle an inbound webhook request
///
/// The raw body is handed to the receiver untouched; signature verification
/// depends on the exact bytes.
#[instrument(
    skip(state, headers, body),
    fields(body_len = body.len(), correlation_id = tracing::field::Empty)
)]
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, WebhookHandlerError> {
    // The receive span nests under this one, so dispatch logs carry both ids.
    if let Some(correlation_id) = correlation_id_from(&headers) {
        tracing::Span::current().record("correlation_id", correlation_id);
    }

    let header_map: HashMap<String, String> = headers
        .iter()
        .filter_map(|(k, v)| {
            v.to_str()
                .ok()
                .map(|value| (k.as_str().to_lowercase(), value.to_string()))
        })
        .collect();

    let outcome = state
        .receiver
        .receive(InboundRequest::new(header_map, body))
        .await?;

    match outcome {
        ReceiveOutcome::Challenge(challenge) => {
            Ok(Json(serde_json::json!({ "challenge": challenge })).into_response())
        }
        ReceiveOutcome::Dispatched {
            dispatch_id,
            outcome,
            ..
        } => match outcome {
            DispatchOutcome::Acknowledged | DispatchOutcome::Scheduled => {
                Ok(StatusCode::OK.into_response())
            }
            DispatchOutcome::Respond(payload) => Ok(Json(payload).into_response()),
            DispatchOutcome::Failed { reason } => {
                warn!(dispatch_id = %dispatch_id, "Interaction failed in handler");
                Err(WebhookHandlerError::HandlerFailed { reason })
            }
        },
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[instrument(skip_all)]
async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Log request start and completion with a correlation id.
///
/// Uses the caller's `x-correlation-id` header when present, otherwise
/// assigns one and writes it into the request headers so the webhook handler
/// can attach it to its span.
async fn request_logging_middleware(
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let correlation_id = match correlation_id_from(request.headers()) {
        Some(id) => id.to_string(),
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            if let Ok(value) = HeaderValue::from_str(&id) {
                request.headers_mut().insert(CORRELATION_ID_HEADER, value);
            }
            id
        }
    };

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = std::time::Instant::now();
    info!(correlation_id = %correlation_id, method = %method, path = %path, "Request started");

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }

    let status = response.status();
    let duration_ms = start.elapsed().as_millis();
    match (status.is_server_error(), status.is_client_error()) {
        (true, _) => error!(
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms,
            "Request completed with server error"
        ),
        (_, true) => warn!(
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms,
            "Request completed with client error"
        ),
        _ => info!(
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms,
            "Request completed"
        ),
    }

    response
}

fn correlation_id_from(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
