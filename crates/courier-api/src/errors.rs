//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use courier_core::{ContextError, ReceiveError};
use tracing::{error, warn};

/// Seconds a client is asked to wait before retrying a transient failure.
const RETRY_AFTER_SECONDS: u64 = 30;

/// Webhook handler errors with HTTP status code mapping
///
/// - `401 Unauthorized`: signature missing, invalid or stale
/// - `400 Bad Request`: body malformed or payload shape not recognised
/// - `403 Forbidden`: no credential installed for the tenant
/// - `500 Internal Server Error`: a handler signalled failure, or the handler
///   set is misconfigured (several or no responders)
/// - `503 Service Unavailable`: the credential store is temporarily down
///
/// Response bodies are `{"error": <code>}` using the stable codes of
/// [`ReceiveError::code`]. Details stay in the server-side logs.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    /// The request failed somewhere in the receive pipeline
    #[error("Processing failed: {0}")]
    ProcessingFailed(#[from] ReceiveError),

    /// A sync handler claimed the interaction and reported failure
    ///
    /// The reason is application-supplied and returned verbatim.
    #[error("Handler failed: {reason}")]
    HandlerFailed { reason: String },
}

impl WebhookHandlerError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::ProcessingFailed(e) => match e {
                ReceiveError::Auth(_) => StatusCode::UNAUTHORIZED,
                ReceiveError::MalformedBody { .. } | ReceiveError::Normalization(_) => {
                    StatusCode::BAD_REQUEST
                }
                ReceiveError::Context(ContextError::UnknownTenant { .. }) => StatusCode::FORBIDDEN,
                ReceiveError::Context(ContextError::CredentialStore(_)) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                ReceiveError::Dispatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::HandlerFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (message, retry_after) = match &self {
            Self::ProcessingFailed(e) => {
                if status.is_server_error() {
                    error!(error = %e, code = e.code(), "Webhook processing failed");
                } else {
                    warn!(code = e.code(), "Webhook rejected");
                }
                let retry_after = e.is_transient().then_some(RETRY_AFTER_SECONDS);
                (e.code().to_string(), retry_after)
            }
            Self::HandlerFailed { reason } => {
                warn!(reason = %reason, "Handler signalled failure");
                (reason.clone(), None)
            }
        };

        let body = serde_json::json!({ "error": message });
        let mut response = (status, Json(body)).into_response();

        if let Some(retry_seconds) = retry_after {
            if let Ok(header_value) = retry_seconds.to_string().parse() {
                response.headers_mut().insert("Retry-After", header_value);
            }
        }

        response
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl ServiceError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BindFailed { .. } => 1,
            Self::ServerFailed { .. } => 2,
            Self::Configuration(_) => 3,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration loading failed: {0}")]
    Loading(#[from] config::ConfigError),
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
