//! Error types for Courier ingestion and dispatch.
//!
//! Every stage of the request state machine has its own error type. They are
//! combined into [`ReceiveError`] by the receiver, and each one carries a
//! stable, machine-readable [`code`](ReceiveError::code) that the HTTP layer
//! puts into response bodies.

use thiserror::Error;

/// Request authentication failures.
///
/// Both variants are surfaced to the caller identically (HTTP 401 with the
/// same body). The distinction exists for server-side logging only; callers
/// must not be told which sub-check failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Missing or malformed headers, unparsable timestamp, or signature mismatch.
    #[error("invalid request signature")]
    InvalidSignature,

    /// The request timestamp is outside the freshness window.
    #[error("request timestamp outside the freshness window")]
    StaleTimestamp,
}

impl AuthError {
    /// Machine-readable code returned to the caller.
    pub fn code(&self) -> &'static str {
        "invalid_request_signature"
    }
}

/// Payload normalization failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    /// None of the shape rules matched the raw payload.
    #[error("payload shape not recognised")]
    UnrecognizedPayloadShape,
}

/// Errors raised by a [`CredentialStore`](crate::credentials::CredentialStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// No credential is installed for the tenant.
    #[error("no credential installed for tenant {tenant_id}")]
    NotFound { tenant_id: String },

    /// The backing store could not be reached (retryable).
    #[error("credential store unavailable: {message}")]
    Unavailable { message: String },
}

impl CredentialError {
    /// Check if this error represents a transient condition.
    ///
    /// Only `Unavailable` is considered transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Context building failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The tenant could not be identified or has no installed credential.
    #[error("unknown tenant: {tenant_id}")]
    UnknownTenant { tenant_id: String },

    /// The credential store failed for a reason other than a miss.
    #[error("credential lookup failed: {0}")]
    CredentialStore(#[source] CredentialError),
}

/// Error returned by a middleware that cannot produce a valid outcome.
///
/// The pipeline treats this as a contract violation: it is logged and the
/// traversal continues with the context as it was before the middleware ran.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MiddlewareError {
    #[error("middleware failed: {message}")]
    Failed { message: String },
}

impl MiddlewareError {
    /// Convenience constructor.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Dispatch misconfiguration.
///
/// These indicate a programming error in the application's handler set. They
/// are returned to the caller rather than aborting the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Two handlers both claimed the same synchronous interaction.
    #[error("multiple handlers responded: {first} and {second}")]
    MultipleResponders { first: String, second: String },

    /// No handler acknowledged a synchronous interaction.
    #[error("no handler responded to a synchronous interaction ({handlers} handlers registered)")]
    NoHandlerResponded { handlers: usize },
}

/// Top-level error for a single inbound request.
#[derive(Debug, Error)]
pub enum ReceiveError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("malformed request body: {message}")]
    MalformedBody { message: String },

    #[error("normalization failed: {0}")]
    Normalization(#[from] NormalizationError),

    #[error("context building failed: {0}")]
    Context(#[from] ContextError),

    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}

impl ReceiveError {
    /// Machine-readable code for response bodies and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth(e) => e.code(),
            Self::MalformedBody { .. } => "unrecognized_payload",
            Self::Normalization(_) => "unrecognized_payload",
            Self::Context(ContextError::UnknownTenant { .. }) => "unknown_tenant",
            Self::Context(ContextError::CredentialStore(_)) => "credential_store_unavailable",
            Self::Dispatch(DispatchError::MultipleResponders { .. }) => "multiple_responders",
            Self::Dispatch(DispatchError::NoHandlerResponded { .. }) => "no_handler_responded",
        }
    }

    /// Check if the error is transient and the platform may usefully retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Context(ContextError::CredentialStore(e)) => e.is_transient(),
            _ => false,
        }
    }
}

/// Render a caught panic payload for logging.
pub(crate) fn describe_panic(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
