//! Inbound request processing.
//!
//! The [`EventReceiver`] drives one webhook request through the dispatch
//! state machine:
//!
//! ```text
//! Authenticating → Normalizing → ContextBuilding → MiddlewareRunning → HandlerRunning → Responded
//! ```
//!
//! The first failing stage ends processing and its error is returned to the
//! caller; no later stage runs. The platform's handshake probe
//! (`type == "url_verification"`) is answered after authentication and never
//! reaches normalization.
//!
//! # Examples
//!
//! ```rust
//! use courier_core::{
//!     verification::sign, ContextBuilder, DeferredExecutor, Dispatcher, EventReceiver,
//!     InMemoryCredentialStore, InboundRequest, ReceiveOutcome, RequestVerifier, SigningSecret,
//!     StaticRegistry,
//! };
//! use std::{collections::HashMap, sync::Arc};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let secret = SigningSecret::from("shhh");
//! let contexts = ContextBuilder::new(
//!     Arc::new(InMemoryCredentialStore::new()),
//!     url::Url::parse("https://slack.com/api/")?,
//! );
//! let dispatcher = Dispatcher::new(
//!     Arc::new(StaticRegistry::new()),
//!     Arc::new(DeferredExecutor::new()),
//! );
//! let receiver = EventReceiver::new(RequestVerifier::new(secret.clone()), contexts, dispatcher);
//!
//! let body = r#"{"type":"url_verification","challenge":"abc123"}"#;
//! let timestamp = chrono::Utc::now().timestamp().to_string();
//! let headers = HashMap::from([
//!     ("X-Slack-Request-Timestamp".to_string(), timestamp.clone()),
//!     ("X-Slack-Signature".to_string(), sign(&secret, &timestamp, body.as_bytes())),
//!     ("Content-Type".to_string(), "application/json".to_string()),
//! ]);
//!
//! let outcome = receiver.receive(InboundRequest::new(headers, body.into())).await?;
//! assert_eq!(outcome, ReceiveOutcome::Challenge("abc123".into()));
//! # Ok(())
//! # }
//! ```

use crate::{
    context::ContextBuilder,
    dispatch::{DispatchOutcome, Dispatcher},
    error::ReceiveError,
    events::{normalize, EventCategory},
    verification::RequestVerifier,
    DispatchId,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::{collections::HashMap, fmt};
use tracing::{debug, info, instrument, warn};

/// Default name of the request timestamp header.
pub const DEFAULT_TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Default name of the request signature header.
pub const DEFAULT_SIGNATURE_HEADER: &str = "x-slack-signature";

const URL_VERIFICATION: &str = "url_verification";

// ============================================================================
// Request / Outcome Types
// ============================================================================

/// Raw inbound webhook request.
///
/// Header names are matched case-insensitively.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    headers: HashMap<String, String>,
    body: Bytes,
    received_at: DateTime<Utc>,
}

impl InboundRequest {
    /// Create a request received now.
    pub fn new(headers: HashMap<String, String>, body: Bytes) -> Self {
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();

        Self {
            headers,
            body,
            received_at: Utc::now(),
        }
    }

    /// Override the receive time used for the freshness check.
    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }

    /// Get a header value by (case-insensitive) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Get the raw body bytes exactly as received.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

/// Successful result of processing one request.
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiveOutcome {
    /// Handshake probe; echo the challenge back unchanged.
    Challenge(Value),
    /// The event was dispatched.
    Dispatched {
        dispatch_id: DispatchId,
        category: EventCategory,
        outcome: DispatchOutcome,
    },
}

/// Processing stage of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Authenticating,
    Normalizing,
    ContextBuilding,
    MiddlewareRunning,
    HandlerRunning,
    Responded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Authenticating => "authenticating",
            Self::Normalizing => "normalizing",
            Self::ContextBuilding => "context_building",
            Self::MiddlewareRunning => "middleware_running",
            Self::HandlerRunning => "handler_running",
            Self::Responded => "responded",
        };
        write!(f, "{}", name)
    }
}

// ============================================================================
// Event Receiver
// ============================================================================

/// Authenticates, normalizes and dispatches inbound webhook requests.
#[derive(Debug, Clone)]
pub struct EventReceiver {
    verifier: RequestVerifier,
    timestamp_header: String,
    signature_header: String,
    contexts: ContextBuilder,
    dispatcher: Dispatcher,
}

impl EventReceiver {
    /// Create a receiver using the default header names.
    pub fn new(verifier: RequestVerifier, contexts: ContextBuilder, dispatcher: Dispatcher) -> Self {
        Self {
            verifier,
            timestamp_header: DEFAULT_TIMESTAMP_HEADER.to_string(),
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            contexts,
            dispatcher,
        }
    }

    /// Read the timestamp and signature from differently named headers.
    pub fn with_header_names(
        mut self,
        timestamp_header: impl Into<String>,
        signature_header: impl Into<String>,
    ) -> Self {
        self.timestamp_header = timestamp_header.into();
        self.signature_header = signature_header.into();
        self
    }

    /// Process one inbound request.
    ///
    /// # Errors
    ///
    /// * `ReceiveError::Auth` - signature missing, invalid or stale
    /// * `ReceiveError::MalformedBody` - body is neither JSON nor a usable form
    /// * `ReceiveError::Normalization` - payload shape not recognised
    /// * `ReceiveError::Context` - unknown tenant or credential store failure
    /// * `ReceiveError::Dispatch` - sync handlers misconfigured
    #[instrument(
        name = "receive",
        skip(self, request),
        fields(dispatch_id = tracing::field::Empty, body_len = request.body().len())
    )]
    pub async fn receive(&self, request: InboundRequest) -> Result<ReceiveOutcome, ReceiveError> {
        let dispatch_id = DispatchId::new();
        tracing::Span::current().record("dispatch_id", tracing::field::display(dispatch_id));

        debug!(stage = %Stage::Authenticating, "Stage transition");
        if let Err(e) = self.verifier.verify(
            request.body(),
            request.header(&self.timestamp_header),
            request.header(&self.signature_header),
            request.received_at(),
        ) {
            // The caller only ever sees the generic code; the variant is for operators.
            warn!(stage = %Stage::Authenticating, reason = ?e, "Rejected unauthenticated request");
            return Err(e.into());
        }

        let raw = decode_body(request.body(), request.header("content-type"))
            .inspect_err(|e| warn!(stage = %Stage::Normalizing, error = %e, "Malformed request body"))?;

        if raw.get("type").and_then(Value::as_str) == Some(URL_VERIFICATION) {
            let challenge = raw
                .get("challenge")
                .cloned()
                .ok_or_else(|| ReceiveError::MalformedBody {
                    message: "handshake probe without a challenge".to_string(),
                })?;
            info!("Answered handshake probe");
            return Ok(ReceiveOutcome::Challenge(challenge));
        }

        debug!(stage = %Stage::Normalizing, "Stage transition");
        let event = normalize(&raw).inspect_err(|e| {
            warn!(
                stage = %Stage::Normalizing,
                error = %e,
                payload_type = ?raw.get("type").and_then(|t| t.as_str()),
                "Rejected payload"
            )
        })?;
        let category = event.category();

        debug!(stage = %Stage::ContextBuilding, category = %category, kind = %event.kind(), "Stage transition");
        let context = self.contexts.resolve(&raw, &event).await?;

        debug!(stage = %Stage::MiddlewareRunning, tenant_id = %context.tenant_id(), "Stage transition");
        let outcome = self.dispatcher.dispatch(context, event).await?;

        info!(
            stage = %Stage::Responded,
            category = %category,
            outcome = ?outcome_label(&outcome),
            "Request handled"
        );

        Ok(ReceiveOutcome::Dispatched {
            dispatch_id,
            category,
            outcome,
        })
    }
}

fn outcome_label(outcome: &DispatchOutcome) -> &'static str {
    match outcome {
        DispatchOutcome::Acknowledged => "acknowledged",
        DispatchOutcome::Respond(_) => "responded",
        DispatchOutcome::Failed { .. } => "failed",
        DispatchOutcome::Scheduled => "scheduled",
    }
}

// ============================================================================
// Body Decoding
// ============================================================================

/// Decode a request body into a JSON payload.
///
/// Accepts a JSON object, a form-encoded body whose `payload` field holds
/// JSON (interactive payloads), or flat form fields (slash commands).
pub fn decode_body(body: &[u8], content_type: Option<&str>) -> Result<Value, ReceiveError> {
    let is_json = match content_type {
        Some(ct) => ct.to_ascii_lowercase().contains("json"),
        None => body
            .iter()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|b| *b == b'{'),
    };

    if is_json {
        return serde_json::from_slice(body).map_err(|e| ReceiveError::MalformedBody {
            message: format!("invalid JSON body: {}", e),
        });
    }

    let fields: Vec<(String, String)> = url::form_urlencoded::parse(body)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if let Some((_, payload)) = fields.iter().find(|(k, _)| k == "payload") {
        return serde_json::from_str(payload).map_err(|e| ReceiveError::MalformedBody {
            message: format!("invalid JSON in payload field: {}", e),
        });
    }

    if fields.is_empty() {
        return Err(ReceiveError::MalformedBody {
            message: "empty form body".to_string(),
        });
    }

    let object: Map<String, Value> = fields
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    Ok(Value::Object(object))
}

#[cfg(test)]
#[path = "receiver_tests.rs"]
mod tests;
