//! # Courier Core
//!
//! Event ingestion and dispatch engine for messaging-platform webhooks.
//!
//! This crate turns an authenticated inbound webhook into a typed [`Event`],
//! builds a per-request [`ExecutionContext`] for the tenant that sent it, runs
//! the configured middleware, and hands the result to application handlers
//! under the platform's response contracts.
//!
//! ## Architecture
//!
//! - [`verification`] - HMAC-SHA256 request signing and freshness checks
//! - [`events`] - shape-sniffing normalizer producing the four event variants
//! - [`context`] - tenant resolution and the copy-on-write execution context
//! - [`middleware`] - ordered, short-circuiting context transformers
//! - [`dispatch`] - sync (exactly one responder) and async (fire-and-forget) dispatch
//! - [`receiver`] - drives one inbound request through all of the above
//!
//! External collaborators (credential storage, handler registration, task
//! execution) are abstracted behind traits and injected at construction time.
//!
//! ## Usage
//!
//! ```rust
//! use courier_core::events::{normalize, Event};
//! use serde_json::json;
//!
//! let event = normalize(&json!({"command": "/deploy"})).unwrap();
//! match event {
//!     Event::Command(command) => assert_eq!(command.text, ""),
//!     _ => unreachable!(),
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub mod context;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod middleware;
pub mod receiver;
pub mod verification;

// Re-export commonly used types at crate root for convenience
pub use context::{ApiClient, ContextBuilder, ExecutionContext};
pub use credentials::{CredentialStore, CredentialToken, InMemoryCredentialStore};
pub use dispatch::{
    AsyncReply, DeferredExecutor, DispatchMode, DispatchOutcome, Dispatcher, Handler,
    HandlerError, Registry, StaticRegistry, SyncReply, TaskExecutor, TokioExecutor,
};
pub use error::{
    AuthError, ContextError, CredentialError, DispatchError, MiddlewareError, NormalizationError,
    ReceiveError,
};
pub use events::{Event, EventCategory};
pub use middleware::{Middleware, MiddlewareOutcome, MiddlewarePipeline};
pub use receiver::{EventReceiver, InboundRequest, ReceiveOutcome};
pub use verification::{RequestVerifier, SigningSecret};

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Identifier of a tenant (workspace) that has installed the application.
///
/// Tenant ids key the credential store, so an empty id is never valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Create a tenant id, rejecting empty or whitespace-only values.
    pub fn new(value: impl Into<String>) -> Result<Self, InvalidTenantId> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(InvalidTenantId);
        }
        Ok(Self(value))
    }

    /// Get string representation of the tenant id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for TenantId {
    type Error = InvalidTenantId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(value: TenantId) -> Self {
        value.0
    }
}

/// Returned when a tenant id is empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("tenant id must not be empty")]
pub struct InvalidTenantId;

/// Correlation id assigned to each inbound request.
///
/// Carried on every log line of a dispatch, including the detached task of an
/// asynchronous dispatch, so the two halves can be joined in log search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DispatchId(Uuid);

impl DispatchId {
    /// Generate a new random dispatch id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DispatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DispatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
