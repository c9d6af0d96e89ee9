//! Handler trait and reply types.

use crate::{context::ExecutionContext, events::Event};
use async_trait::async_trait;
use serde_json::Value;

/// Error type returned by handlers.
///
/// Boxed so applications can return any error type.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Reply of a handler's synchronous capability.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncReply {
    /// The handler does not offer a synchronous capability.
    NotImplemented,
    /// The handler saw the event and chose not to act on it.
    Ignore,
    /// The handler acted on the event but does not claim the response.
    Ok,
    /// The handler claims the interaction with this response payload.
    ///
    /// `Value::Null` acknowledges without a body.
    Respond(Value),
    /// The handler claims the interaction and reports a failure to the caller.
    Fail(String),
}

impl SyncReply {
    /// Acknowledge the interaction with an empty body.
    pub fn ack() -> Self {
        Self::Respond(Value::Null)
    }

    /// Respond with a JSON payload.
    pub fn respond(payload: impl Into<Value>) -> Self {
        Self::Respond(payload.into())
    }

    /// Signal failure with a reason returned to the caller.
    pub fn fail(reason: impl Into<String>) -> Self {
        Self::Fail(reason.into())
    }

    /// Check if this reply claims the interaction.
    pub fn is_response(&self) -> bool {
        matches!(self, Self::Respond(_) | Self::Fail(_))
    }
}

/// Reply of a handler's asynchronous capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncReply {
    NotImplemented,
    Done,
}

/// Application handler for normalized events.
///
/// Both capabilities are optional. The default implementations return the
/// `NotImplemented` sentinel so a handler only overrides what it supports.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use courier_core::{Event, ExecutionContext, Handler, HandlerError, SyncReply};
/// use serde_json::json;
///
/// struct DeployCommand;
///
/// #[async_trait]
/// impl Handler for DeployCommand {
///     async fn handle_sync(
///         &self,
///         event: &Event,
///         _context: &ExecutionContext,
///     ) -> Result<SyncReply, HandlerError> {
///         match event {
///             Event::Command(command) if command.command == "/deploy" => {
///                 Ok(SyncReply::respond(json!({"text": format!("Deploying {}", command.text)})))
///             }
///             _ => Ok(SyncReply::Ignore),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Handler: Send + Sync {
    /// Name used in logs and dispatch errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Handle a command, action or view submission within the platform's
    /// acknowledgement deadline.
    async fn handle_sync(
        &self,
        _event: &Event,
        _context: &ExecutionContext,
    ) -> Result<SyncReply, HandlerError> {
        Ok(SyncReply::NotImplemented)
    }

    /// Handle a background notification off the request path.
    async fn handle_async(
        &self,
        _event: &Event,
        _context: &ExecutionContext,
    ) -> Result<AsyncReply, HandlerError> {
        Ok(AsyncReply::NotImplemented)
    }
}
