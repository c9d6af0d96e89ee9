//! Default middleware and handler set.
//!
//! The stock service acknowledges every interaction and logs every event, so
//! a fresh deployment can complete the platform handshake and accept
//! traffic before any application handlers exist.

use async_trait::async_trait;
use courier_core::{
    middleware::from_fn, AsyncReply, Event, ExecutionContext, Handler, HandlerError,
    MiddlewareOutcome, StaticRegistry, SyncReply,
};
use tracing::{debug, info};

/// Assign key under which the audit middleware records the event kind.
pub const EVENT_KIND_ASSIGN: &str = "event_kind";

/// Acknowledges every interaction and logs background events.
#[derive(Debug, Default)]
pub struct AcknowledgeHandler;

#[async_trait]
impl Handler for AcknowledgeHandler {
    fn name(&self) -> &str {
        "acknowledge"
    }

    async fn handle_sync(
        &self,
        event: &Event,
        context: &ExecutionContext,
    ) -> Result<SyncReply, HandlerError> {
        info!(
            tenant_id = %context.tenant_id(),
            category = %event.category(),
            kind = %event.kind(),
            "Acknowledging interaction"
        );
        Ok(SyncReply::ack())
    }

    async fn handle_async(
        &self,
        event: &Event,
        context: &ExecutionContext,
    ) -> Result<AsyncReply, HandlerError> {
        info!(
            tenant_id = %context.tenant_id(),
            kind = %event.kind(),
            user_id = event.user_id().unwrap_or_default(),
            channel_id = event.channel_id().unwrap_or_default(),
            "Background event received"
        );
        Ok(AsyncReply::Done)
    }
}

/// Registry used by the service binary.
pub fn default_registry() -> StaticRegistry {
    StaticRegistry::new()
        .with_middleware(from_fn("audit", |context: &ExecutionContext, event: &Event| {
            debug!(tenant_id = %context.tenant_id(), kind = %event.kind(), "Audit");
            Ok(MiddlewareOutcome::Continue(
                context.with_assign(EVENT_KIND_ASSIGN, event.kind()),
            ))
        }))
        .with_handler(AcknowledgeHandler)
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
