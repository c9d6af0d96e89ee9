//! # Handler Dispatch
//!
//! Runs middleware and application handlers for a normalized event under one
//! of two contracts, selected by the event's category:
//!
//! - **Sync** (commands, actions, view submissions): handlers run in
//!   registration order on the request path. Exactly one handler must claim
//!   the interaction; a second claimant is a [`DispatchError::MultipleResponders`]
//!   and no claimant is a [`DispatchError::NoHandlerResponded`].
//! - **Async** (background notifications): middleware and handlers run on a
//!   detached task obtained from the injected [`TaskExecutor`]. The caller
//!   gets [`DispatchOutcome::Scheduled`] immediately. Failures are logged,
//!   never reported back, and never retried.
//!
//! In both modes a failing or panicking handler is isolated from its siblings.

use crate::{
    context::ExecutionContext,
    error::{describe_panic, DispatchError},
    events::{Event, EventCategory},
    middleware::MiddlewarePipeline,
    receiver::Stage,
};
use futures::FutureExt;
use serde_json::Value;
use std::{fmt, panic::AssertUnwindSafe, sync::Arc};
use tracing::{debug, error, info, warn, Instrument};

pub mod executor;
pub mod handler;
pub mod registry;

pub use executor::{DeferredExecutor, TaskExecutor, TokioExecutor};
pub use handler::{AsyncReply, Handler, HandlerError, SyncReply};
pub use registry::{Registry, StaticRegistry};

/// How an event is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    Sync,
    Async,
}

impl DispatchMode {
    /// Background notifications are async; every interactive shape is sync.
    pub fn for_event(event: &Event) -> Self {
        match event.category() {
            EventCategory::Background => Self::Async,
            EventCategory::Command | EventCategory::Action | EventCategory::ViewSubmission => {
                Self::Sync
            }
        }
    }
}

/// Result of a dispatch, as seen by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Acknowledged without a payload (ack-only reply or halted dispatch).
    Acknowledged,
    /// A handler responded with this payload.
    Respond(Value),
    /// A handler claimed the interaction and signalled failure.
    Failed { reason: String },
    /// Work was handed to the executor; nothing more will be reported.
    Scheduled,
}

/// Dispatches events to registered handlers.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<dyn Registry>,
    executor: Arc<dyn TaskExecutor>,
}

impl Dispatcher {
    pub fn new(registry: Arc<dyn Registry>, executor: Arc<dyn TaskExecutor>) -> Self {
        Self { registry, executor }
    }

    /// Dispatch `event` in the mode its category requires.
    ///
    /// The registry is queried once, before any middleware runs.
    ///
    /// # Errors
    ///
    /// Only sync dispatches fail: see [`run_sync`].
    pub async fn dispatch(
        &self,
        context: ExecutionContext,
        event: Event,
    ) -> Result<DispatchOutcome, DispatchError> {
        let pipeline = MiddlewarePipeline::new(self.registry.middleware());
        let handlers = self.registry.handlers();
        let mode = DispatchMode::for_event(&event);

        debug!(
            mode = ?mode,
            kind = %event.kind(),
            middleware = pipeline.len(),
            handlers = handlers.len(),
            "Dispatching event"
        );

        match mode {
            DispatchMode::Sync => {
                let context = pipeline.run(context, &event);
                run_sync(&handlers, &context, &event).await
            }
            DispatchMode::Async => {
                let task = async move {
                    let context = pipeline.run(context, &event);
                    run_async(&handlers, &context, &event).await;
                }
                .instrument(tracing::Span::current());

                self.executor.spawn(task.boxed());
                Ok(DispatchOutcome::Scheduled)
            }
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

/// Run the sync capability of every handler and collect the single response.
///
/// Every handler runs, even after one has responded, so that a second
/// responder is detected. A halted context skips all handlers.
///
/// # Errors
///
/// * `DispatchError::MultipleResponders` - a second handler claimed the interaction
/// * `DispatchError::NoHandlerResponded` - no handler claimed the interaction
pub async fn run_sync(
    handlers: &[Arc<dyn Handler>],
    context: &ExecutionContext,
    event: &Event,
) -> Result<DispatchOutcome, DispatchError> {
    if context.is_halted() {
        info!(
            reason = context.halt_reason().unwrap_or_default(),
            "Dispatch halted by middleware, skipping handlers"
        );
        return Ok(DispatchOutcome::Acknowledged);
    }

    debug!(stage = %Stage::HandlerRunning, handlers = handlers.len(), "Stage transition");
    let mut response: Option<(String, DispatchOutcome)> = None;

    for handler in handlers {
        let name = handler.name();
        let result = AssertUnwindSafe(handler.handle_sync(event, context))
            .catch_unwind()
            .await;

        let reply = match result {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                warn!(handler = %name, error = %e, "Sync handler failed, trying next handler");
                continue;
            }
            Err(payload) => {
                error!(
                    handler = %name,
                    panic = %describe_panic(payload.as_ref()),
                    "Sync handler panicked, trying next handler"
                );
                continue;
            }
        };

        let outcome = match reply {
            SyncReply::NotImplemented => {
                debug!(handler = %name, "Handler has no sync capability");
                continue;
            }
            SyncReply::Ignore | SyncReply::Ok => continue,
            SyncReply::Respond(Value::Null) => DispatchOutcome::Acknowledged,
            SyncReply::Respond(payload) => DispatchOutcome::Respond(payload),
            SyncReply::Fail(reason) => DispatchOutcome::Failed { reason },
        };

        if let Some((first, _)) = &response {
            error!(
                first = %first,
                second = %name,
                "Multiple handlers responded to one interaction"
            );
            return Err(DispatchError::MultipleResponders {
                first: first.clone(),
                second: name.to_string(),
            });
        }

        debug!(handler = %name, "Handler responded");
        response = Some((name.to_string(), outcome));
    }

    match response {
        Some((_, outcome)) => Ok(outcome),
        None => {
            error!(
                handlers = handlers.len(),
                kind = %event.kind(),
                "No handler responded to a synchronous interaction"
            );
            Err(DispatchError::NoHandlerResponded {
                handlers: handlers.len(),
            })
        }
    }
}

/// Run the async capability of every handler.
///
/// Failures are logged and never stop the remaining handlers.
pub async fn run_async(handlers: &[Arc<dyn Handler>], context: &ExecutionContext, event: &Event) {
    if context.is_halted() {
        info!(
            reason = context.halt_reason().unwrap_or_default(),
            "Dispatch halted by middleware, skipping handlers"
        );
        return;
    }

    debug!(stage = %Stage::HandlerRunning, handlers = handlers.len(), "Stage transition");
    for handler in handlers {
        let name = handler.name();
        let result = AssertUnwindSafe(handler.handle_async(event, context))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(AsyncReply::Done)) => debug!(handler = %name, "Async handler finished"),
            Ok(Ok(AsyncReply::NotImplemented)) => {
                debug!(handler = %name, "Handler has no async capability")
            }
            Ok(Err(e)) => warn!(handler = %name, error = %e, "Async handler failed"),
            Err(payload) => error!(
                handler = %name,
                panic = %describe_panic(payload.as_ref()),
                "Async handler panicked"
            ),
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
