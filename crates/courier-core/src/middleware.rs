//! Middleware pipeline.
//!
//! Middleware are ordered context transformers that run before any handler.
//! Each one sees the current [`ExecutionContext`] and the [`Event`] and either
//! continues with a (possibly updated) copy of the context or halts the
//! dispatch. Once halted, no further middleware runs and no handler observes a
//! non-halted context.
//!
//! A middleware that returns an error, panics, or continues with a context
//! belonging to a different tenant has broken its contract. The violation is
//! logged and traversal carries on with the context as it was before that
//! middleware ran.
//!
//! # Examples
//!
//! ```rust
//! use courier_core::middleware::{from_fn, MiddlewareOutcome};
//!
//! let tag_admins = from_fn("tag_admins", |context, _event| {
//!     let is_admin = context.user_id() == Some("U_ADMIN");
//!     Ok(MiddlewareOutcome::Continue(context.with_assign("is_admin", is_admin)))
//! });
//! # let _ = tag_admins;
//! ```

use crate::{
    context::ExecutionContext,
    error::{describe_panic, MiddlewareError},
    events::Event,
};
use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};
use tracing::{debug, error, info, warn};

/// Result of a middleware invocation.
#[derive(Debug, Clone)]
pub enum MiddlewareOutcome {
    /// Replace the context and continue with the next middleware.
    Continue(ExecutionContext),
    /// Stop the pipeline; handlers will see a halted context.
    Halt { reason: String },
}

/// A context transformer run before handlers.
pub trait Middleware: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Inspect the context and event and decide how the dispatch proceeds.
    fn call(
        &self,
        context: &ExecutionContext,
        event: &Event,
    ) -> Result<MiddlewareOutcome, MiddlewareError>;
}

/// Middleware built from a closure. See [`from_fn`].
pub struct FnMiddleware<F> {
    name: String,
    f: F,
}

/// Create a middleware from a closure.
pub fn from_fn<F>(name: impl Into<String>, f: F) -> FnMiddleware<F>
where
    F: Fn(&ExecutionContext, &Event) -> Result<MiddlewareOutcome, MiddlewareError>
        + Send
        + Sync,
{
    FnMiddleware {
        name: name.into(),
        f,
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&ExecutionContext, &Event) -> Result<MiddlewareOutcome, MiddlewareError>
        + Send
        + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call(
        &self,
        context: &ExecutionContext,
        event: &Event,
    ) -> Result<MiddlewareOutcome, MiddlewareError> {
        (self.f)(context, event)
    }
}

impl<F> fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMiddleware").field("name", &self.name).finish()
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Ordered, short-circuiting chain of middleware.
#[derive(Clone, Default)]
pub struct MiddlewarePipeline {
    middleware: Vec<Arc<dyn Middleware>>,
}

impl MiddlewarePipeline {
    pub fn new(middleware: Vec<Arc<dyn Middleware>>) -> Self {
        Self { middleware }
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Run every middleware in registration order.
    ///
    /// Stops as soon as the context is halted, including when it is already
    /// halted on entry.
    pub fn run(&self, context: ExecutionContext, event: &Event) -> ExecutionContext {
        let mut context = context;

        for middleware in &self.middleware {
            if context.is_halted() {
                break;
            }

            let name = middleware.name();
            let result = panic::catch_unwind(AssertUnwindSafe(|| middleware.call(&context, event)));

            match result {
                Ok(Ok(MiddlewareOutcome::Continue(next))) => {
                    if next.tenant_id() != context.tenant_id() {
                        warn!(
                            middleware = %name,
                            tenant_id = %context.tenant_id(),
                            attempted_tenant_id = %next.tenant_id(),
                            "Middleware contract violation: context moved to another tenant, ignoring its result"
                        );
                        continue;
                    }

                    if next.is_halted() {
                        info!(
                            middleware = %name,
                            reason = next.halt_reason().unwrap_or_default(),
                            "Middleware halted dispatch"
                        );
                    } else {
                        debug!(middleware = %name, "Middleware continued");
                    }
                    context = next;
                }
                Ok(Ok(MiddlewareOutcome::Halt { reason })) => {
                    info!(middleware = %name, reason = %reason, "Middleware halted dispatch");
                    context = context.halted_with(reason);
                }
                Ok(Err(e)) => {
                    warn!(
                        middleware = %name,
                        error = %e,
                        "Middleware contract violation: returned an error, continuing with prior context"
                    );
                }
                Err(payload) => {
                    error!(
                        middleware = %name,
                        panic = %describe_panic(payload.as_ref()),
                        "Middleware panicked, continuing with prior context"
                    );
                }
            }
        }

        context
    }
}

impl fmt::Debug for MiddlewarePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.middleware.iter().map(|m| m.name()))
            .finish()
    }
}

#[cfg(test)]
#[path = "middleware_tests.rs"]
mod tests;
