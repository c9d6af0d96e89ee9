//! Handler and middleware registration.

use super::handler::Handler;
use crate::middleware::Middleware;
use std::{fmt, sync::Arc};

/// Source of the ordered middleware and handler lists.
///
/// Queried once per dispatch, so implementations may change their lists
/// between requests (for example when reloading configuration).
pub trait Registry: Send + Sync {
    fn middleware(&self) -> Vec<Arc<dyn Middleware>>;

    fn handlers(&self) -> Vec<Arc<dyn Handler>>;
}

/// Registry with lists fixed at construction.
///
/// # Examples
///
/// ```rust
/// use courier_core::dispatch::{Handler, StaticRegistry};
/// use courier_core::middleware::{from_fn, MiddlewareOutcome};
///
/// struct Noop;
/// impl Handler for Noop {}
///
/// let registry = StaticRegistry::new()
///     .with_middleware(from_fn("pass", |context, _| Ok(MiddlewareOutcome::Continue(context.clone()))))
///     .with_handler(Noop);
/// ```
#[derive(Clone, Default)]
pub struct StaticRegistry {
    middleware: Vec<Arc<dyn Middleware>>,
    handlers: Vec<Arc<dyn Handler>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware.
    pub fn with_middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Append a handler.
    pub fn with_handler(mut self, handler: impl Handler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Append an already shared handler.
    pub fn with_shared_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push(handler);
        self
    }
}

impl Registry for StaticRegistry {
    fn middleware(&self) -> Vec<Arc<dyn Middleware>> {
        self.middleware.clone()
    }

    fn handlers(&self) -> Vec<Arc<dyn Handler>> {
        self.handlers.clone()
    }
}

impl fmt::Debug for StaticRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticRegistry")
            .field(
                "middleware",
                &self.middleware.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .field(
                "handlers",
                &self.handlers.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
