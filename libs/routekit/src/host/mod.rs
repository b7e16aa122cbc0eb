//! Boundary with the HTTP routing framework that hosts the assembled tree.

use std::fmt;

use http::Method;

mod axum_router;

pub use axum_router::{
    endpoint, middleware, AxumHandler, AxumMiddleware, AxumRouter, AxumRouterOptions,
};

/// A router of the host framework.
///
/// Implementations have handle semantics: clones refer to the same underlying
/// router, so a router mounted somewhere can still receive registrations
/// afterwards. Registrations are applied in call order, which is also the
/// order a request observes them in.
pub trait HostRouter: Clone {
    /// Router construction options stored with a controller.
    type Options: Clone + fmt::Debug;
    /// Request handler registered for a method and path.
    type Handler: Clone;
    /// Request-processing function placed in front of handlers.
    type Middleware: Clone;

    /// Construct a new, empty router.
    fn create(options: Option<&Self::Options>) -> Self;

    /// Register middleware that runs for every request reaching this router
    /// past this point of its dispatch stack.
    fn use_global(&self, middleware: &[Self::Middleware]);

    /// Register middleware that runs only for requests whose path matches
    /// `path`, regardless of method.
    fn use_path(&self, path: &str, middleware: &[Self::Middleware]);

    /// Register `handler` for `method` on `path`.
    fn route(&self, method: &Method, path: &str, handler: &Self::Handler);

    /// Delegate every request under `path` to `child`.
    fn mount(&self, path: &str, child: &Self);
}
