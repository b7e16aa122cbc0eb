//! [`HostRouter`] implementation over axum.
//!
//! axum applies `Router::layer` only to routes that already exist, whereas a
//! dispatch stack applies middleware to whatever is registered *after* it.
//! `AxumRouter` records the stack and folds it into an `axum::Router` back to
//! front in [`AxumRouter::into_router`], so every middleware wraps exactly the
//! entries registered after it plus the fallback. Middleware registered after
//! all routes therefore only sees requests none of those routes matched.
//!
//! Mounted routers are not nested with `Router::nest`. Their stacks are
//! spliced into the parent's at the mount point with every path made
//! absolute, and their middleware is scoped to the mount prefix. Several
//! routers can then share one prefix, a request falls through from one to
//! the next, and a router mounted at `/` keeps all of its middleware.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::extract::Request;
use axum::handler::Handler;
use axum::middleware::{from_fn, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{on, MethodFilter};
use axum::Router;
use futures::future::BoxFuture;
use http::{Method, StatusCode};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::host::HostRouter;
use crate::ids::{Endpoint, HandlerId};

type BoxedHandler = dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync;
type BoxedMiddleware = dyn Fn(Request, Next) -> BoxFuture<'static, Response> + Send + Sync;

/// Construction options for an [`AxumRouter`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AxumRouterOptions {
    /// When `false`, every route also answers its trailing-slash variant,
    /// unless that variant is registered explicitly. The root route of a
    /// mounted router answers both `/prefix` and `/prefix/`.
    pub strict: bool,
}

/// Type-erased axum handler.
#[derive(Clone)]
pub struct AxumHandler(Arc<BoxedHandler>);

impl AxumHandler {
    fn call(&self, req: Request) -> BoxFuture<'static, Response> {
        (self.0)(req)
    }
}

/// Type-erased `(Request, Next) -> Response` middleware.
#[derive(Clone)]
pub struct AxumMiddleware(Arc<BoxedMiddleware>);

impl AxumMiddleware {
    fn call(&self, req: Request, next: Next) -> BoxFuture<'static, Response> {
        (self.0)(req, next)
    }
}

/// Wrap any axum handler (extractors included) into a registrable endpoint.
///
/// The handler identity is the type of `handler`: the same `fn` item always
/// maps to the same identity, so route middleware registered for it applies
/// to every route it serves.
pub fn endpoint<H, T>(handler: H) -> Endpoint<AxumHandler>
where
    H: Handler<T, ()> + Send + Sync,
    T: 'static,
{
    let id = HandlerId::of::<H>();
    let boxed: Arc<BoxedHandler> =
        Arc::new(move |req: Request| -> BoxFuture<'static, Response> {
            Box::pin(handler.clone().call(req, ()))
        });
    Endpoint::new(id, AxumHandler(boxed))
}

/// Wrap an async `(Request, Next)` function into middleware.
pub fn middleware<F, Fut, Out>(f: F) -> AxumMiddleware
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Out> + Send + 'static,
    Out: IntoResponse + 'static,
{
    AxumMiddleware(Arc::new(
        move |req: Request, next: Next| -> BoxFuture<'static, Response> {
            let fut = f(req, next);
            Box::pin(async move { fut.await.into_response() })
        },
    ))
}

#[derive(Clone)]
enum StackEntry {
    Route {
        method: Method,
        path: String,
        handler: AxumHandler,
    },
    Mount {
        path: String,
        child: AxumRouter,
    },
    Use {
        scope: Option<Arc<str>>,
        middleware: AxumMiddleware,
    },
}

/// A stack entry with all mount prefixes resolved into absolute paths.
enum FlatEntry {
    Route {
        method: Method,
        filter: MethodFilter,
        path: Option<String>,
        twin: Option<String>,
        handler: AxumHandler,
    },
    Use {
        scope: Option<String>,
        middleware: AxumMiddleware,
    },
}

struct RouterState {
    options: AxumRouterOptions,
    stack: Vec<StackEntry>,
}

/// Shared handle to a router under construction.
#[derive(Clone)]
pub struct AxumRouter {
    state: Arc<Mutex<RouterState>>,
}

impl Default for AxumRouter {
    fn default() -> Self {
        Self::create(None)
    }
}

impl fmt::Debug for AxumRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("AxumRouter")
            .field("options", &state.options)
            .field("entries", &state.stack.len())
            .finish()
    }
}

impl AxumRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Materialize the recorded dispatch stack, mounted routers included.
    pub fn into_router(&self) -> Router {
        let mut entries = Vec::new();
        self.flatten("", &mut entries, &mut Vec::new());
        claim_paths(&mut entries);

        let mut router = Router::new().fallback(not_found);
        for entry in entries.into_iter().rev() {
            router = match entry {
                FlatEntry::Route {
                    method,
                    filter,
                    path,
                    twin,
                    handler,
                } => {
                    if path.is_none() && twin.is_none() {
                        tracing::debug!(%method, "Route shadowed by an earlier registration");
                    }
                    for path in path.iter().chain(twin.iter()) {
                        let handler = handler.clone();
                        router =
                            router.route(path, on(filter, move |req: Request| handler.call(req)));
                    }
                    router
                }
                FlatEntry::Use { scope, middleware } => router.layer(from_fn(
                    move |req: Request, next: Next| -> BoxFuture<'static, Response> {
                        match &scope {
                            Some(pattern) if !path_matches(pattern, req.uri().path()) => {
                                Box::pin(next.run(req))
                            }
                            _ => middleware.call(req, next),
                        }
                    },
                )),
            };
        }
        router
    }

    /// Append this router's stack to `out`, resolved against `prefix`.
    fn flatten(&self, prefix: &str, out: &mut Vec<FlatEntry>, ancestors: &mut Vec<AxumRouter>) {
        if ancestors.iter().any(|a| Arc::ptr_eq(&a.state, &self.state)) {
            tracing::warn!(prefix, "Router is mounted inside itself; mount ignored");
            return;
        }
        // Copy out so mounted children are flattened without holding our lock.
        let (strict, stack) = {
            let state = self.state.lock();
            (state.options.strict, state.stack.clone())
        };
        let own_scope = match prefix.trim_end_matches('/') {
            "" => None,
            scope => Some(scope.to_owned()),
        };

        ancestors.push(self.clone());
        for entry in stack {
            match entry {
                StackEntry::Route {
                    method,
                    path,
                    handler,
                } => {
                    let Ok(filter) = MethodFilter::try_from(method.clone()) else {
                        tracing::warn!(
                            %method,
                            path = %path,
                            "HTTP method not supported by axum; route ignored"
                        );
                        continue;
                    };
                    let path = join_path(prefix, &path);
                    let twin = if strict { None } else { trailing_slash_twin(&path) };
                    out.push(FlatEntry::Route {
                        method,
                        filter,
                        path: Some(path),
                        twin,
                        handler,
                    });
                }
                StackEntry::Mount { path, child } => {
                    child.flatten(&join_path(prefix, &path), out, ancestors);
                }
                StackEntry::Use { scope, middleware } => out.push(FlatEntry::Use {
                    scope: match scope {
                        Some(pattern) => Some(join_path(prefix, &pattern)),
                        None => own_scope.clone(),
                    },
                    middleware,
                }),
            }
        }
        ancestors.pop();
    }

    fn push(&self, entries: impl IntoIterator<Item = StackEntry>) {
        self.state.lock().stack.extend(entries);
    }
}

impl HostRouter for AxumRouter {
    type Options = AxumRouterOptions;
    type Handler = AxumHandler;
    type Middleware = AxumMiddleware;

    fn create(options: Option<&AxumRouterOptions>) -> Self {
        Self {
            state: Arc::new(Mutex::new(RouterState {
                options: options.cloned().unwrap_or_default(),
                stack: Vec::new(),
            })),
        }
    }

    fn use_global(&self, middleware: &[AxumMiddleware]) {
        self.push(middleware.iter().cloned().map(|middleware| StackEntry::Use {
            scope: None,
            middleware,
        }));
    }

    fn use_path(&self, path: &str, middleware: &[AxumMiddleware]) {
        let scope: Arc<str> = Arc::from(path);
        self.push(middleware.iter().cloned().map(|middleware| StackEntry::Use {
            scope: Some(scope.clone()),
            middleware,
        }));
    }

    fn route(&self, method: &Method, path: &str, handler: &AxumHandler) {
        self.push([StackEntry::Route {
            method: method.clone(),
            path: path.to_owned(),
            handler: handler.clone(),
        }]);
    }

    fn mount(&self, path: &str, child: &AxumRouter) {
        self.push([StackEntry::Mount {
            path: path.to_owned(),
            child: child.clone(),
        }]);
    }
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Give every method+path to the first route registering it. Trailing-slash
/// twins yield to explicit registrations anywhere in the stack.
fn claim_paths(entries: &mut [FlatEntry]) {
    let explicit: HashSet<(Method, String)> = entries
        .iter()
        .filter_map(|entry| match entry {
            FlatEntry::Route {
                method,
                path: Some(path),
                ..
            } => Some((method.clone(), path.clone())),
            _ => None,
        })
        .collect();

    let mut claimed = HashSet::new();
    for entry in entries {
        let FlatEntry::Route {
            method, path, twin, ..
        } = entry
        else {
            continue;
        };
        *path = path
            .take()
            .filter(|p| claimed.insert((method.clone(), p.clone())));
        *twin = twin.take().filter(|t| {
            let key = (method.clone(), t.clone());
            !explicit.contains(&key) && claimed.insert(key)
        });
    }
}

/// Join a mount prefix and a relative path into an absolute path.
fn join_path(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    match path.trim_start_matches('/') {
        "" if prefix.is_empty() => "/".to_owned(),
        "" => prefix.to_owned(),
        rest => format!("{prefix}/{rest}"),
    }
}

/// The other trailing-slash form of `path`, if it has one.
fn trailing_slash_twin(path: &str) -> Option<String> {
    if path.len() <= 1 || path.contains("{*") {
        return None;
    }
    match path.strip_suffix('/') {
        Some(trimmed) => Some(trimmed.to_owned()),
        None => Some(format!("{path}/")),
    }
}

/// Prefix match of a request path against a route pattern, segment by
/// segment. `{name}` matches any single segment, `{*name}` the remainder.
fn path_matches(pattern: &str, path: &str) -> bool {
    let mut expected = pattern.split('/').filter(|s| !s.is_empty());
    let mut actual = path.split('/').filter(|s| !s.is_empty());
    loop {
        match (expected.next(), actual.next()) {
            (None, _) => return true,
            (Some(want), _) if want.starts_with("{*") => return true,
            (Some(_), None) => return false,
            (Some(want), Some(have)) => {
                let is_param = want.starts_with('{') && want.ends_with('}');
                if !is_param && want != have {
                    return false;
                }
            }
        }
    }
}
