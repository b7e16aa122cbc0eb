//! Metadata registry: every controller, route, middleware and parent
//! registration, recorded independently of the order it happened in.

use std::fmt;

use http::Method;
use indexmap::IndexMap;

use crate::host::{AxumRouter, HostRouter};
use crate::ids::{ControllerId, Endpoint, HandlerId};

/// Routes of one controller: method -> path -> endpoint, in insertion order.
pub type RouteTable<T> = IndexMap<Method, IndexMap<String, Endpoint<T>>>;

/// Declared controller scope.
#[derive(Debug, Clone)]
pub struct ControllerSpec<O> {
    /// Path the controller's router is mounted at.
    pub root: String,
    pub options: Option<O>,
}

/// The function type submitted via `inventory::submit!`.
pub struct Registrator(pub fn(&mut RouteRegistry<AxumRouter>));

inventory::collect!(Registrator);

/// Registration tables for one assembly cycle.
///
/// Writes never validate references between tables; a parent that was never
/// declared is only detected when the tree is assembled.
pub struct RouteRegistry<H: HostRouter> {
    controllers: IndexMap<ControllerId, ControllerSpec<H::Options>>,
    routes: IndexMap<ControllerId, RouteTable<H::Handler>>,
    controller_middleware: IndexMap<ControllerId, Vec<H::Middleware>>,
    route_middleware: IndexMap<HandlerId, Vec<H::Middleware>>,
    parents: IndexMap<ControllerId, ControllerId>,
}

impl<H: HostRouter> Default for RouteRegistry<H> {
    fn default() -> Self {
        Self {
            controllers: IndexMap::new(),
            routes: IndexMap::new(),
            controller_middleware: IndexMap::new(),
            route_middleware: IndexMap::new(),
            parents: IndexMap::new(),
        }
    }
}

impl<H: HostRouter> fmt::Debug for RouteRegistry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let controllers: Vec<&'static str> = self.controllers.keys().map(|c| c.name()).collect();
        f.debug_struct("RouteRegistry")
            .field("controllers", &controllers)
            .field("routed_controllers", &self.routes.len())
            .field("controller_middleware", &self.controller_middleware.len())
            .field("route_middleware", &self.route_middleware.len())
            .field("parents", &self.parents.len())
            .finish()
    }
}

impl RouteRegistry<AxumRouter> {
    /// Run every registrator submitted via inventory against a fresh registry.
    pub fn discover() -> Self {
        let mut registry = Self::new();
        for r in ::inventory::iter::<Registrator> {
            r.0(&mut registry);
        }
        tracing::info!(
            controllers = ?registry.controllers.keys().map(|c| c.name()).collect::<Vec<_>>(),
            "Route registrations discovered"
        );
        registry
    }
}

impl<H: HostRouter> RouteRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `controller` with its root path. A repeated declaration
    /// replaces the earlier one.
    pub fn register_controller(
        &mut self,
        controller: ControllerId,
        root: impl Into<String>,
        options: Option<H::Options>,
    ) {
        let spec = ControllerSpec {
            root: root.into(),
            options,
        };
        if self.controllers.insert(controller, spec).is_some() {
            tracing::debug!(%controller, "Controller declaration replaced");
        }
    }

    pub fn register_controller_middleware(
        &mut self,
        controller: ControllerId,
        middleware: Vec<H::Middleware>,
    ) {
        self.controller_middleware.insert(controller, middleware);
    }

    /// Nest `child` under `parent`. A child has at most one parent; the last
    /// registration wins.
    pub fn register_parent(&mut self, child: ControllerId, parent: ControllerId) {
        if let Some(previous) = self.parents.insert(child, parent) {
            tracing::debug!(%child, %previous, %parent, "Parent relation replaced");
        }
    }

    /// Register a route. The same method and path registered twice on one
    /// controller keeps only the later endpoint.
    pub fn register_route(
        &mut self,
        controller: ControllerId,
        method: Method,
        path: impl Into<String>,
        endpoint: Endpoint<H::Handler>,
    ) {
        let path = path.into();
        let replaced = self
            .routes
            .entry(controller)
            .or_default()
            .entry(method.clone())
            .or_default()
            .insert(path.clone(), endpoint);
        if let Some(previous) = replaced {
            tracing::debug!(
                %controller,
                %method,
                path = %path,
                previous = %previous.id(),
                "Route handler replaced"
            );
        }
    }

    /// Middleware for every route served by `handler`.
    pub fn register_route_middleware(
        &mut self,
        handler: HandlerId,
        middleware: Vec<H::Middleware>,
    ) {
        self.route_middleware.insert(handler, middleware);
    }

    pub fn controller(&self, controller: ControllerId) -> Option<&ControllerSpec<H::Options>> {
        self.controllers.get(&controller)
    }

    /// Declared controllers in declaration order.
    pub fn controllers(
        &self,
    ) -> impl Iterator<Item = (ControllerId, &ControllerSpec<H::Options>)> + '_ {
        self.controllers.iter().map(|(id, spec)| (*id, spec))
    }

    pub fn routes(&self, controller: ControllerId) -> Option<&RouteTable<H::Handler>> {
        self.routes.get(&controller)
    }

    pub fn controller_middleware(&self, controller: ControllerId) -> Option<&[H::Middleware]> {
        self.controller_middleware
            .get(&controller)
            .map(Vec::as_slice)
    }

    pub fn route_middleware(&self, handler: HandlerId) -> Option<&[H::Middleware]> {
        self.route_middleware.get(&handler).map(Vec::as_slice)
    }

    pub fn parent_of(&self, child: ControllerId) -> Option<ControllerId> {
        self.parents.get(&child).copied()
    }

    /// (child, parent) pairs in registration order.
    pub fn parents(&self) -> impl Iterator<Item = (ControllerId, ControllerId)> + '_ {
        self.parents.iter().map(|(child, parent)| (*child, *parent))
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
            && self.routes.is_empty()
            && self.controller_middleware.is_empty()
            && self.route_middleware.is_empty()
            && self.parents.is_empty()
    }

    /// Drop every registration, leaving the registry ready for a new cycle.
    pub fn reset(&mut self) {
        self.controllers.clear();
        self.routes.clear();
        self.controller_middleware.clear();
        self.route_middleware.clear();
        self.parents.clear();
    }
}
