//! Two-pass assembly of registered controllers into a router mount tree.
//!
//! Pass 1 builds one router per controller that has routes, registers its
//! middleware and routes, and mounts ownerless routers on the application
//! router. Pass 2 walks the parent relations in registration order and mounts
//! each child router under its parent's router.

use std::collections::HashSet;

use indexmap::IndexMap;
use thiserror::Error;

use crate::host::HostRouter;
use crate::ids::ControllerId;
use crate::registry::RouteRegistry;

/// Where a controller ended up after a successful assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No routes: no router was created and nothing was mounted.
    Skipped,
    /// Mounted directly on the application router.
    Root,
    /// Mounted under the router of `parent`.
    Child { parent: ControllerId },
}

/// Structured errors for tree assembly. Both are startup configuration
/// defects and abort the whole assembly.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("controller '{child}' declares parent '{parent}', which has no assembled router")]
    ParentNotResolved {
        child: ControllerId,
        parent: ControllerId,
    },
    #[error("controller '{child}' is declared as a child but has no assembled router")]
    UnregisteredController { child: ControllerId },
}

/// Outcome of [`TreeAssembler::apply_routes`].
#[derive(Debug)]
pub struct AssembledTree<H> {
    routers: IndexMap<ControllerId, H>,
    states: IndexMap<ControllerId, ControllerState>,
}

impl<H> AssembledTree<H> {
    pub fn router(&self, controller: ControllerId) -> Option<&H> {
        self.routers.get(&controller)
    }

    pub fn state(&self, controller: ControllerId) -> Option<ControllerState> {
        self.states.get(&controller).copied()
    }

    /// Every declared controller, in the order its placement was decided.
    pub fn states(&self) -> impl Iterator<Item = (ControllerId, ControllerState)> + '_ {
        self.states.iter().map(|(id, state)| (*id, *state))
    }

    /// Assembled controllers whose parent chain never reaches the application
    /// router (parent cycles).
    pub fn unreachable(&self) -> Vec<ControllerId> {
        self.routers
            .keys()
            .copied()
            .filter(|id| !self.reaches_root(*id))
            .collect()
    }

    fn reaches_root(&self, start: ControllerId) -> bool {
        let mut seen = HashSet::new();
        let mut current = start;
        loop {
            match self.states.get(&current) {
                Some(ControllerState::Root) => return true,
                Some(ControllerState::Child { parent }) => {
                    if !seen.insert(current) {
                        return false;
                    }
                    current = *parent;
                }
                Some(ControllerState::Skipped) | None => return false,
            }
        }
    }
}

/// Turns a populated [`RouteRegistry`] into a mounted router tree.
///
/// Every registration must have happened before [`apply_routes`] is called;
/// the assembler only ever reads the registry.
///
/// [`apply_routes`]: TreeAssembler::apply_routes
pub struct TreeAssembler<H: HostRouter> {
    registry: RouteRegistry<H>,
    default_options: Option<H::Options>,
}

impl<H: HostRouter> TreeAssembler<H> {
    pub fn new(registry: RouteRegistry<H>) -> Self {
        Self {
            registry,
            default_options: None,
        }
    }

    /// Options for controllers that declared none.
    pub fn with_default_options(mut self, options: Option<H::Options>) -> Self {
        self.default_options = options;
        self
    }

    pub fn registry(&self) -> &RouteRegistry<H> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut RouteRegistry<H> {
        &mut self.registry
    }

    /// Build every controller router and mount the tree onto `app`.
    pub fn apply_routes(&self, app: &H) -> Result<AssembledTree<H>, AssemblyError> {
        let reg = &self.registry;
        // Each router travels with the root it is mounted at.
        let mut routers: IndexMap<ControllerId, (H, &str)> = IndexMap::new();
        let mut states: IndexMap<ControllerId, ControllerState> = IndexMap::new();

        // Pass 1: per-controller routers, root mounts.
        for (id, spec) in reg.controllers() {
            let Some(table) = reg.routes(id).filter(|t| t.values().any(|p| !p.is_empty())) else {
                tracing::debug!(controller = %id, "Controller has no routes; skipped");
                states.insert(id, ControllerState::Skipped);
                continue;
            };

            let options = spec.options.as_ref().or(self.default_options.as_ref());
            let router = H::create(options);

            if let Some(mw) = reg.controller_middleware(id).filter(|m| !m.is_empty()) {
                router.use_global(mw);
            }

            for (method, paths) in table {
                for (path, endpoint) in paths {
                    if let Some(mw) = reg.route_middleware(endpoint.id()).filter(|m| !m.is_empty())
                    {
                        router.use_path(path, mw);
                    }
                    router.route(method, path, endpoint.handler());
                    tracing::debug!(
                        controller = %id,
                        %method,
                        path = %path,
                        handler = %endpoint.id(),
                        "Route registered"
                    );
                }
            }

            if reg.parent_of(id).is_none() {
                app.mount(&spec.root, &router);
                states.insert(id, ControllerState::Root);
                tracing::debug!(controller = %id, root = %spec.root, "Mounted on application router");
            }
            routers.insert(id, (router, spec.root.as_str()));
        }

        // Pass 2: parent wiring.
        for (child, parent) in reg.parents() {
            let (parent_router, _) = routers
                .get(&parent)
                .ok_or(AssemblyError::ParentNotResolved { child, parent })?;
            let (child_router, root) = routers
                .get(&child)
                .ok_or(AssemblyError::UnregisteredController { child })?;

            // Appended after the child's own routes: only runs for requests
            // none of them matched.
            if let Some(mw) = reg.controller_middleware(parent).filter(|m| !m.is_empty()) {
                child_router.use_global(mw);
            }
            parent_router.mount(root, child_router);
            states.insert(child, ControllerState::Child { parent });
            tracing::debug!(%child, %parent, root, "Mounted under parent router");
        }

        let routers = routers
            .into_iter()
            .map(|(id, (router, _))| (id, router))
            .collect();
        let tree = AssembledTree { routers, states };
        let unreachable = tree.unreachable();
        if !unreachable.is_empty() {
            tracing::warn!(
                controllers = ?unreachable.iter().map(|c| c.name()).collect::<Vec<_>>(),
                "Controllers are assembled but not reachable from the application router"
            );
        }
        tracing::info!(
            roots = tree.states().filter(|(_, s)| *s == ControllerState::Root).count(),
            children = tree
                .states()
                .filter(|(_, s)| matches!(s, ControllerState::Child { .. }))
                .count(),
            skipped = tree.states().filter(|(_, s)| *s == ControllerState::Skipped).count(),
            "Route tree assembled"
        );
        Ok(tree)
    }

    /// Clear the registry for a new registration/assembly cycle.
    pub fn reset(&mut self) {
        self.registry.reset();
    }
}
