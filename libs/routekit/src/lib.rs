//! # RouteKit - Declarative Controller Routing
//!
//! Controllers, routes, middleware and parent/child scopes are registered
//! independently and in any order; [`TreeAssembler::apply_routes`] then turns
//! them into one correctly nested, correctly ordered router tree.
//!
//! ## Features
//!
//! - **Declarative**: register controllers through `inventory` registrators,
//!   discovered at startup with [`RouteRegistry::discover`]
//! - **Deterministic**: every table iterates in registration order
//! - **Host-agnostic core**: the assembler targets the [`HostRouter`] trait;
//!   [`AxumRouter`] hosts the tree on axum
//!
//! ## Example
//!
//! ```rust,ignore
//! use routekit::host::{endpoint, AxumRouter};
//! use routekit::{ControllerId, Registrator, RouteRegistry, TreeAssembler};
//! use http::Method;
//!
//! struct Users;
//!
//! async fn list_users() -> &'static str {
//!     "[]"
//! }
//!
//! fn register(reg: &mut RouteRegistry<AxumRouter>) {
//!     reg.register_controller(ControllerId::of::<Users>(), "/users", None);
//!     reg.register_route(ControllerId::of::<Users>(), Method::GET, "/", endpoint(list_users));
//! }
//!
//! routekit::inventory::submit! { Registrator(register) }
//!
//! let app = AxumRouter::new();
//! TreeAssembler::new(RouteRegistry::discover()).apply_routes(&app)?;
//! let router: axum::Router = app.into_router();
//! ```

// Re-export inventory for user convenience
pub use inventory;

pub mod assembler;
pub mod config;
pub mod host;
pub mod ids;
pub mod registry;

pub use assembler::{AssembledTree, AssemblyError, ControllerState, TreeAssembler};
pub use config::{ConfigError, RoutekitConfig};
pub use host::{AxumRouter, AxumRouterOptions, HostRouter};
pub use ids::{ControllerId, Endpoint, HandlerId};
pub use registry::{ControllerSpec, Registrator, RouteRegistry, RouteTable};
