//! Sample controllers, registered through `inventory` the way application
//! crates declare theirs.

use axum::extract::{Path, Request};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use http::Method;
use serde::Deserialize;
use serde_json::{json, Value};

use routekit::host::{endpoint, middleware, AxumRouter};
use routekit::{ControllerId, HandlerId, Registrator, RouteRegistry};

pub struct ApiController;
pub struct UsersController;
pub struct HealthController;

#[derive(Debug, Deserialize)]
struct NewUser {
    name: String,
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn version() -> Json<Value> {
    Json(json!({ "version": env!("CARGO_PKG_VERSION") }))
}

async fn list_users() -> Json<Value> {
    Json(json!([{ "id": 1, "name": "ada" }, { "id": 2, "name": "grace" }]))
}

async fn show_user(Path(id): Path<u64>) -> Result<Json<Value>, StatusCode> {
    match id {
        1 => Ok(Json(json!({ "id": 1, "name": "ada" }))),
        2 => Ok(Json(json!({ "id": 2, "name": "grace" }))),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

async fn create_user(Json(user): Json<NewUser>) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, Json(json!({ "id": 3, "name": user.name })))
}

async fn access_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let resp = next.run(req).await;
    tracing::info!(%method, path = %path, status = resp.status().as_u16(), "request served");
    resp
}

async fn audit(req: Request, next: Next) -> Response {
    tracing::info!(path = req.uri().path(), "user creation requested");
    next.run(req).await
}

fn register_health(reg: &mut RouteRegistry<AxumRouter>) {
    let id = ControllerId::of::<HealthController>();
    reg.register_controller(id, "/healthz", None);
    reg.register_route(id, Method::GET, "/", endpoint(health));
}

fn register_api(reg: &mut RouteRegistry<AxumRouter>) {
    let id = ControllerId::of::<ApiController>();
    reg.register_controller(id, "/api", None);
    reg.register_controller_middleware(id, vec![middleware(access_log)]);
    reg.register_route(id, Method::GET, "/version", endpoint(version));
}

fn register_users(reg: &mut RouteRegistry<AxumRouter>) {
    let id = ControllerId::of::<UsersController>();
    reg.register_controller(id, "/users", None);
    reg.register_parent(id, ControllerId::of::<ApiController>());
    reg.register_route(id, Method::GET, "/", endpoint(list_users));
    reg.register_route(id, Method::GET, "/{id}", endpoint(show_user));
    reg.register_route(id, Method::POST, "/", endpoint(create_user));
    reg.register_route_middleware(HandlerId::of_val(&create_user), vec![middleware(audit)]);
}

routekit::inventory::submit! { Registrator(register_health) }
routekit::inventory::submit! { Registrator(register_api) }
routekit::inventory::submit! { Registrator(register_users) }
