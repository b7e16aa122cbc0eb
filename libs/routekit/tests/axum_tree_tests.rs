//! End-to-end assembly onto axum, exercised with real requests.

use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::Router;
use http::Method;
use tower::ServiceExt;

use routekit::host::{endpoint, middleware, AxumMiddleware, AxumRouter, AxumRouterOptions};
use routekit::{
    AssemblyError, ControllerId, ControllerState, HandlerId, Registrator, RouteRegistry,
    TreeAssembler,
};

// ---------- Controllers and handlers (module scope for `inventory`) ----------

struct A;
struct B;
struct C;
struct D;
struct Z;
struct P;
struct Q;
struct Users;
struct Home;
struct Catalog;

async fn h1() -> &'static str {
    "h1"
}

async fn h2() -> &'static str {
    "h2"
}

async fn first() -> &'static str {
    "first"
}

async fn second() -> &'static str {
    "second"
}

async fn echo_trace(headers: HeaderMap) -> String {
    headers
        .get("x-trace")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn list_items() -> &'static str {
    "items"
}

fn register_catalog(reg: &mut RouteRegistry<AxumRouter>) {
    let catalog = ControllerId::of::<Catalog>();
    reg.register_controller(catalog, "/catalog", None);
    reg.register_route(catalog, Method::GET, "/items", endpoint(list_items));
}

routekit::inventory::submit! { Registrator(register_catalog) }

/// Middleware appending `name` to the `x-trace` request header.
fn tag(name: &'static str) -> AxumMiddleware {
    middleware(move |mut req: Request, next: Next| async move {
        let trace = match req.headers().get("x-trace").and_then(|v| v.to_str().ok()) {
            Some(prev) if !prev.is_empty() => format!("{prev},{name}"),
            _ => name.to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&trace) {
            req.headers_mut().insert("x-trace", value);
        }
        next.run(req).await
    })
}

async fn call(router: Router, method: Method, uri: &str) -> (StatusCode, String) {
    let req = http::Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

fn assemble(reg: RouteRegistry<AxumRouter>) -> Router {
    let app = AxumRouter::new();
    TreeAssembler::new(reg).apply_routes(&app).unwrap();
    app.into_router()
}

fn registry_with_a() -> RouteRegistry<AxumRouter> {
    let mut reg = RouteRegistry::new();
    reg.register_controller(ControllerId::of::<A>(), "/a", None);
    reg.register_route(ControllerId::of::<A>(), Method::GET, "/x", endpoint(h1));
    reg
}

// ---------- Tests ----------

#[tokio::test]
async fn root_controller_answers_under_its_root() {
    let router = assemble(registry_with_a());

    assert_eq!(call(router.clone(), Method::GET, "/a/x").await, (StatusCode::OK, "h1".into()));
    assert_eq!(call(router, Method::GET, "/x").await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn child_controller_answers_under_parent_root() {
    let mut reg = registry_with_a();
    reg.register_controller(ControllerId::of::<B>(), "/b", None);
    reg.register_route(ControllerId::of::<B>(), Method::GET, "/y", endpoint(h2));
    reg.register_parent(ControllerId::of::<B>(), ControllerId::of::<A>());
    let router = assemble(reg);

    assert_eq!(call(router.clone(), Method::GET, "/a/b/y").await, (StatusCode::OK, "h2".into()));
    assert_eq!(call(router, Method::GET, "/b/y").await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn controller_route_and_handler_run_in_order() {
    let mut reg = RouteRegistry::new();
    let c = ControllerId::of::<C>();
    reg.register_controller(c, "/c", None);
    reg.register_controller_middleware(c, vec![tag("m")]);
    reg.register_route(c, Method::GET, "/trace", endpoint(echo_trace));
    reg.register_route_middleware(HandlerId::of_val(&echo_trace), vec![tag("n")]);
    let router = assemble(reg);

    assert_eq!(
        call(router, Method::GET, "/c/trace").await,
        (StatusCode::OK, "m,n".into())
    );
}

#[tokio::test]
async fn route_middleware_runs_for_any_method_on_its_path() {
    let mut reg = RouteRegistry::new();
    let c = ControllerId::of::<C>();
    reg.register_controller(c, "/c", None);
    reg.register_route(c, Method::GET, "/trace", endpoint(echo_trace));
    reg.register_route(c, Method::POST, "/plain", endpoint(h1));
    reg.register_route_middleware(HandlerId::of_val(&echo_trace), vec![tag("n")]);
    let router = assemble(reg);

    assert_eq!(
        call(router.clone(), Method::GET, "/c/trace").await,
        (StatusCode::OK, "n".into())
    );
    assert_eq!(call(router, Method::POST, "/c/plain").await, (StatusCode::OK, "h1".into()));
}

#[tokio::test]
async fn later_registration_of_same_route_wins() {
    let mut reg = RouteRegistry::new();
    let c = ControllerId::of::<C>();
    reg.register_controller(c, "/c", None);
    reg.register_route(c, Method::GET, "/dup", endpoint(first));
    reg.register_route(c, Method::GET, "/dup", endpoint(second));
    let router = assemble(reg);

    assert_eq!(call(router, Method::GET, "/c/dup").await, (StatusCode::OK, "second".into()));
}

#[tokio::test]
async fn root_controllers_can_share_a_root() {
    let mut reg = RouteRegistry::new();
    reg.register_controller(ControllerId::of::<P>(), "/api", None);
    reg.register_route(ControllerId::of::<P>(), Method::GET, "/x", endpoint(h1));
    reg.register_controller(ControllerId::of::<Q>(), "/api", None);
    reg.register_route(ControllerId::of::<Q>(), Method::GET, "/y", endpoint(h2));
    let router = assemble(reg);

    assert_eq!(call(router.clone(), Method::GET, "/api/x").await, (StatusCode::OK, "h1".into()));
    assert_eq!(call(router, Method::GET, "/api/y").await, (StatusCode::OK, "h2".into()));
}

#[tokio::test]
async fn children_can_share_a_root_under_one_parent() {
    let mut reg = registry_with_a();
    reg.register_controller(ControllerId::of::<P>(), "/shared", None);
    reg.register_route(ControllerId::of::<P>(), Method::GET, "/first", endpoint(first));
    reg.register_parent(ControllerId::of::<P>(), ControllerId::of::<A>());
    reg.register_controller(ControllerId::of::<Q>(), "/shared", None);
    reg.register_route(ControllerId::of::<Q>(), Method::GET, "/second", endpoint(second));
    reg.register_parent(ControllerId::of::<Q>(), ControllerId::of::<A>());
    let router = assemble(reg);

    assert_eq!(
        call(router.clone(), Method::GET, "/a/shared/first").await,
        (StatusCode::OK, "first".into())
    );
    assert_eq!(
        call(router, Method::GET, "/a/shared/second").await,
        (StatusCode::OK, "second".into())
    );
}

#[tokio::test]
async fn shared_root_middleware_sees_later_controllers() {
    let mut reg = RouteRegistry::new();
    reg.register_controller(ControllerId::of::<P>(), "/api", None);
    reg.register_controller_middleware(ControllerId::of::<P>(), vec![tag("p")]);
    reg.register_route(ControllerId::of::<P>(), Method::GET, "/x", endpoint(h1));
    reg.register_controller(ControllerId::of::<Q>(), "/api", None);
    reg.register_route(ControllerId::of::<Q>(), Method::GET, "/trace", endpoint(echo_trace));
    let router = assemble(reg);

    // Requests fall through P's router into Q's, as with any shared prefix.
    assert_eq!(
        call(router, Method::GET, "/api/trace").await,
        (StatusCode::OK, "p".into())
    );
}

#[tokio::test]
async fn lenient_routes_answer_trailing_slash() {
    let mut reg = registry_with_a();
    reg.register_controller(
        ControllerId::of::<B>(),
        "/b",
        Some(AxumRouterOptions { strict: true }),
    );
    reg.register_route(ControllerId::of::<B>(), Method::GET, "/y", endpoint(h2));
    let router = assemble(reg);

    assert_eq!(call(router.clone(), Method::GET, "/a/x/").await, (StatusCode::OK, "h1".into()));
    assert_eq!(call(router, Method::GET, "/b/y/").await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn explicit_trailing_slash_routes_coexist() {
    let mut reg = RouteRegistry::new();
    let c = ControllerId::of::<C>();
    reg.register_controller(c, "/c", None);
    reg.register_route(c, Method::GET, "/x", endpoint(first));
    reg.register_route(c, Method::GET, "/x/", endpoint(second));
    let router = assemble(reg);

    assert_eq!(call(router.clone(), Method::GET, "/c/x").await, (StatusCode::OK, "first".into()));
    assert_eq!(call(router, Method::GET, "/c/x/").await, (StatusCode::OK, "second".into()));
}

#[tokio::test]
async fn controller_root_route_answers_with_and_without_slash() {
    let mut reg = registry_with_a();
    let users = ControllerId::of::<Users>();
    reg.register_controller(users, "/users", None);
    reg.register_route(users, Method::GET, "/", endpoint(list_items));
    reg.register_parent(users, ControllerId::of::<A>());
    let router = assemble(reg);

    assert_eq!(
        call(router.clone(), Method::GET, "/a/users").await,
        (StatusCode::OK, "items".into())
    );
    assert_eq!(
        call(router, Method::GET, "/a/users/").await,
        (StatusCode::OK, "items".into())
    );
}

#[tokio::test]
async fn controller_mounted_at_slash_keeps_its_middleware() {
    let mut reg = registry_with_a();
    let home = ControllerId::of::<Home>();
    reg.register_controller(home, "/", None);
    reg.register_controller_middleware(home, vec![tag("home")]);
    reg.register_route(home, Method::GET, "/trace", endpoint(echo_trace));
    let router = assemble(reg);

    assert_eq!(
        call(router.clone(), Method::GET, "/trace").await,
        (StatusCode::OK, "home".into())
    );
    assert_eq!(call(router, Method::GET, "/a/x").await, (StatusCode::OK, "h1".into()));
}

#[tokio::test]
async fn parent_middleware_does_not_precede_child_routes() {
    let mut reg = registry_with_a();
    reg.register_controller_middleware(ControllerId::of::<A>(), vec![tag("parent")]);
    reg.register_controller(ControllerId::of::<B>(), "/b", None);
    reg.register_route(ControllerId::of::<B>(), Method::GET, "/trace", endpoint(echo_trace));
    reg.register_parent(ControllerId::of::<B>(), ControllerId::of::<A>());
    let router = assemble(reg);

    // A's own middleware sits in front of the mount of B on A's router, but
    // the copy appended to B's router comes after B's routes.
    assert_eq!(
        call(router, Method::GET, "/a/b/trace").await,
        (StatusCode::OK, "parent".into())
    );
}

#[tokio::test]
async fn routeless_controller_is_not_mounted() {
    let mut reg = registry_with_a();
    reg.register_controller(ControllerId::of::<D>(), "/d", None);
    reg.register_controller_middleware(ControllerId::of::<D>(), vec![tag("d")]);
    let app = AxumRouter::new();

    let tree = TreeAssembler::new(reg).apply_routes(&app).unwrap();

    assert_eq!(tree.state(ControllerId::of::<D>()), Some(ControllerState::Skipped));
    assert_eq!(call(app.into_router(), Method::GET, "/d").await.0, StatusCode::NOT_FOUND);
}

#[test]
fn undeclared_parent_aborts_assembly() {
    let mut reg = registry_with_a();
    reg.register_controller(ControllerId::of::<C>(), "/c", None);
    reg.register_route(ControllerId::of::<C>(), Method::GET, "/t", endpoint(h2));
    reg.register_parent(ControllerId::of::<C>(), ControllerId::of::<Z>());

    let err = TreeAssembler::new(reg)
        .apply_routes(&AxumRouter::new())
        .unwrap_err();
    assert_eq!(
        err,
        AssemblyError::ParentNotResolved {
            child: ControllerId::of::<C>(),
            parent: ControllerId::of::<Z>(),
        }
    );
}

#[test]
fn routeless_child_aborts_assembly() {
    let mut reg = registry_with_a();
    reg.register_controller(ControllerId::of::<D>(), "/d", None);
    reg.register_parent(ControllerId::of::<D>(), ControllerId::of::<A>());

    let err = TreeAssembler::new(reg)
        .apply_routes(&AxumRouter::new())
        .unwrap_err();
    assert_eq!(
        err,
        AssemblyError::UnregisteredController {
            child: ControllerId::of::<D>()
        }
    );
}

#[tokio::test]
async fn reset_allows_a_second_identical_cycle() {
    let mut assembler = TreeAssembler::new(registry_with_a());
    let first_app = AxumRouter::new();
    assembler.apply_routes(&first_app).unwrap();

    assembler.reset();
    assert!(assembler.registry().is_empty());
    let empty_app = AxumRouter::new();
    assembler.apply_routes(&empty_app).unwrap();
    assert_eq!(
        call(empty_app.into_router(), Method::GET, "/a/x").await.0,
        StatusCode::NOT_FOUND
    );

    *assembler.registry_mut() = registry_with_a();
    let second_app = AxumRouter::new();
    assembler.apply_routes(&second_app).unwrap();

    assert_eq!(
        call(first_app.into_router(), Method::GET, "/a/x").await,
        call(second_app.into_router(), Method::GET, "/a/x").await
    );
}

#[tokio::test]
async fn discovered_registrators_are_assembled() {
    let router = assemble(RouteRegistry::discover());

    assert_eq!(
        call(router, Method::GET, "/catalog/items").await,
        (StatusCode::OK, "items".into())
    );
}
