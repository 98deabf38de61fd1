mod common;

use common::{Calls, app, as_admin, get, parts};
use serde_json::json;
use switchyard::{Config, Dispatcher, ErrorKind, Method, ProxyEvent, Request, Router};

#[tokio::test]
async fn exact_route_binds_path_params() {
    let d = Dispatcher::new(app(&Calls::default()));
    let (status, body) = parts(&d.dispatch(get("/test/1")).await);
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "message": "Hello world 1" }));
}

#[tokio::test]
async fn deeper_patterns_need_every_segment() {
    let d = Dispatcher::new(app(&Calls::default()));
    let (_, body) = parts(&d.dispatch(get("/test/validation/abc")).await);
    assert_eq!(body, json!({ "literal": true }));
    assert_eq!(d.dispatch(get("/test/validation/")).await.status_code(), 200);
    assert_eq!(d.dispatch(get("/test/validation//")).await.status_code(), 500);
}

#[tokio::test]
async fn unmatched_path_is_500_with_the_path() {
    let d = Dispatcher::new(app(&Calls::default()));
    let (status, body) = parts(&d.dispatch(get("/unmatched/path")).await);
    assert_eq!(status, 500);
    assert_eq!(body, json!({ "errorMessage": "Route /unmatched/path not found" }));
}

#[tokio::test]
async fn unmatched_status_follows_config() {
    let d = Dispatcher::builder()
        .config(Config::default().with_route_not_found_status(404))
        .build(app(&Calls::default()));
    assert_eq!(d.dispatch(get("/nowhere")).await.status_code(), 404);
}

#[tokio::test]
async fn unknown_method_is_route_not_found() {
    let d = Dispatcher::new(app(&Calls::default()));
    let (status, body) = parts(&d.dispatch(ProxyEvent::new("BREW", "/test/1")).await);
    assert_eq!(status, 500);
    assert_eq!(body, json!({ "errorMessage": "Route /test/1 not found" }));
}

#[tokio::test]
async fn role_guard_runs_before_any_application_code() {
    let calls = Calls::default();
    let d = Dispatcher::new(app(&calls));

    let res = d.dispatch(get("/test").query("tag", "x")).await;
    let (status, body) = parts(&res);
    assert_eq!(status, 403);
    assert_eq!(body, json!({ "errorMessage": "User is not authorized to access GET /test" }));
    assert_eq!(calls.count(), 0);

    let res = d.dispatch(as_admin(get("/test").query("tag", "x"))).await;
    assert_eq!(parts(&res), (200, json!({ "message": "Hello worldss" })));
    // transform + handler
    assert_eq!(calls.count(), 2);
}

#[tokio::test]
async fn body_transform_rejects_before_the_handler() {
    let calls = Calls::default();
    let d = Dispatcher::new(app(&calls));

    let bad = ProxyEvent::new("POST", "/test-body").body(r#"{"name":"Mario","age":"twenty-five"}"#);
    let (status, body) = parts(&d.dispatch(bad).await);
    assert_eq!(status, 400);
    assert_eq!(body, json!({ "errorMessage": "Age is required and must be a number" }));
    assert_eq!(calls.count(), 0);

    let good = ProxyEvent::new("POST", "/test-body").body(r#"{"name":"Mario","age":25}"#);
    let (status, body) = parts(&d.dispatch(good).await);
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "user": { "name": "Mario", "age": 25 } }));
    assert_eq!(calls.count(), 1);
}

#[tokio::test]
async fn missing_and_malformed_bodies_are_400() {
    let d = Dispatcher::new(app(&Calls::default()));

    let (status, body) = parts(&d.dispatch(ProxyEvent::new("POST", "/test-body")).await);
    assert_eq!((status, body), (400, json!({ "errorMessage": "Request body is required" })));

    let res = d.dispatch(ProxyEvent::new("POST", "/test-body").body("{not json")).await;
    assert_eq!(res.status_code(), 400);
}

#[tokio::test]
async fn query_transforms_apply_per_argument() {
    let d = Dispatcher::new(app(&Calls::default()));

    let (_, body) = parts(&d.dispatch(get("/test-query").query("name", "Mario").query("age", "25")).await);
    assert_eq!(body, json!({ "name": "Mario", "age": 25 }));

    let (_, body) = parts(&d.dispatch(get("/test-all-query").query("limit", "10")).await);
    assert_eq!(body, json!({ "params": { "limit": "10" } }));

    let (_, body) = parts(&d.dispatch(get("/test-query")).await);
    assert_eq!(body, json!({ "name": null, "age": null }));
}

#[tokio::test]
async fn failed_query_transform_is_400() {
    let d = Dispatcher::new(app(&Calls::default()));
    let res = d.dispatch(get("/test-query").query("age", "old")).await;
    assert_eq!(res.status_code(), 400);
}

#[tokio::test]
async fn handler_errors_translate_by_kind() {
    let d = Dispatcher::new(app(&Calls::default()));
    assert_eq!(parts(&d.dispatch(get("/error")).await), (500, json!({ "errorMessage": "Oh no :(" })));

    let put = ProxyEvent::new("PUT", "/error");
    assert_eq!(parts(&d.dispatch(put).await), (403, json!({ "errorMessage": "You can't :(" })));
}

#[test]
fn duplicate_registration_is_rejected() {
    let mut router = Router::new().on(Method::Get, "/test/:id", |_req: Request| async {});
    let err = router
        .register(switchyard::Route::new(Method::Get, "/test/:name", |_req: Request| async {}))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Registration);

    // Same shape on another method is fine.
    router
        .register(switchyard::Route::new(Method::Delete, "/test/:id", |_req: Request| async {}))
        .unwrap();
    assert_eq!(router.len(), 2);
}

#[tokio::test]
async fn invoke_speaks_the_function_wire_format() {
    let d = Dispatcher::new(app(&Calls::default()));
    let out = d.invoke(json!({ "httpMethod": "GET", "path": "/test/7", "headers": {} })).await;
    assert_eq!(out["statusCode"], 200);
    assert_eq!(out["headers"]["content-type"], "application/json");
    assert_eq!(out["body"], r#"{"message":"Hello world 7"}"#);

    let out = d.invoke(json!({ "httpMethod": 42 })).await;
    assert!(out["errorMessage"].as_str().unwrap().starts_with("Malformed HTTP event"));
}

#[tokio::test]
async fn invoke_tolerates_nullish_gateway_fields() {
    let d = Dispatcher::new(app(&Calls::default()));
    let out = d.invoke(json!({
        "httpMethod": "GET",
        "path": "/test/9",
        "isBase64Encoded": null,
        "headers": null,
        "queryStringParameters": null,
    }))
    .await;
    assert_eq!(out["statusCode"], 200);
    assert_eq!(out["body"], r#"{"message":"Hello world 9"}"#);
}

#[tokio::test]
async fn invoke_reads_roles_from_authorizer_claims() {
    let calls = Calls::default();
    let d = Dispatcher::new(app(&calls));
    let event = |groups: serde_json::Value| json!({
        "httpMethod": "GET",
        "path": "/test",
        "requestContext": {
            "httpMethod": "GET",
            "authorizer": { "claims": { "cognito:groups": groups } },
        },
    });

    assert_eq!(d.invoke(event(json!("USER"))).await["statusCode"], 403);
    assert_eq!(calls.count(), 0);
    assert_eq!(d.invoke(event(json!("[ADMIN USER]"))).await["statusCode"], 200);
}
