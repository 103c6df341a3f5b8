//! HTTP API tests driven through the router without a socket

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

use vpspanel_daemon::{server, PanelConfig, PanelState};

async fn app() -> Router {
    let mut config = PanelConfig::for_tests();
    config.lifecycle.deploy_delay_ms = 50;
    config.lifecycle.restart_delay_ms = 50;
    let state = PanelState::new(config).await.unwrap();
    server::router(state)
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn login(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"username": username, "password": password})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["data"]["token"].as_str().unwrap().to_string()
}

async fn signup_and_login(app: &Router, username: &str) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/auth/signup",
        None,
        Some(json!({"username": username, "password": "secret"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    login(app, username, "secret").await
}

async fn docker(app: &Router, token: &str, body: Value) -> (StatusCode, Value) {
    call(app, Method::POST, "/functions/v1/docker-manager", Some(token), Some(body)).await
}

async fn exec(app: &Router, token: &str, vps_id: &str, command: &str) -> (StatusCode, Value) {
    call(
        app,
        Method::POST,
        "/functions/v1/terminal-exec",
        Some(token),
        Some(json!({"vps_id": vps_id, "command": command})),
    )
    .await
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_health_is_public() {
    let app = app().await;
    let (status, body) = call(&app, Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_requires_bearer_token() {
    let app = app().await;

    let (status, body) = docker(&app, "bogus", json!({"action": "deploy"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "Unauthorized");

    let (status, _) = call(&app, Method::GET, "/api/vps", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_full_lifecycle_over_http() {
    let app = app().await;
    let token = signup_and_login(&app, "alice").await;

    let (status, body) = docker(&app, &token, json!({"action": "deploy", "config": {"name": "web"}})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "deploying");
    let vps_id = body["data"]["vps_id"].as_str().unwrap().to_string();
    assert!(body["data"]["container_id"].as_str().unwrap().starts_with("vps_"));

    // Second deploy is rejected
    let (status, body) = docker(&app, &token, json!({"action": "deploy"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "DuplicateVps");

    // Not running yet
    let (status, body) = exec(&app, &token, &vps_id, "ls").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "NotRunning");

    settle().await;

    let (status, body) = exec(&app, &token, &vps_id, "whoami").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["output"], "root");
    assert_eq!(body["data"]["exit_code"], 0);
    assert_eq!(body["data"]["working_directory"], "/root");

    let (status, body) = docker(&app, &token, json!({"action": "stop", "vps_id": vps_id})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "stopped");

    let (status, body) = docker(&app, &token, json!({"action": "stop", "vps_id": vps_id})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "InvalidTransition");

    let (status, body) = docker(&app, &token, json!({"action": "restart", "vps_id": vps_id})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "pending");
    settle().await;

    let (status, body) = docker(&app, &token, json!({"action": "status", "vps_id": vps_id})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "running");
    assert!(body["data"]["resource_usage"]["cpu"].is_u64());

    let (status, body) = docker(&app, &token, json!({"action": "destroy", "vps_id": vps_id})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["destroyed"], true);

    let (status, body) = docker(&app, &token, json!({"action": "status", "vps_id": vps_id})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "NotFound");

    // deploy, exec, stop, stop(error), restart, destroy; newest first
    let (status, body) = call(&app, Method::GET, &format!("/api/activity?vps_id={}", vps_id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, ["destroy", "restart", "stop", "stop", "exec", "deploy"]);
}

#[tokio::test]
async fn test_unknown_action_and_bad_body() {
    let app = app().await;
    let token = signup_and_login(&app, "alice").await;

    let (status, body) = docker(&app, &token, json!({"action": "reboot", "vps_id": "x"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "InvalidAction");

    let (status, body) = docker(&app, &token, json!({"vps_id": "x"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "ValidationError");

    let (status, body) = docker(&app, &token, json!({"action": "start"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "ValidationError");
}

#[tokio::test]
async fn test_cross_user_access_is_forbidden() {
    let app = app().await;
    let alice = signup_and_login(&app, "alice").await;
    let bob = signup_and_login(&app, "bob").await;

    let (_, body) = docker(&app, &alice, json!({"action": "deploy"})).await;
    let vps_id = body["data"]["vps_id"].as_str().unwrap().to_string();
    settle().await;

    let (status, body) = docker(&app, &bob, json!({"action": "stop", "vps_id": vps_id})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "Forbidden");

    let (status, _) = exec(&app, &bob, &vps_id, "ls").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&app, Method::GET, &format!("/api/vps/{}", vps_id), Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&app, Method::GET, "/api/vps", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    // Denials leave no trace in the log
    let admin = login(&app, "admin", "admin").await;
    let (_, body) = call(&app, Method::GET, &format!("/api/activity?vps_id={}", vps_id), Some(&admin), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // Admin passes the same guard
    let (status, body) = docker(&app, &admin, json!({"action": "stop", "vps_id": vps_id})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "stopped");
}

#[tokio::test]
async fn test_dashboards_by_role() {
    let app = app().await;
    let alice = signup_and_login(&app, "alice").await;
    docker(&app, &alice, json!({"action": "deploy"})).await;
    settle().await;

    let (status, body) = call(&app, Method::GET, "/api/dashboard", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["view"], "user");
    assert_eq!(body["data"]["vps"]["status"], "running");

    let admin = login(&app, "admin", "admin").await;
    let (status, body) = call(&app, Method::GET, "/api/dashboard", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["view"], "admin");
    assert_eq!(body["data"]["totals"]["users"], 2);
    assert_eq!(body["data"]["totals"]["running"], 1);
    assert_eq!(body["data"]["vps"][0]["owner_username"], "alice");
}

#[tokio::test]
async fn test_session_and_user_management() {
    let app = app().await;
    let alice = signup_and_login(&app, "alice").await;
    let admin = login(&app, "admin", "admin").await;

    // Duplicate username
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/auth/signup",
        None,
        Some(json!({"username": "alice", "password": "secret"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "DuplicateUsername");

    // Wrong password
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"username": "alice", "password": "nope"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Users cannot manage users
    let (status, _) = call(&app, Method::GET, "/api/admin/users", Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&app, Method::GET, "/api/auth/me", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "user");
    let alice_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = call(
        &app,
        Method::PATCH,
        "/api/auth/me",
        Some(&alice),
        Some(json!({"email": "alice@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "alice@example.com");

    // Deactivation ends the session
    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/admin/users/{}/active", alice_id),
        Some(&admin),
        Some(json!({"active": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["active"], false);
    let (status, _) = call(&app, Method::GET, "/api/auth/me", Some(&alice), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, Method::DELETE, &format!("/api/admin/users/{}", alice_id), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = call(&app, Method::GET, "/api/admin/users", Some(&admin), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // Logout invalidates the token
    let (status, _) = call(&app, Method::POST, "/api/auth/logout", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, Method::GET, "/api/auth/me", Some(&admin), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_serve_stops_on_shutdown_signal() {
    let state = PanelState::new(PanelConfig::for_tests()).await.unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(server::serve(state, "127.0.0.1:0".parse().unwrap(), async move {
        let _ = shutdown_rx.await;
    }));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished());

    shutdown_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not drain")
        .unwrap();
    assert!(result.is_ok());
}
