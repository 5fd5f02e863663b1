use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use beacon_core::platform::Platform;
use beacon_db::models::app::CreateApp;
use beacon_db::models::audience::CreateAppUser;
use beacon_db::repositories::{AppRepo, CredentialRepo, UserRepo};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceExt;

use beacon_api::config::ServerConfig;
use beacon_api::middleware::member::{MEMBER_ID_HEADER, MEMBER_NAME_HEADER};
use beacon_api::router::build_app_router;
use beacon_api::state::AppState;

pub const MEMBER_ID: i64 = 7;
pub const MEMBER_NAME: &str = "Test Member";

/// Build a test `ServerConfig` with a fast test-send poll.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        test_poll_interval: Duration::from_millis(50),
        test_timeout: Duration::from_secs(2),
    }
}

/// Build the full application router, same middleware stack as production.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(MEMBER_ID_HEADER, MEMBER_ID.to_string())
        .header(MEMBER_NAME_HEADER, MEMBER_NAME);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn put_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(body)).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// An app with a real iOS credential and `test_uids` as its test audience.
pub async fn seed_app(pool: &PgPool, test_uids: &str) -> i64 {
    seed_app_for(pool, &[Platform::Ios], test_uids).await
}

/// An app with a real credential for each of `platforms`.
pub async fn seed_app_for(pool: &PgPool, platforms: &[Platform], test_uids: &str) -> i64 {
    let mut credentials = serde_json::Map::new();
    for platform in platforms {
        let credential = CredentialRepo::create(pool, *platform, &json!({"key": "k"}))
            .await
            .unwrap();
        credentials.insert(
            platform.code().to_string(),
            json!({ "credential_id": credential.id }),
        );
    }
    AppRepo::create(
        pool,
        &CreateApp {
            name: "Push App".to_string(),
            push_config: Some(json!({
                "credentials": credentials,
                "test": { "uids": test_uids },
            })),
            ..CreateApp::default()
        },
    )
    .await
    .unwrap()
    .id
}

/// A user with an iOS token.
pub async fn seed_user(pool: &PgPool, app_id: i64, uid: &str) -> i64 {
    let user = UserRepo::create(
        pool,
        &CreateAppUser {
            app_id,
            uid: uid.to_string(),
            locale: Some("en".to_string()),
            props: None,
        },
    )
    .await
    .unwrap();
    UserRepo::set_token(pool, user.id, Platform::Ios, &format!("tok-{uid}"), false)
        .await
        .unwrap();
    user.id
}

pub fn plain_trigger() -> Value {
    json!({ "kind": "plain", "start": chrono::Utc::now() })
}

pub fn event_trigger() -> Value {
    json!({ "kind": "event", "start": chrono::Utc::now(), "events": ["purchase"] })
}

/// A valid iOS message body with the given trigger.
pub fn message_body(app_id: i64, trigger: Value) -> Value {
    json!({
        "app_id": app_id,
        "platforms": ["i"],
        "triggers": [trigger],
        "contents": [{ "title": "Hello", "message": "World" }],
        "info": { "title": "Campaign" },
    })
}
