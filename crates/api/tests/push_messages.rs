//! HTTP-level tests for the push message lifecycle endpoints.

mod common;

use axum::http::StatusCode;
use beacon_api::campaign::ops::KIND_LOCKED;
use beacon_core::platform::Platform;
use beacon_core::state::MessageState;
use beacon_core::trigger::TriggerKind;
use beacon_db::models::message::MessageChange;
use beacon_db::repositories::{AppEventRepo, AppRepo, MessageRepo};
use common::{body_json, delete, event_trigger, get, message_body, plain_trigger, post_json, put_json};
use serde_json::{json, Value};
use sqlx::PgPool;

const STREAMING: i64 = 3;

async fn create(pool: &PgPool, body: Value) -> Value {
    let app = common::build_test_app(pool.clone());
    let response = post_json(app, "/api/v1/push/messages", body).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

/// Force a message into the finished state, as the delivery worker would.
async fn mark_done(pool: &PgPool, id: i64) {
    let msg = MessageRepo::find_by_id(pool, id).await.unwrap().unwrap();
    let change = MessageChange {
        state: Some(MessageState::CREATED.with(MessageState::DONE)),
        ..MessageChange::default()
    };
    MessageRepo::update_if_state(pool, id, msg.state, &change)
        .await
        .unwrap()
        .unwrap();
}

fn reasons(json: &Value) -> Vec<String> {
    json["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e.as_str().unwrap().to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_create_schedules_message(pool: PgPool) {
    let app_id = common::seed_app(&pool, "").await;
    let msg = create(&pool, message_body(app_id, plain_trigger())).await;

    assert_eq!(msg["state"], STREAMING);
    assert_eq!(msg["status"], "scheduled");
    assert_eq!(msg["info"]["created_by"], common::MEMBER_ID);
    assert_eq!(msg["info"]["created_by_name"], common::MEMBER_NAME);
    assert_eq!(msg["info"]["app_name"], "Push App");

    let id = msg["id"].as_i64().unwrap();
    let app = common::build_test_app(pool);
    let response = get(app, &format!("/api/v1/push/messages/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["id"], id);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_create_draft_is_not_scheduled(pool: PgPool) {
    let app_id = common::seed_app(&pool, "").await;
    let mut body = message_body(app_id, plain_trigger());
    body["status"] = json!("draft");
    body["contents"] = json!([{ "title": "Only a title" }]);

    let msg = create(&pool, body).await;
    assert_eq!(msg["state"], 0);
    assert_eq!(msg["status"], "draft");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_create_collects_every_validation_error(pool: PgPool) {
    let app_id = common::seed_app(&pool, "").await;
    let body = json!({
        "app_id": app_id,
        "platforms": ["i"],
        "triggers": [{ "kind": "event", "start": chrono::Utc::now(), "events": [] }],
        "contents": [{ "title": "No body" }],
    });

    let app = common::build_test_app(pool);
    let response = post_json(app, "/api/v1/push/messages", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    let reasons = reasons(&json);
    assert!(reasons.iter().any(|r| r.contains("events must be a non-empty list")));
    assert!(reasons.contains(&"Default content must have a message".to_string()));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_create_without_credentials_is_rejected(pool: PgPool) {
    let app_id = AppRepo::create(
        &pool,
        &beacon_db::models::app::CreateApp {
            name: "Bare".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .id;

    let app = common::build_test_app(pool);
    let response = post_json(app, "/api/v1/push/messages", message_body(app_id, plain_trigger())).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(reasons(&json), vec!["No push credentials for iOS platform"]);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_create_rejects_duplicate_platforms(pool: PgPool) {
    let app_id = common::seed_app(&pool, "").await;
    let mut body = message_body(app_id, plain_trigger());
    body["platforms"] = json!(["i", "i"]);

    let app = common::build_test_app(pool.clone());
    let response = post_json(app, "/api/v1/push/messages", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(reasons(&json), vec!["Duplicate platform 'i'"]);

    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM push_messages")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stored, 0);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_create_for_unknown_app_returns_404(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = post_json(app, "/api/v1/push/messages", message_body(999_999, plain_trigger())).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Demo
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_demo_create_fills_results_without_scheduling(pool: PgPool) {
    let app_id = AppRepo::create(
        &pool,
        &beacon_db::models::app::CreateApp {
            name: "Demo".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .id;
    for i in 0..50 {
        common::seed_user(&pool, app_id, &format!("demo-{i}")).await;
    }

    let mut body = message_body(app_id, plain_trigger());
    body["demo"] = json!(1);
    let msg = create(&pool, body).await;

    assert_eq!(msg["info"]["demo"], true);
    let state = msg["state"].as_i64().unwrap();
    assert_eq!(state & 2, 0, "demo messages are never streamable");
    assert_eq!(msg["status"], "sent");
    assert!(msg["result"]["sent"].as_u64().unwrap() > 0);

    let app = AppRepo::find_by_id(&pool, app_id).await.unwrap().unwrap();
    assert_eq!(app.push_config["credentials"]["i"]["demo"], true);

    let events = AppEventRepo::list_by_app(&pool, app_id, None).await.unwrap();
    assert!(!events.is_empty());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_demo_no_data_only_marks_credentials(pool: PgPool) {
    let app_id = AppRepo::create(
        &pool,
        &beacon_db::models::app::CreateApp {
            name: "Demo".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .id;

    let mut body = message_body(app_id, plain_trigger());
    body["demo"] = json!("no-data");
    let msg = create(&pool, body).await;

    assert_eq!(msg["state"], 1);
    assert_eq!(msg["result"]["sent"], 0);

    let app = AppRepo::find_by_id(&pool, app_id).await.unwrap().unwrap();
    assert_eq!(app.push_config["credentials"]["a"]["demo"], true);
    assert!(AppEventRepo::list_by_app(&pool, app_id, None).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_update_rejects_platform_change(pool: PgPool) {
    let app_id = common::seed_app(&pool, "").await;
    let msg = create(&pool, message_body(app_id, plain_trigger())).await;
    let id = msg["id"].as_i64().unwrap();

    let mut body = message_body(app_id, plain_trigger());
    body["platforms"] = json!(["a"]);

    let app = common::build_test_app(pool);
    let response = put_json(app, &format!("/api/v1/push/messages/{id}"), body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert!(reasons(&json).contains(&"Message platforms cannot be changed".to_string()));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_update_accepts_reordered_platforms(pool: PgPool) {
    let app_id = common::seed_app_for(&pool, &[Platform::Ios, Platform::Android], "").await;
    let mut body = message_body(app_id, plain_trigger());
    body["platforms"] = json!(["i", "a"]);
    let msg = create(&pool, body.clone()).await;
    let id = msg["id"].as_i64().unwrap();

    body["platforms"] = json!(["a", "i"]);
    body["info"]["title"] = json!("Reordered");

    let app = common::build_test_app(pool);
    let response = put_json(app, &format!("/api/v1/push/messages/{id}"), body).await;
    assert_eq!(response.status(), StatusCode::OK);

    let updated = body_json(response).await["data"].clone();
    assert_eq!(updated["platforms"], json!(["i", "a"]));
    assert_eq!(updated["info"]["title"], "Reordered");
    assert_eq!(updated["state"], STREAMING);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_update_rejects_app_change(pool: PgPool) {
    let app_id = common::seed_app(&pool, "").await;
    let other_app = common::seed_app(&pool, "").await;
    let msg = create(&pool, message_body(app_id, plain_trigger())).await;
    let id = msg["id"].as_i64().unwrap();

    let app = common::build_test_app(pool);
    let response = put_json(
        app,
        &format!("/api/v1/push/messages/{id}"),
        message_body(other_app, plain_trigger()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(reasons(&json), vec!["Message app cannot be changed"]);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_update_stamps_editor_and_keeps_state(pool: PgPool) {
    let app_id = common::seed_app(&pool, "").await;
    let msg = create(&pool, message_body(app_id, plain_trigger())).await;
    let id = msg["id"].as_i64().unwrap();

    let mut body = message_body(app_id, plain_trigger());
    body["info"]["title"] = json!("Renamed");

    let app = common::build_test_app(pool);
    let response = put_json(app, &format!("/api/v1/push/messages/{id}"), body).await;
    assert_eq!(response.status(), StatusCode::OK);

    let updated = body_json(response).await["data"].clone();
    assert_eq!(updated["state"], STREAMING);
    assert_eq!(updated["info"]["title"], "Renamed");
    assert_eq!(updated["info"]["updated_by"], common::MEMBER_ID);
    assert_eq!(updated["info"]["created"], msg["info"]["created"]);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_update_submits_draft(pool: PgPool) {
    let app_id = common::seed_app(&pool, "").await;
    let mut draft = message_body(app_id, plain_trigger());
    draft["status"] = json!("draft");
    let msg = create(&pool, draft).await;
    let id = msg["id"].as_i64().unwrap();

    let app = common::build_test_app(pool);
    let response = put_json(
        app,
        &format!("/api/v1/push/messages/{id}"),
        message_body(app_id, plain_trigger()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let updated = body_json(response).await["data"].clone();
    assert_eq!(updated["state"], STREAMING);
    assert_eq!(updated["status"], "scheduled");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_update_retriggers_finished_event_message(pool: PgPool) {
    let app_id = common::seed_app(&pool, "").await;
    let msg = create(&pool, message_body(app_id, event_trigger())).await;
    let id = msg["id"].as_i64().unwrap();
    mark_done(&pool, id).await;

    let app = common::build_test_app(pool);
    let response = put_json(
        app,
        &format!("/api/v1/push/messages/{id}"),
        message_body(app_id, event_trigger()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let updated = body_json(response).await["data"].clone();
    assert_eq!(updated["state"], STREAMING);
    assert_eq!(updated["status"], "scheduled");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_update_rejects_finished_plain_message(pool: PgPool) {
    let app_id = common::seed_app(&pool, "").await;
    let msg = create(&pool, message_body(app_id, plain_trigger())).await;
    let id = msg["id"].as_i64().unwrap();
    mark_done(&pool, id).await;

    let app = common::build_test_app(pool);
    let response = put_json(
        app,
        &format!("/api/v1/push/messages/{id}"),
        message_body(app_id, plain_trigger()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(reasons(&json), vec!["Finished plain messages cannot be changed"]);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_update_rejects_finished_plain_message_with_api_trigger(pool: PgPool) {
    let app_id = common::seed_app(&pool, "").await;
    let msg = create(&pool, message_body(app_id, plain_trigger())).await;
    let id = msg["id"].as_i64().unwrap();
    mark_done(&pool, id).await;

    let api_trigger = json!({ "kind": "api", "start": chrono::Utc::now() });
    let app = common::build_test_app(pool.clone());
    let response = put_json(
        app,
        &format!("/api/v1/push/messages/{id}"),
        message_body(app_id, api_trigger),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(reasons(&json), vec!["Finished plain messages cannot be changed"]);

    let stored = MessageRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert!(stored.state.is(MessageState::DONE));
    assert!(!stored.state.is_streamable());
    assert_eq!(stored.triggers.0.len(), 1);
    assert_eq!(stored.triggers.0[0].kind(), TriggerKind::Plain);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_update_rejects_trigger_kind_change_on_finished_message(pool: PgPool) {
    let app_id = common::seed_app(&pool, "").await;
    let msg = create(&pool, message_body(app_id, event_trigger())).await;
    let id = msg["id"].as_i64().unwrap();
    mark_done(&pool, id).await;

    let api_trigger = json!({ "kind": "api", "start": chrono::Utc::now() });
    let app = common::build_test_app(pool.clone());
    let response = put_json(
        app,
        &format!("/api/v1/push/messages/{id}"),
        message_body(app_id, api_trigger),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(reasons(&json), vec![KIND_LOCKED]);

    let stored = MessageRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert!(!stored.state.is_streamable());
    assert_eq!(stored.triggers.0[0].kind(), TriggerKind::Event);
}

// ---------------------------------------------------------------------------
// Toggle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_toggle_alternates_and_rejects_redundant_calls(pool: PgPool) {
    let app_id = common::seed_app(&pool, "").await;
    let msg = create(&pool, message_body(app_id, event_trigger())).await;
    let id = msg["id"].as_i64().unwrap();
    let uri = format!("/api/v1/push/messages/{id}/toggle");

    let response = post_json(common::build_test_app(pool.clone()), &uri, json!({"active": true})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "The message is already active");

    let response = post_json(common::build_test_app(pool.clone()), &uri, json!({"active": false})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let stopped = body_json(response).await["data"].clone();
    assert_eq!(stopped["state"], 1);
    assert_eq!(stopped["status"], "created");

    let response = post_json(common::build_test_app(pool.clone()), &uri, json!({"active": false})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "The message is already stopped");

    let response = post_json(common::build_test_app(pool), &uri, json!({"active": true})).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["state"], STREAMING);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_toggle_plain_message_is_rejected(pool: PgPool) {
    let app_id = common::seed_app(&pool, "").await;
    let msg = create(&pool, message_body(app_id, plain_trigger())).await;
    let id = msg["id"].as_i64().unwrap();

    let app = common::build_test_app(pool);
    let response = post_json(
        app,
        &format!("/api/v1/push/messages/{id}/toggle"),
        json!({"active": false}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "The message doesn't have Cohort or Event trigger"
    );
}

// ---------------------------------------------------------------------------
// Remove
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_remove_streaming_message_then_404(pool: PgPool) {
    let app_id = common::seed_app(&pool, "").await;
    let msg = create(&pool, message_body(app_id, plain_trigger())).await;
    let id = msg["id"].as_i64().unwrap();
    let uri = format!("/api/v1/push/messages/{id}");

    let response = delete(common::build_test_app(pool.clone()), &uri).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = delete(common::build_test_app(pool.clone()), &uri).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(common::build_test_app(pool.clone()), &uri).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let stored = MessageRepo::find_any(&pool, id).await.unwrap().unwrap();
    assert!(stored.state.is_deleted());
    assert!(!stored.state.is_streamable());
    assert_eq!(stored.result.0.removed_by, Some(common::MEMBER_ID));
    assert_eq!(stored.result.0.removed_by_name.as_deref(), Some(common::MEMBER_NAME));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_update_deleted_message_returns_404(pool: PgPool) {
    let app_id = common::seed_app(&pool, "").await;
    let msg = create(&pool, message_body(app_id, plain_trigger())).await;
    let id = msg["id"].as_i64().unwrap();
    let uri = format!("/api/v1/push/messages/{id}");

    delete(common::build_test_app(pool.clone()), &uri).await;

    let response = put_json(common::build_test_app(pool), &uri, message_body(app_id, plain_trigger())).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_list_separates_plain_and_auto_messages(pool: PgPool) {
    let app_id = common::seed_app(&pool, "").await;
    create(&pool, message_body(app_id, plain_trigger())).await;
    create(&pool, message_body(app_id, plain_trigger())).await;
    create(&pool, message_body(app_id, event_trigger())).await;

    let response = get(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/push/messages?app_id={app_id}&echo=3"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_json(response).await["data"].clone();
    assert_eq!(page["echo"], "3");
    assert_eq!(page["total_records"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 2);

    let response = get(
        common::build_test_app(pool),
        &format!("/api/v1/push/messages?app_id={app_id}&auto=true"),
    )
    .await;
    let page = body_json(response).await["data"].clone();
    assert_eq!(page["total_records"], 1);
    assert_eq!(page["items"][0]["triggers"][0]["kind"], "event");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_list_search_narrows_display_count(pool: PgPool) {
    let app_id = common::seed_app(&pool, "").await;
    create(&pool, message_body(app_id, plain_trigger())).await;
    let mut body = message_body(app_id, plain_trigger());
    body["contents"] = json!([{ "title": "Flash sale", "message": "50% off" }]);
    create(&pool, body).await;

    let response = get(
        common::build_test_app(pool),
        &format!("/api/v1/push/messages?app_id={app_id}&search=flash"),
    )
    .await;
    let page = body_json(response).await["data"].clone();
    assert_eq!(page["total_records"], 2);
    assert_eq!(page["total_display_records"], 1);
    assert_eq!(page["items"][0]["contents"][0]["title"], "Flash sale");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_list_rejects_unknown_sort_column(pool: PgPool) {
    let app_id = common::seed_app(&pool, "").await;
    let response = get(
        common::build_test_app(pool),
        &format!("/api/v1/push/messages?app_id={app_id}&sort=password"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
