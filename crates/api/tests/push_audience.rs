//! HTTP-level tests for audience estimation.

mod common;

use axum::http::StatusCode;
use beacon_db::repositories::{CohortRepo, GeoRepo};
use common::{body_json, post_json};
use serde_json::json;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Test: estimate counts users with usable tokens, grouped by locale
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_estimate_counts_all_users(pool: PgPool) {
    let app_id = common::seed_app(&pool, "").await;
    common::seed_user(&pool, app_id, "u1").await;
    common::seed_user(&pool, app_id, "u2").await;

    let app = common::build_test_app(pool);
    let response = post_json(
        app,
        "/api/v1/push/estimate",
        json!({ "app_id": app_id, "platforms": ["i"] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let estimate = body_json(response).await["data"].clone();
    assert_eq!(estimate["count"], 2);
    assert_eq!(estimate["locales"]["en"], 2);
    assert_eq!(estimate["locales"]["default"], 0);
}

// ---------------------------------------------------------------------------
// Test: unknown cohort is rejected, then counted once it exists
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_estimate_cohort_lifecycle(pool: PgPool) {
    let app_id = common::seed_app(&pool, "").await;
    let body = json!({
        "app_id": app_id,
        "platforms": ["i"],
        "filter": { "cohorts": ["C1"] },
    });

    let response = post_json(common::build_test_app(pool.clone()), "/api/v1/push/estimate", body.clone()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["errors"], json!(["No such cohort"]));

    let cohort = CohortRepo::create(&pool, app_id, "C1", "Cohort one").await.unwrap();
    let response = post_json(common::build_test_app(pool.clone()), "/api/v1/push/estimate", body.clone()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["count"], 0);

    let user = common::seed_user(&pool, app_id, "member").await;
    common::seed_user(&pool, app_id, "outsider").await;
    CohortRepo::add_member(&pool, cohort.id, user).await.unwrap();

    let response = post_json(common::build_test_app(pool), "/api/v1/push/estimate", body).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["count"], 1);
}

// ---------------------------------------------------------------------------
// Test: geo filter narrows the audience
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_estimate_by_geo(pool: PgPool) {
    let app_id = common::seed_app(&pool, "").await;
    let inside = common::seed_user(&pool, app_id, "inside").await;
    common::seed_user(&pool, app_id, "outside").await;
    let geo = GeoRepo::create(&pool, Some(app_id), "Downtown").await.unwrap();
    GeoRepo::add_member(&pool, geo.id, inside).await.unwrap();

    let app = common::build_test_app(pool);
    let response = post_json(
        app,
        "/api/v1/push/estimate",
        json!({ "app_id": app_id, "platforms": ["i"], "filter": { "geos": [geo.id] } }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["count"], 1);
}

// ---------------------------------------------------------------------------
// Test: estimate needs credentials and at least one platform
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_estimate_without_platforms_is_rejected(pool: PgPool) {
    let app_id = common::seed_app(&pool, "").await;

    let app = common::build_test_app(pool);
    let response = post_json(
        app,
        "/api/v1/push/estimate",
        json!({ "app_id": app_id, "platforms": [] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["errors"],
        json!(["platforms: At least one platform is required"])
    );
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_estimate_for_platform_without_credentials(pool: PgPool) {
    let app_id = common::seed_app(&pool, "").await;

    let app = common::build_test_app(pool);
    let response = post_json(
        app,
        "/api/v1/push/estimate",
        json!({ "app_id": app_id, "platforms": ["a"] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["errors"],
        json!(["No push credentials for Android platform"])
    );
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_estimate_rejects_duplicate_platforms(pool: PgPool) {
    let app_id = common::seed_app(&pool, "").await;

    let app = common::build_test_app(pool);
    let response = post_json(
        app,
        "/api/v1/push/estimate",
        json!({ "app_id": app_id, "platforms": ["i", "i"] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["errors"], json!(["Duplicate platform 'i'"]));
}
