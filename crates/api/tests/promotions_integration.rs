//! Integration tests for the promotion endpoints.
//!
//! These tests require a running PostgreSQL instance; set TEST_DATABASE_URL.

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::{
    bare_request, cleanup_all_test_data, create_test_app, create_test_pool, create_user,
    expect_status, json_request, run_migrations, test_config,
};
use persistence::repositories::PromotionRepository;
use serde_json::json;

fn future_window(hours: i64, length_hours: i64) -> (String, String) {
    let start = Utc::now() + Duration::hours(hours);
    let end = start + Duration::hours(length_hours);
    (start.to_rfc3339(), end.to_rfc3339())
}

#[tokio::test]
async fn test_create_promotion_validations() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let regular = create_user(&pool, "regular").await;
    let manager = create_user(&pool, "manager").await;
    let (start, end) = future_window(1, 48);

    let valid = json!({
        "name": "Exam Week Double",
        "description": "Double points during exams",
        "type": "automatic",
        "startTime": start,
        "endTime": end,
        "rate": 1.0,
    });

    let response = json_request(&app, Method::POST, "/promotions", &regular.token, valid.clone())
        .await;
    expect_status(response, StatusCode::FORBIDDEN).await;

    // Automatic promotions need a rate.
    let mut missing_rate = valid.clone();
    missing_rate.as_object_mut().unwrap().remove("rate");
    let response =
        json_request(&app, Method::POST, "/promotions", &manager.token, missing_rate).await;
    expect_status(response, StatusCode::BAD_REQUEST).await;

    // One-time promotions need fixed points.
    let onetime = json!({
        "name": "Weekend Treat",
        "description": "Single-use bonus",
        "type": "onetime",
        "startTime": start,
        "endTime": end,
    });
    let response = json_request(&app, Method::POST, "/promotions", &manager.token, onetime).await;
    expect_status(response, StatusCode::BAD_REQUEST).await;

    // Past start times are malformed.
    let mut past = valid.clone();
    past["startTime"] = json!((Utc::now() - Duration::hours(2)).to_rfc3339());
    let response = json_request(&app, Method::POST, "/promotions", &manager.token, past).await;
    expect_status(response, StatusCode::BAD_REQUEST).await;

    let response = json_request(&app, Method::POST, "/promotions", &manager.token, valid).await;
    let body = expect_status(response, StatusCode::CREATED).await;
    assert_eq!(body["type"], "automatic");
    assert_eq!(body["rate"], 1.0);

    cleanup_all_test_data(&pool).await;
}

#[tokio::test]
async fn test_regular_listing_shows_only_usable_promotions() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let manager = create_user(&pool, "manager").await;
    let user = create_user(&pool, "regular").await;
    let cashier = create_user(&pool, "cashier").await;

    let repo = PromotionRepository::new(pool.clone());
    // Active automatic.
    repo.create(
        "Active Auto",
        "",
        "automatic",
        Utc::now() - Duration::hours(1),
        Utc::now() + Duration::days(7),
        None,
        Some(0.1),
        None,
    )
    .await
    .unwrap();
    // Expired.
    repo.create(
        "Expired",
        "",
        "automatic",
        Utc::now() - Duration::days(7),
        Utc::now() - Duration::days(1),
        None,
        Some(0.1),
        None,
    )
    .await
    .unwrap();
    // Active one-time, which the user then consumes.
    let onetime = repo
        .create(
            "Once Only",
            "",
            "onetime",
            Utc::now() - Duration::hours(1),
            Utc::now() + Duration::days(7),
            None,
            None,
            Some(100),
        )
        .await
        .unwrap();

    let response = bare_request(&app, Method::GET, "/promotions", &user.token).await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["count"], 2);

    // Managers see all three.
    let response = bare_request(&app, Method::GET, "/promotions", &manager.token).await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["count"], 3);

    // Consume the one-time promotion through a purchase.
    let response = json_request(
        &app,
        Method::POST,
        "/transactions",
        &cashier.token,
        json!({
            "utorid": user.utorid(),
            "type": "purchase",
            "spent": 10.0,
            "promotionIds": [onetime.id],
        }),
    )
    .await;
    expect_status(response, StatusCode::CREATED).await;

    // It no longer appears in the user's available listing.
    let response = bare_request(&app, Method::GET, "/promotions", &user.token).await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["name"], "Active Auto");

    cleanup_all_test_data(&pool).await;
}

#[tokio::test]
async fn test_inactive_promotion_masked_for_regulars() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let manager = create_user(&pool, "manager").await;
    let user = create_user(&pool, "regular").await;

    let repo = PromotionRepository::new(pool.clone());
    let upcoming = repo
        .create(
            "Upcoming",
            "",
            "automatic",
            Utc::now() + Duration::days(1),
            Utc::now() + Duration::days(7),
            None,
            Some(0.1),
            None,
        )
        .await
        .unwrap();

    let uri = format!("/promotions/{}", upcoming.id);
    let response = bare_request(&app, Method::GET, &uri, &user.token).await;
    expect_status(response, StatusCode::NOT_FOUND).await;

    let response = bare_request(&app, Method::GET, &uri, &manager.token).await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["name"], "Upcoming");

    cleanup_all_test_data(&pool).await;
}

#[tokio::test]
async fn test_update_rules_freeze_after_start() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let manager = create_user(&pool, "manager").await;
    let repo = PromotionRepository::new(pool.clone());

    // Already running.
    let running = repo
        .create(
            "Running",
            "",
            "automatic",
            Utc::now() - Duration::hours(1),
            Utc::now() + Duration::days(7),
            None,
            Some(0.1),
            None,
        )
        .await
        .unwrap();

    let uri = format!("/promotions/{}", running.id);
    let response = json_request(
        &app,
        Method::PATCH,
        &uri,
        &manager.token,
        json!({"name": "Renamed"}),
    )
    .await;
    expect_status(response, StatusCode::BAD_REQUEST).await;

    // The end time is still editable while the window is open.
    let new_end = (Utc::now() + Duration::days(14)).to_rfc3339();
    let response = json_request(
        &app,
        Method::PATCH,
        &uri,
        &manager.token,
        json!({"endTime": new_end}),
    )
    .await;
    expect_status(response, StatusCode::OK).await;

    // Not-yet-started promotions are fully editable.
    let upcoming = repo
        .create(
            "Upcoming",
            "",
            "onetime",
            Utc::now() + Duration::days(1),
            Utc::now() + Duration::days(7),
            None,
            None,
            Some(50),
        )
        .await
        .unwrap();
    let uri = format!("/promotions/{}", upcoming.id);
    let response = json_request(
        &app,
        Method::PATCH,
        &uri,
        &manager.token,
        json!({"name": "Renamed", "points": 75}),
    )
    .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["name"], "Renamed");
    assert_eq!(body["points"], 75);

    cleanup_all_test_data(&pool).await;
}

#[tokio::test]
async fn test_delete_only_before_start() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let manager = create_user(&pool, "manager").await;
    let repo = PromotionRepository::new(pool.clone());

    let running = repo
        .create(
            "Running",
            "",
            "automatic",
            Utc::now() - Duration::hours(1),
            Utc::now() + Duration::days(7),
            None,
            Some(0.1),
            None,
        )
        .await
        .unwrap();
    let response = bare_request(
        &app,
        Method::DELETE,
        &format!("/promotions/{}", running.id),
        &manager.token,
    )
    .await;
    expect_status(response, StatusCode::FORBIDDEN).await;

    let upcoming = repo
        .create(
            "Upcoming",
            "",
            "automatic",
            Utc::now() + Duration::days(1),
            Utc::now() + Duration::days(7),
            None,
            Some(0.1),
            None,
        )
        .await
        .unwrap();
    let response = bare_request(
        &app,
        Method::DELETE,
        &format!("/promotions/{}", upcoming.id),
        &manager.token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    cleanup_all_test_data(&pool).await;
}
