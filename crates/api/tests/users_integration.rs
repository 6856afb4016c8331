//! Integration tests for user routes: role gate, standing changes, and
//! peer transfers.
//!
//! These tests require a running PostgreSQL instance; set TEST_DATABASE_URL.

mod common;

use axum::http::{Method, StatusCode};
use common::{
    bare_request, cleanup_all_test_data, create_test_app, create_test_pool, create_user,
    create_user_with, expect_status, grant_points, json_request, reload_user, run_migrations,
    test_config,
};
use serde_json::json;

#[tokio::test]
async fn test_me_returns_own_profile() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let user = create_user(&pool, "regular").await;
    grant_points(&pool, &user, 42).await;

    let response = bare_request(&app, Method::GET, "/users/me", &user.token).await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["utorid"], user.utorid());
    assert_eq!(body["points"], 42);
    assert_eq!(body["role"], "regular");

    cleanup_all_test_data(&pool).await;
}

#[tokio::test]
async fn test_user_listing_is_manager_only() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let cashier = create_user(&pool, "cashier").await;
    let manager = create_user(&pool, "manager").await;
    create_user(&pool, "regular").await;

    let response = bare_request(&app, Method::GET, "/users", &cashier.token).await;
    expect_status(response, StatusCode::FORBIDDEN).await;

    let response = bare_request(&app, Method::GET, "/users?role=regular", &manager.token).await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["count"], 1);

    // Pagination bounds are enforced.
    let response = bare_request(&app, Method::GET, "/users?limit=101", &manager.token).await;
    expect_status(response, StatusCode::BAD_REQUEST).await;

    cleanup_all_test_data(&pool).await;
}

#[tokio::test]
async fn test_cashier_sees_limited_user_shape() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let cashier = create_user(&pool, "cashier").await;
    let manager = create_user(&pool, "manager").await;
    let target = create_user(&pool, "regular").await;

    let uri = format!("/users/{}", target.id());
    let response = bare_request(&app, Method::GET, &uri, &cashier.token).await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["utorid"], target.utorid());
    assert!(body.get("role").is_none());
    assert!(body.get("suspicious").is_none());

    let response = bare_request(&app, Method::GET, &uri, &manager.token).await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["role"], "regular");
    assert_eq!(body["suspicious"], false);

    cleanup_all_test_data(&pool).await;
}

#[tokio::test]
async fn test_role_changes_follow_the_gate() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let manager = create_user(&pool, "manager").await;
    let superuser = create_user(&pool, "superuser").await;
    let target = create_user(&pool, "regular").await;
    let uri = format!("/users/{}", target.id());

    // Manager promotes to cashier.
    let response = json_request(
        &app,
        Method::PATCH,
        &uri,
        &manager.token,
        json!({"role": "cashier"}),
    )
    .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["role"], "cashier");

    // Manager cannot mint managers.
    let response = json_request(
        &app,
        Method::PATCH,
        &uri,
        &manager.token,
        json!({"role": "manager"}),
    )
    .await;
    expect_status(response, StatusCode::FORBIDDEN).await;

    // Superuser can.
    let response = json_request(
        &app,
        Method::PATCH,
        &uri,
        &superuser.token,
        json!({"role": "manager"}),
    )
    .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["role"], "manager");

    // Unknown role strings are malformed.
    let response = json_request(
        &app,
        Method::PATCH,
        &uri,
        &superuser.token,
        json!({"role": "janitor"}),
    )
    .await;
    expect_status(response, StatusCode::BAD_REQUEST).await;

    cleanup_all_test_data(&pool).await;
}

#[tokio::test]
async fn test_suspicious_users_barred_from_cashier() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let superuser = create_user(&pool, "superuser").await;
    let target = create_user_with(&pool, "regular", true, true).await;
    let uri = format!("/users/{}", target.id());

    // Even a superuser cannot promote a suspicious user to cashier.
    let response = json_request(
        &app,
        Method::PATCH,
        &uri,
        &superuser.token,
        json!({"role": "cashier"}),
    )
    .await;
    expect_status(response, StatusCode::BAD_REQUEST).await;

    // Clearing the flag in the same request unblocks the promotion.
    let response = json_request(
        &app,
        Method::PATCH,
        &uri,
        &superuser.token,
        json!({"role": "cashier", "suspicious": false}),
    )
    .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["role"], "cashier");
    assert_eq!(body["suspicious"], false);

    cleanup_all_test_data(&pool).await;
}

#[tokio::test]
async fn test_transfer_over_http() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let sender = create_user(&pool, "regular").await;
    let recipient = create_user(&pool, "regular").await;
    grant_points(&pool, &sender, 100).await;

    let uri = format!("/users/{}/transactions", recipient.id());
    let response = json_request(
        &app,
        Method::POST,
        &uri,
        &sender.token,
        json!({"type": "transfer", "amount": 40, "remark": "thanks"}),
    )
    .await;
    let body = expect_status(response, StatusCode::CREATED).await;
    assert_eq!(body["type"], "transfer");
    assert_eq!(body["amount"], -40);
    assert_eq!(body["relatedId"], recipient.id());

    assert_eq!(reload_user(&pool, sender.id()).await.points, 60);
    assert_eq!(reload_user(&pool, recipient.id()).await.points, 40);

    // Self-transfers are malformed.
    let self_uri = format!("/users/{}/transactions", sender.id());
    let response = json_request(
        &app,
        Method::POST,
        &self_uri,
        &sender.token,
        json!({"type": "transfer", "amount": 10}),
    )
    .await;
    expect_status(response, StatusCode::BAD_REQUEST).await;

    // Unknown recipients are NotFound.
    let response = json_request(
        &app,
        Method::POST,
        "/users/999999/transactions",
        &sender.token,
        json!({"type": "transfer", "amount": 10}),
    )
    .await;
    expect_status(response, StatusCode::NOT_FOUND).await;

    cleanup_all_test_data(&pool).await;
}

#[tokio::test]
async fn test_unverified_sender_cannot_transfer() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let sender = create_user_with(&pool, "regular", false, false).await;
    let recipient = create_user(&pool, "regular").await;
    grant_points(&pool, &sender, 100).await;

    let uri = format!("/users/{}/transactions", recipient.id());
    let response = json_request(
        &app,
        Method::POST,
        &uri,
        &sender.token,
        json!({"type": "transfer", "amount": 10}),
    )
    .await;
    expect_status(response, StatusCode::FORBIDDEN).await;
    assert_eq!(reload_user(&pool, sender.id()).await.points, 100);

    cleanup_all_test_data(&pool).await;
}
