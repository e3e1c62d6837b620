//! Admin moderation: categories, seller status and product approval.
//!
//! Needs a running server and `HAAT_TEST_ADMIN_*`; see the crate docs.

#![allow(clippy::unwrap_used)]

use haat_integration_tests::{PASSWORD, TestContext, decode};
use reqwest::{Method, StatusCode};
use serde_json::json;

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_category_lifecycle() {
    let ctx = TestContext::new();
    let admin = ctx.login_admin().await;
    let name = format!("Block Prints {}", uuid::Uuid::new_v4().simple());

    let form = reqwest::multipart::Form::new()
        .text("name", name.clone())
        .text("description", "Hand-stamped textiles");
    let (status, body) = decode(
        ctx.request(Method::POST, "/api/categories", Some(&admin))
            .multipart(form),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = body["category"]["id"].as_i64().unwrap();

    // Duplicate names conflict
    let form = reqwest::multipart::Form::new().text("name", name.clone());
    let (status, _) = decode(
        ctx.request(Method::POST, "/api/categories", Some(&admin))
            .multipart(form),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = ctx
        .send(
            Method::GET,
            "/api/categories/search?name=block%20prints",
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        body["categories"]
            .as_array()
            .unwrap()
            .iter()
            .any(|c| c["id"] == id)
    );

    let (status, body) = ctx
        .send(
            Method::DELETE,
            "/api/categories/bulk",
            Some(&admin),
            Some(json!({"ids": [id]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "1 categories deleted successfully");
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_disabled_seller_cannot_log_in() {
    let ctx = TestContext::new();
    let admin = ctx.login_admin().await;
    let (phone, seller_token, seller_id) = ctx.register_seller().await;
    let product = ctx.create_product(&seller_token, &[]).await;
    let product_id = product["id"].as_i64().unwrap();
    let user = ctx.register_user().await;

    let (status, body) = ctx
        .send(
            Method::PUT,
            &format!("/api/admin/auth/sellers/{seller_id}"),
            Some(&admin),
            Some(json!({"status": "disabled"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, _) = ctx
        .send(
            Method::POST,
            "/api/seller/auth/login",
            None,
            Some(json!({"phoneNumber": phone, "password": PASSWORD})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // A token issued before the account was disabled no longer works.
    let (status, body) = ctx
        .send(Method::GET, "/api/seller/auth/orders", Some(&seller_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");

    let (status, _) = ctx
        .send(
            Method::GET,
            &format!("/api/user/auth/products/{product_id}"),
            Some(&user),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_suspended_product_is_hidden_from_shoppers() {
    let ctx = TestContext::new();
    let admin = ctx.login_admin().await;
    let (_, seller_token, _) = ctx.register_seller().await;
    let product = ctx.create_product(&seller_token, &[]).await;
    let product_id = product["id"].as_i64().unwrap();
    let user = ctx.register_user().await;

    let (status, body) = ctx
        .send(
            Method::PUT,
            &format!("/api/admin/auth/products/{product_id}"),
            Some(&admin),
            Some(json!({"approval": "suspended"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = ctx
        .send(
            Method::GET,
            &format!("/api/user/auth/products/{product_id}"),
            Some(&user),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Product not found");
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_admin_create_requires_admin_token() {
    let ctx = TestContext::new();
    let user = ctx.register_user().await;

    let (status, _) = ctx
        .send(
            Method::POST,
            "/api/admin/auth/admin/create",
            Some(&user),
            Some(json!({"phoneNumber": "9123456780", "password": PASSWORD})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
