//! Shopper journey: cart reconciliation, saved-for-later and checkout.
//!
//! Needs a running server; see the crate docs.

#![allow(clippy::unwrap_used, clippy::float_cmp)]

use haat_integration_tests::{TestContext, decimal};
use reqwest::{Method, StatusCode};
use serde_json::json;

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_cart_upsert_overwrites_quantity() {
    let ctx = TestContext::new();
    let (_, seller_token, _) = ctx.register_seller().await;
    let product = ctx.create_product(&seller_token, &[]).await;
    let product_id = product["id"].as_i64().unwrap();
    let user = ctx.register_user().await;

    for quantity in [2, 3] {
        let (status, body) = ctx
            .send(
                Method::POST,
                "/api/user/auth/cart",
                Some(&user),
                Some(json!({
                    "productId": product_id,
                    "quantity": quantity,
                    "size": "M",
                    "color": "Indigo",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    // Same product in another size is a separate line
    ctx.send(
        Method::POST,
        "/api/user/auth/cart",
        Some(&user),
        Some(json!({"productId": product_id, "quantity": 1, "size": "L", "color": "Indigo"})),
    )
    .await;

    let (status, body) = ctx
        .send(Method::GET, "/api/user/auth/cart", Some(&user), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cart"].as_array().unwrap().len(), 2);
    assert_eq!(body["totalQuantity"], 4);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_save_for_later_round_trip() {
    let ctx = TestContext::new();
    let (_, seller_token, _) = ctx.register_seller().await;
    let product = ctx.create_product(&seller_token, &[]).await;
    let product_id = product["id"].as_i64().unwrap();
    let user = ctx.register_user().await;

    ctx.send(
        Method::POST,
        "/api/user/auth/cart",
        Some(&user),
        Some(json!({"productId": product_id, "quantity": 2, "size": "M", "color": "Indigo"})),
    )
    .await;

    let (status, body) = ctx
        .send(
            Method::POST,
            &format!("/api/user/auth/cart/{product_id}/save-for-later"),
            Some(&user),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["cart"].as_array().unwrap().is_empty());
    assert_eq!(body["savedForLater"].as_array().unwrap().len(), 1);

    let (status, body) = ctx
        .send(
            Method::POST,
            &format!("/api/user/auth/saved/{product_id}/move-to-cart"),
            Some(&user),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["savedForLater"].as_array().unwrap().is_empty());
    assert_eq!(body["cart"][0]["quantity"], 2);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_wishlist_toggle() {
    let ctx = TestContext::new();
    let (_, seller_token, _) = ctx.register_seller().await;
    let product = ctx.create_product(&seller_token, &[]).await;
    let product_id = product["id"].as_i64().unwrap();
    let user = ctx.register_user().await;
    let path = format!("/api/user/auth/wishlist/{product_id}");

    let (_, body) = ctx.send(Method::PUT, &path, Some(&user), None).await;
    assert_eq!(body["action"], "added");
    let (_, body) = ctx.send(Method::PUT, &path, Some(&user), None).await;
    assert_eq!(body["action"], "removed");
    assert!(body["wishlist"].as_array().unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_checkout_splits_payment_and_empties_cart() {
    let ctx = TestContext::new();
    let (_, seller_token, _) = ctx.register_seller().await;
    let product = ctx
        .create_product(
            &seller_token,
            &[
                ("isCashOnDeliveryAvailable", "true"),
                ("onlinePaymentPercentage", "30"),
            ],
        )
        .await;
    let product_id = product["id"].as_i64().unwrap();
    let user = ctx.register_user().await;

    ctx.send(
        Method::POST,
        "/api/user/auth/cart",
        Some(&user),
        Some(json!({"productId": product_id, "quantity": 3, "size": "M", "color": "Indigo"})),
    )
    .await;

    let (status, body) = ctx
        .send(
            Method::POST,
            "/api/user/auth/orders",
            Some(&user),
            Some(json!({
                "address": {
                    "street": "12 Weavers Lane",
                    "city": "Pochampally",
                    "state": "Telangana",
                    "postalCode": "508284",
                }
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let order = &body["orders"][0];
    assert_eq!(order["status"], "order confirmed");
    assert_eq!(order["paymentMethod"], "Split Payment");
    assert_eq!(decimal(&order["onlineAmount"]), 900.0);
    assert_eq!(decimal(&order["codAmount"]), 2100.0);
    assert_eq!(decimal(&order["calculatedTotal"]), decimal(&order["total"]));

    let (_, cart) = ctx
        .send(Method::GET, "/api/user/auth/cart", Some(&user), None)
        .await;
    assert_eq!(cart["totalQuantity"], 0);

    let (_, listed) = ctx
        .send(
            Method::GET,
            &format!("/api/user/auth/products/{product_id}"),
            Some(&user),
            None,
        )
        .await;
    assert_eq!(listed["product"]["stock"], 7);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_checkout_rejects_short_stock() {
    let ctx = TestContext::new();
    let (_, seller_token, _) = ctx.register_seller().await;
    let product = ctx.create_product(&seller_token, &[("stock", "1")]).await;
    let product_id = product["id"].as_i64().unwrap();
    let user = ctx.register_user().await;

    ctx.send(
        Method::POST,
        "/api/user/auth/cart",
        Some(&user),
        Some(json!({"productId": product_id, "quantity": 2, "size": "M", "color": "Indigo"})),
    )
    .await;

    let (status, _) = ctx
        .send(
            Method::POST,
            "/api/user/auth/orders",
            Some(&user),
            Some(json!({"address": {"city": "Jaipur"}})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, cart) = ctx
        .send(Method::GET, "/api/user/auth/cart", Some(&user), None)
        .await;
    assert_eq!(cart["totalQuantity"], 2);
}
