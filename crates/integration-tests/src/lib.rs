//! Integration tests for Haat.
//!
//! The tests talk HTTP to a running API server and are ignored by default.
//!
//! # Running Tests
//!
//! ```bash
//! # Migrate a scratch database and bootstrap an admin
//! haat migrate
//! haat admin create -p 9000000001 --password 'integration-admin'
//!
//! # Start the server, then run the ignored tests
//! cargo run -p haat-api &
//! HAAT_TEST_ADMIN_PHONE=9000000001 HAAT_TEST_ADMIN_PASSWORD=integration-admin \
//!     cargo test -p haat-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `HAAT_TEST_URL` - Base URL of the server (default: `http://127.0.0.1:3000`)
//! - `HAAT_TEST_ADMIN_PHONE` / `HAAT_TEST_ADMIN_PASSWORD` - Admin login for
//!   moderation tests

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::{Value, json};

/// Password used for every account the tests register.
pub const PASSWORD: &str = "integration-pass";

/// HTTP client bound to the server under test.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        let base_url = std::env::var("HAAT_TEST_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:3000".to_owned())
            .trim_end_matches('/')
            .to_owned();
        Self {
            client: Client::new(),
            base_url,
        }
    }

    /// Request builder for `path`, with a bearer token when given.
    ///
    /// Each request claims a different forwarded address so the login and
    /// registration rate limit does not trip across tests.
    #[must_use]
    pub fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .header("x-forwarded-for", random_client_ip());
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a JSON request and return the status and decoded body.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = self.request(method, path, token);
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        decode(builder).await
    }

    /// Register a shopper with a fresh phone number and return its token.
    pub async fn register_user(&self) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/user/auth/register",
                None,
                Some(json!({
                    "phoneNumber": unique_phone(),
                    "password": PASSWORD,
                    "firstName": "Test",
                    "lastName": "Shopper",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["token"].as_str().unwrap().to_owned()
    }

    /// Register a seller and return `(phone, token, seller id)`.
    pub async fn register_seller(&self) -> (String, String, i64) {
        let phone = unique_phone();
        let (status, body) = self
            .send(
                Method::POST,
                "/api/seller/auth/register",
                None,
                Some(json!({
                    "phoneNumber": phone,
                    "password": PASSWORD,
                    "name": "Test Seller",
                    "shopName": "Test Looms",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let token = body["data"]["token"].as_str().unwrap().to_owned();
        let id = body["data"]["seller"]["id"].as_i64().unwrap();
        (phone, token, id)
    }

    /// Log in with the admin from `HAAT_TEST_ADMIN_PHONE`/`HAAT_TEST_ADMIN_PASSWORD`.
    pub async fn login_admin(&self) -> String {
        let phone = std::env::var("HAAT_TEST_ADMIN_PHONE").unwrap();
        let password = std::env::var("HAAT_TEST_ADMIN_PASSWORD").unwrap();
        let (status, body) = self
            .send(
                Method::POST,
                "/api/admin/auth/login",
                None,
                Some(json!({"phoneNumber": phone, "password": password})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_owned()
    }

    /// Create a product as `seller_token` and return its JSON.
    ///
    /// `fields` are sent as multipart text parts on top of the defaults.
    pub async fn create_product(&self, seller_token: &str, fields: &[(&str, &str)]) -> Value {
        let mut form = reqwest::multipart::Form::new()
            .text("name", "Ikat Cotton Kurta")
            .text("price", "1000")
            .text("stock", "10")
            .text("sizes", "M,L")
            .text("colors", "Indigo");
        for (name, value) in fields {
            form = form.text((*name).to_owned(), (*value).to_owned());
        }

        let builder = self
            .request(Method::POST, "/api/seller/auth/products", Some(seller_token))
            .multipart(form);
        let (status, body) = decode(builder).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"].clone()
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Send a prepared request and decode its JSON body (`Null` when empty).
pub async fn decode(builder: RequestBuilder) -> (StatusCode, Value) {
    let response = builder.send().await.unwrap();
    let status = response.status();
    let bytes = response.bytes().await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

/// A random address in 10.0.0.0/8.
#[must_use]
pub fn random_client_ip() -> String {
    let [a, b, c, ..] = uuid::Uuid::new_v4().into_bytes();
    format!("10.{a}.{b}.{c}")
}

/// A ten digit phone number unlikely to collide with earlier runs.
#[must_use]
pub fn unique_phone() -> String {
    let n = uuid::Uuid::new_v4().as_u128() % 1_000_000_000;
    format!("8{n:09}")
}

/// Decimal fields are serialized as strings; read one as a float.
#[must_use]
pub fn decimal(value: &Value) -> f64 {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or(f64::NAN)
}
