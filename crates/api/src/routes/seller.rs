//! Seller dashboard routes. Every response body is wrapped in `{"data": ...}`.

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use haat_core::{OrderId, OrderStatus, ProductId, Role, SellerId, SellerStatus};

use super::discard_on_error;
use crate::db::orders::{RevenueSummary, StatusCount};
use crate::db::{CategoryRepository, OrderRepository, ProductRepository, SellerRepository};
use crate::error::{AppError, Result};
use crate::middleware::{RequireSeller, auth_rate_limiter};
use crate::models::order::views;
use crate::models::{
    Category, Data, Message, OrderView, PaymentDetails, Product, ProductInput, Seller,
    SellerUpdate, clean,
};
use crate::services::auth::{AuthError, AuthService, Credentials, SellerSignup};
use crate::services::uploads::{FormFields, UploadKind};
use crate::state::AppState;

/// Create the seller routes router.
pub fn routes() -> Router<AppState> {
    let account = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .layer(auth_rate_limiter());

    Router::new()
        .merge(account)
        .route("/verify-token", get(verify_token))
        .route("/products", get(products).post(create_product))
        .route("/products/{id}", put(update_product).delete(delete_product))
        .route("/products/{id}/toggle-status", put(toggle_status))
        .route("/orders", get(orders))
        .route("/orders/{id}", put(update_order))
        .route("/revenue", get(revenue))
        .route("/profile", get(profile).put(update_profile))
        .route("/categories", get(categories))
        .layer(axum::extract::DefaultBodyLimit::max(
            crate::services::uploads::MAX_FORM_BYTES,
        ))
}

// =============================================================================
// Account
// =============================================================================

#[derive(Debug, Serialize)]
pub struct SellerSession {
    pub token: String,
    pub seller: Seller,
}

fn session(state: &AppState, seller: Seller) -> Result<Data<SellerSession>> {
    let token = state
        .tokens()
        .issue(Role::Seller, seller.id.as_i32(), &seller.phone_number, Utc::now())?;
    Ok(Data::new(SellerSession { token, seller }))
}

/// POST /api/seller/auth/register
async fn register(
    State(state): State<AppState>,
    Json(signup): Json<SellerSignup>,
) -> Result<(StatusCode, Json<Data<SellerSession>>)> {
    let seller = AuthService::new(state.pool()).register_seller(signup).await?;
    Ok((StatusCode::CREATED, Json(session(&state, seller)?)))
}

/// POST /api/seller/auth/login
async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<Data<SellerSession>>> {
    let seller = AuthService::new(state.pool())
        .login_seller(&credentials)
        .await?;
    Ok(Json(session(&state, seller)?))
}

/// Fails for accounts an admin has disabled, even with a valid token.
fn ensure_enabled(status: SellerStatus) -> std::result::Result<(), AuthError> {
    match status {
        SellerStatus::Enabled => Ok(()),
        SellerStatus::Disabled => Err(AuthError::AccountDisabled),
    }
}

/// The calling seller, if the account still exists and is enabled.
async fn load_seller(state: &AppState, id: SellerId) -> Result<Seller> {
    let seller = SellerRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or(AuthError::AccountNotFound)?;
    ensure_enabled(seller.status)?;
    Ok(seller)
}

/// GET /api/seller/auth/verify-token
async fn verify_token(
    State(state): State<AppState>,
    RequireSeller(seller_id): RequireSeller,
) -> Result<Json<Data<Seller>>> {
    Ok(Json(Data::new(load_seller(&state, seller_id).await?)))
}

/// GET /api/seller/auth/profile
async fn profile(
    State(state): State<AppState>,
    RequireSeller(seller_id): RequireSeller,
) -> Result<Json<Data<Seller>>> {
    Ok(Json(Data::new(load_seller(&state, seller_id).await?)))
}

/// Profile form fields. A `paymentDetails` part holds JSON and replaces the
/// stored details as a whole.
fn seller_update(form: &FormFields, picture: Option<String>) -> Result<SellerUpdate> {
    let email = form
        .text("email")
        .map(haat_core::Email::parse)
        .transpose()
        .map_err(AuthError::from)?;
    let payment_details = form
        .text("paymentDetails")
        .map(serde_json::from_str::<PaymentDetails>)
        .transpose()
        .map_err(|_| AppError::BadRequest("paymentDetails must be a JSON object".to_string()))?;

    let text = |name: &str| clean(form.text(name).map(str::to_owned));
    Ok(SellerUpdate {
        name: text("name"),
        shop_name: text("shopName"),
        email,
        address: text("address"),
        profile_picture: picture,
        payment_id: text("paymentId"),
        aadhaar_id: text("aadhaarId"),
        payment_details,
    })
}

/// PUT /api/seller/auth/profile (multipart, optional `profilePicture` file)
async fn update_profile(
    State(state): State<AppState>,
    RequireSeller(seller_id): RequireSeller,
    multipart: Multipart,
) -> Result<Json<Data<Seller>>> {
    let previous = load_seller(&state, seller_id).await?;
    let uploads = state.uploads();
    let (form, stored) = uploads
        .read_form(multipart, UploadKind::ProfilePicture)
        .await?;

    let result = async {
        let update = seller_update(&form, stored.first().cloned())?;
        let seller = SellerRepository::new(state.pool())
            .update(seller_id, &update)
            .await?;
        Ok::<_, AppError>(seller)
    }
    .await;
    let seller = discard_on_error(uploads, &stored, result).await?;

    if let Some(old) = previous.profile_picture
        && seller.profile_picture.as_deref() != Some(old.as_str())
    {
        uploads.remove(&old).await;
    }
    Ok(Json(Data::new(seller)))
}

/// GET /api/seller/auth/categories
async fn categories(
    State(state): State<AppState>,
    RequireSeller(seller_id): RequireSeller,
) -> Result<Json<Data<Vec<Category>>>> {
    load_seller(&state, seller_id).await?;
    let categories = CategoryRepository::new(state.pool()).list().await?;
    Ok(Json(Data::new(categories)))
}

// =============================================================================
// Products
// =============================================================================

/// GET /api/seller/auth/products
async fn products(
    State(state): State<AppState>,
    RequireSeller(seller_id): RequireSeller,
) -> Result<Json<Data<Vec<Product>>>> {
    load_seller(&state, seller_id).await?;
    let products = ProductRepository::new(state.pool())
        .list_for_seller(seller_id)
        .await?;
    Ok(Json(Data::new(products)))
}

async fn owned_product(state: &AppState, id: ProductId, seller_id: SellerId) -> Result<Product> {
    ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .filter(|p| p.seller_id == seller_id)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

/// POST /api/seller/auth/products (multipart, `images` files)
async fn create_product(
    State(state): State<AppState>,
    RequireSeller(seller_id): RequireSeller,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Data<Product>>)> {
    load_seller(&state, seller_id).await?;
    let uploads = state.uploads();
    let (form, stored) = uploads.read_form(multipart, UploadKind::ProductImage).await?;

    let result = async {
        let mut input = ProductInput::from_form(&form).map_err(AppError::BadRequest)?;
        input.images.extend(stored.iter().cloned());
        let product = ProductRepository::new(state.pool())
            .create(seller_id, &input)
            .await?;
        Ok::<_, AppError>(product)
    }
    .await;
    let product = discard_on_error(uploads, &stored, result).await?;

    tracing::info!(product_id = %product.id, seller_id = %seller_id, "Product created");
    Ok((StatusCode::CREATED, Json(Data::new(product))))
}

/// PUT /api/seller/auth/products/{id} (multipart)
///
/// `existingImages` lists the images to keep; new files are appended. Without
/// either the current images stay.
async fn update_product(
    State(state): State<AppState>,
    RequireSeller(seller_id): RequireSeller,
    Path(id): Path<ProductId>,
    multipart: Multipart,
) -> Result<Json<Data<Product>>> {
    load_seller(&state, seller_id).await?;
    let uploads = state.uploads();
    let (form, stored) = uploads.read_form(multipart, UploadKind::ProductImage).await?;

    let result = async {
        let current = owned_product(&state, id, seller_id).await?;
        let mut input = ProductInput::from_form(&form).map_err(AppError::BadRequest)?;
        if form.text("existingImages").is_none() && stored.is_empty() {
            input.images.clone_from(&current.images);
        }
        input.images.extend(stored.iter().cloned());

        let product = ProductRepository::new(state.pool())
            .update(id, seller_id, &input)
            .await?;
        Ok::<_, AppError>((current, product))
    }
    .await;
    let (current, product) = discard_on_error(uploads, &stored, result).await?;

    for old in current.images.iter().filter(|url| !product.images.contains(url)) {
        uploads.remove(old).await;
    }
    Ok(Json(Data::new(product)))
}

/// DELETE /api/seller/auth/products/{id}
async fn delete_product(
    State(state): State<AppState>,
    RequireSeller(seller_id): RequireSeller,
    Path(id): Path<ProductId>,
) -> Result<Json<Data<Message>>> {
    load_seller(&state, seller_id).await?;
    let product = ProductRepository::new(state.pool())
        .delete(id, Some(seller_id))
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    for url in &product.images {
        state.uploads().remove(url).await;
    }
    Ok(Json(Data::new(Message::new("Product deleted successfully"))))
}

/// PUT /api/seller/auth/products/{id}/toggle-status
async fn toggle_status(
    State(state): State<AppState>,
    RequireSeller(seller_id): RequireSeller,
    Path(id): Path<ProductId>,
) -> Result<Json<Data<Product>>> {
    load_seller(&state, seller_id).await?;
    let product = owned_product(&state, id, seller_id).await?;
    let product = ProductRepository::new(state.pool())
        .set_status(id, seller_id, product.status.toggled())
        .await?;
    Ok(Json(Data::new(product)))
}

// =============================================================================
// Orders
// =============================================================================

/// Body of `PUT /orders/{id}`: either an explicit status or
/// `{"advance": true}` to move one step forward.
#[derive(Debug, Default, Deserialize)]
pub struct StatusUpdate {
    pub status: Option<String>,
    #[serde(default)]
    pub advance: bool,
    pub note: Option<String>,
}

/// What a [`StatusUpdate`] asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Set(OrderStatus),
    Advance,
}

impl StatusUpdate {
    fn transition(&self) -> Result<Transition> {
        if self.advance {
            return Ok(Transition::Advance);
        }
        let raw = self
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::BadRequest("status or advance is required".to_string()))?;
        raw.parse::<OrderStatus>()
            .map(Transition::Set)
            .map_err(|_| AppError::BadRequest(format!("Invalid order status: {raw}")))
    }
}

/// GET /api/seller/auth/orders
async fn orders(
    State(state): State<AppState>,
    RequireSeller(seller_id): RequireSeller,
) -> Result<Json<Data<Vec<OrderView>>>> {
    load_seller(&state, seller_id).await?;
    let orders = OrderRepository::new(state.pool())
        .list_for_seller(seller_id)
        .await?;
    Ok(Json(Data::new(views(orders))))
}

/// PUT /api/seller/auth/orders/{id}
async fn update_order(
    State(state): State<AppState>,
    RequireSeller(seller_id): RequireSeller,
    Path(id): Path<OrderId>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Data<OrderView>>> {
    let transition = update.transition()?;
    load_seller(&state, seller_id).await?;

    let repo = OrderRepository::new(state.pool());
    let mut order = repo
        .get_by_id(id)
        .await?
        .filter(|o| o.seller_id == seller_id)
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    let from = order.status;
    match transition {
        Transition::Advance => order.advance()?,
        Transition::Set(status) => order.set_status(status)?,
    };

    let note = clean(update.note);
    repo.save(&mut order, note.as_deref()).await?;
    tracing::info!(
        order_number = %order.order_number,
        from = %from,
        to = %order.status,
        "Order status updated"
    );
    Ok(Json(Data::new(order.into())))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueResponse {
    #[serde(flatten)]
    pub summary: RevenueSummary,
    pub status_counts: Vec<StatusCount>,
}

/// GET /api/seller/auth/revenue
async fn revenue(
    State(state): State<AppState>,
    RequireSeller(seller_id): RequireSeller,
) -> Result<Json<Data<RevenueResponse>>> {
    load_seller(&state, seller_id).await?;
    let repo = OrderRepository::new(state.pool());
    let summary = repo.revenue_for_seller(seller_id).await?;
    let status_counts = repo.status_counts_for_seller(seller_id).await?;
    Ok(Json(Data::new(RevenueResponse {
        summary,
        status_counts,
    })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use haat_core::Role;

    use super::*;
    use crate::routes::tests::{send, test_state, token_for};

    fn update(body: serde_json::Value) -> StatusUpdate {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_transition_parsing() {
        assert_eq!(
            update(json!({"advance": true})).transition().unwrap(),
            Transition::Advance
        );
        assert_eq!(
            update(json!({"status": "out for delivery"}))
                .transition()
                .unwrap(),
            Transition::Set(OrderStatus::OutForDelivery)
        );
        assert!(update(json!({"status": "teleported"})).transition().is_err());
        assert!(update(json!({})).transition().is_err());
    }

    #[test]
    fn test_seller_update_from_form() {
        let mut form = FormFields::default();
        form.push("shopName", " Loom & Thread ");
        form.push("email", "Orders@Loom.in");
        form.push("paymentDetails", r#"{"upiId": "loom@upi"}"#);

        let update = seller_update(&form, Some("/uploads/profile-1.png".to_owned())).unwrap();
        assert_eq!(update.shop_name.as_deref(), Some("Loom & Thread"));
        assert_eq!(update.email.unwrap().as_str(), "orders@loom.in");
        assert_eq!(
            update.payment_details.unwrap().upi_id.as_deref(),
            Some("loom@upi")
        );
        assert!(update.name.is_none());
    }

    #[test]
    fn test_seller_update_rejects_bad_payment_details() {
        let mut form = FormFields::default();
        form.push("paymentDetails", "not json");
        assert!(seller_update(&form, None).is_err());
    }

    #[test]
    fn test_disabled_seller_locked_out() {
        assert!(ensure_enabled(SellerStatus::Enabled).is_ok());

        let err = ensure_enabled(SellerStatus::Disabled).unwrap_err();
        assert!(matches!(err, AuthError::AccountDisabled));
        let response = axum::response::IntoResponse::into_response(AppError::from(err));
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_order_update_requires_status_or_advance() {
        let state = test_state();
        let token = token_for(&state, Role::Seller, 2);
        let (status, body) = send(
            state,
            "PUT",
            "/api/seller/auth/orders/15",
            Some(&token),
            Some(json!({"note": "packed"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "status or advance is required");
    }

    #[tokio::test]
    async fn test_user_token_rejected_by_seller_namespace() {
        let state = test_state();
        let token = token_for(&state, Role::User, 2);
        let (status, _) = send(state, "GET", "/api/seller/auth/orders", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
