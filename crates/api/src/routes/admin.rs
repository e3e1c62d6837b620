//! Admin console routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use chrono::Utc;
use serde::Serialize;

use haat_core::{AdminId, Email, PhoneNumber, ProductId, Role, SellerId, UserId};

use crate::db::{
    AdminRepository, ProductRepository, RepositoryError, SellerRepository, UserRepository,
};
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, auth_rate_limiter};
use crate::models::{
    Admin, AdminProductUpdate, AdminSellerUpdate, AdminUserUpdate, Message, Product, Seller,
    SellerUpdate, User, clean,
};
use crate::services::auth::{AdminSignup, AuthError, AuthService, Credentials};
use crate::state::AppState;

/// Create the admin routes router.
pub fn routes() -> Router<AppState> {
    let account = Router::new()
        .route("/login", post(login))
        .layer(auth_rate_limiter());

    Router::new()
        .merge(account)
        .route("/admin/create", post(create_admin))
        .route("/verify-token", get(verify_token))
        .route("/sellers", get(sellers))
        .route("/sellers/{id}", put(update_seller).delete(delete_seller))
        .route("/products", get(products))
        .route("/products/{id}", put(update_product).delete(delete_product))
        .route("/users", get(users))
        .route("/users/{id}", put(update_user).delete(delete_user))
}

// =============================================================================
// Account
// =============================================================================

/// The admin identity echoed by login and token checks.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminIdentity {
    pub id: AdminId,
    pub phone_number: PhoneNumber,
    pub role: Role,
}

impl From<&Admin> for AdminIdentity {
    fn from(admin: &Admin) -> Self {
        Self {
            id: admin.id,
            phone_number: admin.phone_number.clone(),
            role: Role::Admin,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub message: &'static str,
    pub admin: Admin,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub admin: AdminIdentity,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub message: &'static str,
    pub admin: AdminIdentity,
}

/// POST /api/admin/auth/admin/create
///
/// Only an existing admin can add another; the first one is created with
/// `haat admin create`.
async fn create_admin(
    State(state): State<AppState>,
    RequireAdmin(by): RequireAdmin,
    Json(signup): Json<AdminSignup>,
) -> Result<(StatusCode, Json<CreatedResponse>)> {
    let admin = AuthService::new(state.pool()).create_admin(signup).await?;
    tracing::info!(admin_id = %admin.id, created_by = %by, "Admin created");
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "Admin created successfully",
            admin,
        }),
    ))
}

/// POST /api/admin/auth/login
async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<LoginResponse>> {
    let admin = AuthService::new(state.pool())
        .login_admin(&credentials)
        .await?;
    let token = state
        .tokens()
        .issue(Role::Admin, admin.id.as_i32(), &admin.phone_number, Utc::now())?;

    Ok(Json(LoginResponse {
        message: "Logged in successfully",
        admin: AdminIdentity::from(&admin),
        token,
    }))
}

/// GET /api/admin/auth/verify-token
async fn verify_token(
    State(state): State<AppState>,
    RequireAdmin(admin_id): RequireAdmin,
) -> Result<Json<VerifyResponse>> {
    let admin = AdminRepository::new(state.pool())
        .get_by_id(admin_id)
        .await?
        .ok_or(AuthError::AccountNotFound)?;

    Ok(Json(VerifyResponse {
        message: "Token is valid",
        admin: AdminIdentity::from(&admin),
    }))
}

// =============================================================================
// Sellers
// =============================================================================

#[derive(Debug, Serialize)]
pub struct SellersResponse {
    pub sellers: Vec<Seller>,
}

#[derive(Debug, Serialize)]
pub struct SellerResponse {
    pub seller: Seller,
}

fn not_found_as(message: &'static str) -> impl Fn(RepositoryError) -> AppError {
    move |e| match e {
        RepositoryError::NotFound => AppError::NotFound(message.to_string()),
        other => other.into(),
    }
}

/// GET /api/admin/auth/sellers
async fn sellers(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<SellersResponse>> {
    let sellers = SellerRepository::new(state.pool()).list().await?;
    Ok(Json(SellersResponse { sellers }))
}

fn profile_fields(update: AdminSellerUpdate) -> Result<SellerUpdate> {
    let email = clean(update.email)
        .map(|e| Email::parse(&e))
        .transpose()
        .map_err(AuthError::from)?;
    Ok(SellerUpdate {
        name: clean(update.name),
        shop_name: clean(update.shop_name),
        email,
        address: clean(update.address),
        ..SellerUpdate::default()
    })
}

/// PUT /api/admin/auth/sellers/{id}
///
/// Profile fields and the enabled/disabled status can be changed together.
async fn update_seller(
    State(state): State<AppState>,
    RequireAdmin(admin_id): RequireAdmin,
    Path(id): Path<SellerId>,
    Json(update): Json<AdminSellerUpdate>,
) -> Result<Json<SellerResponse>> {
    let status = update.status;
    let fields = profile_fields(update)?;

    let repo = SellerRepository::new(state.pool());
    let mut seller = repo
        .update(id, &fields)
        .await
        .map_err(not_found_as("Seller not found"))?;
    if let Some(status) = status
        && status != seller.status
    {
        seller = repo
            .set_status(id, status)
            .await
            .map_err(not_found_as("Seller not found"))?;
        tracing::info!(
            seller_id = %id,
            status = ?status,
            by = %admin_id,
            "Seller status changed"
        );
    }
    Ok(Json(SellerResponse { seller }))
}

/// DELETE /api/admin/auth/sellers/{id}
async fn delete_seller(
    State(state): State<AppState>,
    RequireAdmin(admin_id): RequireAdmin,
    Path(id): Path<SellerId>,
) -> Result<Json<Message>> {
    if !SellerRepository::new(state.pool()).delete(id).await? {
        return Err(AppError::NotFound("Seller not found".to_string()));
    }
    tracing::info!(seller_id = %id, by = %admin_id, "Seller deleted");
    Ok(Json(Message::new("Seller deleted successfully")))
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ProductsResponse {
    pub products: Vec<Product>,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub product: Product,
}

/// GET /api/admin/auth/products
async fn products(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<ProductsResponse>> {
    let products = ProductRepository::new(state.pool()).list_all().await?;
    Ok(Json(ProductsResponse { products }))
}

/// PUT /api/admin/auth/products/{id}
///
/// Moderation only: `status` and `approval`.
async fn update_product(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(update): Json<AdminProductUpdate>,
) -> Result<Json<ProductResponse>> {
    if update.status.is_none() && update.approval.is_none() {
        return Err(AppError::BadRequest(
            "status or approval is required".to_string(),
        ));
    }
    let product = ProductRepository::new(state.pool())
        .moderate(id, &update)
        .await
        .map_err(not_found_as("Product not found"))?;
    Ok(Json(ProductResponse { product }))
}

/// DELETE /api/admin/auth/products/{id}
async fn delete_product(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Message>> {
    let product = ProductRepository::new(state.pool())
        .delete(id, None)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    for url in &product.images {
        state.uploads().remove(url).await;
    }
    Ok(Json(Message::new("Product deleted successfully")))
}

// =============================================================================
// Users
// =============================================================================

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: User,
}

/// GET /api/admin/auth/users
async fn users(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<UsersResponse>> {
    let users = UserRepository::new(state.pool()).list().await?;
    Ok(Json(UsersResponse { users }))
}

/// PUT /api/admin/auth/users/{id}
async fn update_user(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<UserId>,
    Json(update): Json<AdminUserUpdate>,
) -> Result<Json<UserResponse>> {
    let phone_number = clean(update.phone_number)
        .map(|p| PhoneNumber::parse(&p))
        .transpose()
        .map_err(AuthError::from)?;
    let profile = update.profile.validate().map_err(AppError::BadRequest)?;

    let repo = UserRepository::new(state.pool());
    let mut user = repo
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    user.apply(profile);
    if let Some(phone_number) = phone_number {
        user.phone_number = phone_number;
    }

    let user = repo.save_profile(&user).await?;
    Ok(Json(UserResponse { user }))
}

/// DELETE /api/admin/auth/users/{id}
async fn delete_user(
    State(state): State<AppState>,
    RequireAdmin(admin_id): RequireAdmin,
    Path(id): Path<UserId>,
) -> Result<Json<Message>> {
    if !UserRepository::new(state.pool()).delete(id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    tracing::info!(user_id = %id, by = %admin_id, "User deleted");
    Ok(Json(Message::new("User deleted successfully")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::routes::tests::{send, test_state, token_for};

    #[test]
    fn test_identity_shape() {
        let now = Utc::now();
        let admin = Admin {
            id: AdminId::new(1),
            phone_number: PhoneNumber::parse("+919800000001").unwrap(),
            email: None,
            name: "Admin".to_owned(),
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(AdminIdentity::from(&admin)).unwrap();
        assert_eq!(
            json,
            json!({"id": 1, "phoneNumber": "+919800000001", "role": "admin"})
        );
    }

    #[test]
    fn test_profile_fields_normalizes_input() {
        let update: AdminSellerUpdate = serde_json::from_value(json!({
            "shopName": "  Indigo Looms ",
            "email": "Hello@IndigoLooms.in",
            "status": "disabled"
        }))
        .unwrap();
        let fields = profile_fields(update).unwrap();
        assert_eq!(fields.shop_name.as_deref(), Some("Indigo Looms"));
        assert_eq!(fields.email.unwrap().as_str(), "hello@indigolooms.in");
        assert!(fields.payment_details.is_none());
    }

    #[tokio::test]
    async fn test_admin_create_requires_admin_token() {
        let (status, _) = send(
            test_state(),
            "POST",
            "/api/admin/auth/admin/create",
            None,
            Some(json!({"phoneNumber": "+919800000002", "password": "long-enough"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_moderation_requires_a_change() {
        let state = test_state();
        let token = token_for(&state, Role::Admin, 1);
        let (status, body) = send(
            state,
            "PUT",
            "/api/admin/auth/products/8",
            Some(&token),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "status or approval is required");
    }
}
