//! Shopper routes: account, catalogue, wishlist, cart, saved-for-later and
//! orders.
//!
//! Every list mutation loads the whole list, applies the rule from
//! `haat_core::cart` and writes the list back in one transaction.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use haat_core::cart::{LineKey, LineList, LineRequest, ListKind, Toggle, move_product};
use haat_core::{OrderId, ProductId, Role, UserId};

use super::{LineView, line_views};
use crate::db::{OrderRepository, ProductRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::middleware::{RequireUser, auth_rate_limiter};
use crate::models::order::views;
use crate::models::{Message, OrderView, Product, ProductQuery, ProfileUpdate, User};
use crate::services::auth::{AuthError, AuthService, Credentials, UserSignup};
use crate::services::checkout::{CheckoutRequest, CheckoutService};
use crate::state::AppState;

/// Create the shopper routes router.
pub fn routes() -> Router<AppState> {
    let account = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .layer(auth_rate_limiter());

    Router::new()
        .merge(account)
        .route("/profile", get(profile).put(update_profile))
        .route("/products", get(products))
        .route("/products/{id}", get(product))
        .route("/wishlist", get(wishlist))
        .route("/wishlist/{product_id}", put(toggle_wishlist))
        .route("/cart", get(cart).post(update_cart).delete(clear_cart))
        .route("/cart/{product_id}", delete(remove_from_cart))
        .route("/cart/{product_id}/save-for-later", post(save_for_later))
        .route("/saved", get(saved).post(update_saved))
        .route("/saved/{product_id}", delete(remove_saved))
        .route("/saved/{product_id}/move-to-cart", post(move_to_cart))
        .route("/orders", get(orders).post(checkout))
        .route("/orders/{id}", get(order))
}

// =============================================================================
// Account
// =============================================================================

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub message: &'static str,
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: User,
}

fn session(state: &AppState, message: &'static str, user: User) -> Result<SessionResponse> {
    let token = state
        .tokens()
        .issue(Role::User, user.id.as_i32(), &user.phone_number, Utc::now())?;
    Ok(SessionResponse {
        message,
        token,
        user,
    })
}

/// POST /api/user/auth/register
async fn register(
    State(state): State<AppState>,
    Json(signup): Json<UserSignup>,
) -> Result<(StatusCode, Json<SessionResponse>)> {
    let user = AuthService::new(state.pool()).register_user(signup).await?;
    let body = session(&state, "User registered successfully", user)?;
    Ok((StatusCode::CREATED, Json(body)))
}

/// POST /api/user/auth/login
async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<SessionResponse>> {
    let user = AuthService::new(state.pool()).login_user(&credentials).await?;
    Ok(Json(session(&state, "Logged in successfully", user)?))
}

async fn load_user(state: &AppState, id: UserId) -> Result<User> {
    let user = UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or(AuthError::AccountNotFound)?;
    Ok(user)
}

/// GET /api/user/auth/profile
async fn profile(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
) -> Result<Json<UserResponse>> {
    let user = load_user(&state, user_id).await?;
    Ok(Json(UserResponse { user }))
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub message: &'static str,
    pub user: User,
}

/// PUT /api/user/auth/profile
async fn update_profile(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>> {
    let update = update.validate().map_err(AppError::BadRequest)?;
    let mut user = load_user(&state, user_id).await?;
    user.apply(update);
    let user = UserRepository::new(state.pool()).save_profile(&user).await?;

    Ok(Json(ProfileResponse {
        message: "Profile updated successfully",
        user,
    }))
}

// =============================================================================
// Catalogue
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ProductsResponse {
    pub products: Vec<Product>,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub product: Product,
}

/// GET /api/user/auth/products
async fn products(
    State(state): State<AppState>,
    RequireUser(_): RequireUser,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ProductsResponse>> {
    let products = ProductRepository::new(state.pool()).list_listed(&query).await?;
    Ok(Json(ProductsResponse { products }))
}

/// A product a shopper may see: it exists, is enabled and approved.
async fn listed_product(state: &AppState, id: ProductId) -> Result<Product> {
    ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .filter(Product::is_listed)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

/// GET /api/user/auth/products/{id}
async fn product(
    State(state): State<AppState>,
    RequireUser(_): RequireUser,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductResponse>> {
    let product = listed_product(&state, id).await?;
    Ok(Json(ProductResponse { product }))
}

// =============================================================================
// Wishlist
// =============================================================================

#[derive(Debug, Serialize)]
pub struct WishlistResponse {
    pub wishlist: Vec<Product>,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub message: &'static str,
    pub action: Toggle,
    pub wishlist: Vec<ProductId>,
}

/// GET /api/user/auth/wishlist
async fn wishlist(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
) -> Result<Json<WishlistResponse>> {
    let list = UserRepository::new(state.pool()).load_wishlist(user_id).await?;
    let ids: Vec<ProductId> = list.entries().iter().map(|e| e.product_id).collect();
    let mut products = ProductRepository::new(state.pool()).get_many(&ids).await?;
    products.sort_by_key(|p| ids.iter().position(|id| *id == p.id));

    Ok(Json(WishlistResponse { wishlist: products }))
}

/// PUT /api/user/auth/wishlist/{product_id}
async fn toggle_wishlist(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Path(product_id): Path<ProductId>,
) -> Result<Json<ToggleResponse>> {
    let repo = UserRepository::new(state.pool());
    let mut list = repo.load_wishlist(user_id).await?;

    // Removing a delisted product is still allowed.
    if !list.contains(product_id) {
        listed_product(&state, product_id).await?;
    }

    let action = list.toggle(product_id, Utc::now());
    repo.save_wishlist(user_id, &list).await?;

    let message = match action {
        Toggle::Added => "Added to wishlist",
        Toggle::Removed => "Removed from wishlist",
    };
    Ok(Json(ToggleResponse {
        message,
        action,
        wishlist: list.entries().iter().map(|e| e.product_id).collect(),
    }))
}

// =============================================================================
// Cart and saved-for-later
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub cart: Vec<LineView>,
    pub total_quantity: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedResponse {
    pub saved_for_later: Vec<LineView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUpdateResponse {
    pub message: &'static str,
    pub items: LineList,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveResponse {
    pub message: &'static str,
    pub cart: LineList,
    pub saved_for_later: LineList,
}

/// Optional variant selector for removals. Without both parts every variant
/// of the product is removed.
#[derive(Debug, Default, Deserialize)]
pub struct VariantQuery {
    pub size: Option<String>,
    pub color: Option<String>,
}

impl VariantQuery {
    fn key_for(self, product_id: ProductId) -> Option<LineKey> {
        let size = self.size.filter(|s| !s.trim().is_empty())?;
        let color = self.color.filter(|c| !c.trim().is_empty())?;
        Some(LineKey {
            product_id,
            size: size.trim().to_owned(),
            color: color.trim().to_owned(),
        })
    }
}

fn remove_variant(list: &mut LineList, product_id: ProductId, variant: VariantQuery) -> usize {
    match variant.key_for(product_id) {
        Some(key) => usize::from(list.remove(&key).is_some()),
        None => list.remove_product(product_id),
    }
}

/// GET /api/user/auth/cart
async fn cart(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
) -> Result<Json<CartResponse>> {
    let list = UserRepository::new(state.pool())
        .load_lines(user_id, ListKind::Cart)
        .await?;
    let total_quantity = list.total_quantity();
    let cart = line_views(&state, list).await?;
    Ok(Json(CartResponse {
        cart,
        total_quantity,
    }))
}

async fn upsert_line(
    state: &AppState,
    user_id: UserId,
    kind: ListKind,
    request: LineRequest,
) -> Result<LineList> {
    let (key, quantity) = request.validate(kind)?;
    listed_product(state, key.product_id).await?;

    let repo = UserRepository::new(state.pool());
    let mut list = repo.load_lines(user_id, kind).await?;
    list.upsert(key, quantity, Utc::now());
    repo.save_lines(user_id, kind, &list).await?;
    Ok(list)
}

/// POST /api/user/auth/cart
///
/// Adds a line or overwrites the quantity of an existing
/// (product, size, color) line.
async fn update_cart(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Json(request): Json<LineRequest>,
) -> Result<Json<ListUpdateResponse>> {
    let items = upsert_line(&state, user_id, ListKind::Cart, request).await?;
    Ok(Json(ListUpdateResponse {
        message: "Cart updated successfully",
        items,
    }))
}

/// DELETE /api/user/auth/cart
async fn clear_cart(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
) -> Result<Json<Message>> {
    UserRepository::new(state.pool())
        .save_lines(user_id, ListKind::Cart, &LineList::new())
        .await?;
    Ok(Json(Message::new("Cart cleared successfully")))
}

async fn remove_line(
    state: &AppState,
    user_id: UserId,
    kind: ListKind,
    product_id: ProductId,
    variant: VariantQuery,
) -> Result<LineList> {
    let repo = UserRepository::new(state.pool());
    let mut list = repo.load_lines(user_id, kind).await?;
    if remove_variant(&mut list, product_id, variant) == 0 {
        let message = match kind {
            ListKind::Cart => "Item not found in cart",
            ListKind::SavedForLater => "Item not found in saved for later",
        };
        return Err(AppError::NotFound(message.to_string()));
    }
    repo.save_lines(user_id, kind, &list).await?;
    Ok(list)
}

/// DELETE /api/user/auth/cart/{product_id}?size=&color=
async fn remove_from_cart(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Path(product_id): Path<ProductId>,
    Query(variant): Query<VariantQuery>,
) -> Result<Json<ListUpdateResponse>> {
    let items = remove_line(&state, user_id, ListKind::Cart, product_id, variant).await?;
    Ok(Json(ListUpdateResponse {
        message: "Item removed from cart",
        items,
    }))
}

async fn move_between(
    state: &AppState,
    user_id: UserId,
    product_id: ProductId,
    from: ListKind,
) -> Result<MoveResponse> {
    let repo = UserRepository::new(state.pool());
    let mut cart = repo.load_lines(user_id, ListKind::Cart).await?;
    let mut saved = repo.load_lines(user_id, ListKind::SavedForLater).await?;
    let now = Utc::now();

    let (moved, message) = match from {
        ListKind::Cart => (
            move_product(&mut cart, &mut saved, product_id, now),
            "Item saved for later",
        ),
        ListKind::SavedForLater => (
            move_product(&mut saved, &mut cart, product_id, now),
            "Item moved to cart",
        ),
    };
    if moved == 0 {
        return Err(AppError::NotFound("Item not found".to_string()));
    }

    repo.save_cart_and_saved(user_id, &cart, &saved).await?;
    Ok(MoveResponse {
        message,
        cart,
        saved_for_later: saved,
    })
}

/// POST /api/user/auth/cart/{product_id}/save-for-later
async fn save_for_later(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Path(product_id): Path<ProductId>,
) -> Result<Json<MoveResponse>> {
    Ok(Json(
        move_between(&state, user_id, product_id, ListKind::Cart).await?,
    ))
}

/// GET /api/user/auth/saved
async fn saved(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
) -> Result<Json<SavedResponse>> {
    let list = UserRepository::new(state.pool())
        .load_lines(user_id, ListKind::SavedForLater)
        .await?;
    Ok(Json(SavedResponse {
        saved_for_later: line_views(&state, list).await?,
    }))
}

/// POST /api/user/auth/saved
async fn update_saved(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Json(request): Json<LineRequest>,
) -> Result<Json<ListUpdateResponse>> {
    let items = upsert_line(&state, user_id, ListKind::SavedForLater, request).await?;
    Ok(Json(ListUpdateResponse {
        message: "Saved for later updated successfully",
        items,
    }))
}

/// DELETE /api/user/auth/saved/{product_id}?size=&color=
async fn remove_saved(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Path(product_id): Path<ProductId>,
    Query(variant): Query<VariantQuery>,
) -> Result<Json<ListUpdateResponse>> {
    let items = remove_line(&state, user_id, ListKind::SavedForLater, product_id, variant).await?;
    Ok(Json(ListUpdateResponse {
        message: "Item removed from saved for later",
        items,
    }))
}

/// POST /api/user/auth/saved/{product_id}/move-to-cart
async fn move_to_cart(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Path(product_id): Path<ProductId>,
) -> Result<Json<MoveResponse>> {
    Ok(Json(
        move_between(&state, user_id, product_id, ListKind::SavedForLater).await?,
    ))
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub orders: Vec<OrderView>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order: OrderView,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub message: &'static str,
    pub orders: Vec<OrderView>,
}

/// GET /api/user/auth/orders
async fn orders(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
) -> Result<Json<OrdersResponse>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user_id)
        .await?;
    Ok(Json(OrdersResponse {
        orders: views(orders),
    }))
}

/// GET /api/user/auth/orders/{id}
async fn order(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderResponse>> {
    let order = OrderRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .filter(|o| o.user_id == user_id)
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    Ok(Json(OrderResponse {
        order: order.into(),
    }))
}

/// POST /api/user/auth/orders
///
/// Checks out the whole cart: one order per seller.
async fn checkout(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>)> {
    let placed = CheckoutService::new(state.pool(), state.config().shipping_fee)
        .place_orders(user_id, &request)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            message: "Order placed successfully",
            orders: views(placed),
        }),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use haat_core::Role;

    use super::*;
    use crate::routes::tests::{send, test_state, token_for};

    fn list(lines: &[(i32, &str, &str, i32)]) -> LineList {
        let mut list = LineList::new();
        for (id, size, color, qty) in lines {
            list.upsert(
                LineKey {
                    product_id: ProductId::new(*id),
                    size: (*size).to_owned(),
                    color: (*color).to_owned(),
                },
                *qty,
                Utc::now(),
            );
        }
        list
    }

    #[test]
    fn test_remove_variant_with_key_removes_one_line() {
        let mut cart = list(&[(1, "M", "Red", 1), (1, "L", "Red", 2), (2, "S", "Blue", 1)]);
        let variant = VariantQuery {
            size: Some("L".to_owned()),
            color: Some("Red".to_owned()),
        };
        assert_eq!(remove_variant(&mut cart, ProductId::new(1), variant), 1);
        assert_eq!(cart.len(), 2);
    }

    #[test]
    fn test_remove_variant_without_key_removes_all_variants() {
        let mut cart = list(&[(1, "M", "Red", 1), (1, "L", "Red", 2), (2, "S", "Blue", 1)]);
        let variant = VariantQuery {
            size: Some("L".to_owned()),
            color: None,
        };
        assert_eq!(remove_variant(&mut cart, ProductId::new(1), variant), 2);
        assert_eq!(cart.len(), 1);
        assert!(!cart.contains_product(ProductId::new(1)));
    }

    #[tokio::test]
    async fn test_cart_update_rejects_missing_fields() {
        let state = test_state();
        let token = token_for(&state, Role::User, 9);
        let (status, body) = send(
            state,
            "POST",
            "/api/user/auth/cart",
            Some(&token),
            Some(json!({"productId": 3, "quantity": 2, "size": "M"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "Missing required cart fields: productId, quantity, size, or color"
        );
    }

    #[tokio::test]
    async fn test_profile_update_rejects_invalid_email() {
        let state = test_state();
        let token = token_for(&state, Role::User, 9);
        let (status, _) = send(
            state,
            "PUT",
            "/api/user/auth/profile",
            Some(&token),
            Some(json!({"email": "not-an-email"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
