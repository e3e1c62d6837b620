//! Turning a cart into orders.
//!
//! A cart can hold products from several sellers; checkout opens one order
//! per seller. Each line is snapshotted from the current listing, split into
//! online and COD parts, and the resulting orders are written together with
//! the stock decrements and the emptied cart in one transaction.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use haat_core::cart::{CartLine, LineList, ListKind};
use haat_core::order::{CustomerDetails, NewOrder, Order, OrderError, OrderItem};
use haat_core::{ProductId, SellerId, UserId};

use crate::db::{ProductRepository, RepositoryError, UserRepository, orders, products, users};
use crate::models::{Address, Product, User, clean};

/// Errors that stop a checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("A delivery address is required")]
    MissingAddress,

    #[error("Product {0} is no longer available")]
    Unavailable(ProductId),

    #[error("{name} is not offered in size {size} and color {color}")]
    UnknownVariant {
        name: String,
        size: String,
        color: String,
    },

    #[error("Only {available} left in stock for {name}")]
    OutOfStock { name: String, available: i32 },

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Checkout form.
///
/// The delivery address is either given inline or picked from the saved
/// addresses by index; without either the first saved address is used.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub address: Option<Address>,
    pub address_index: Option<usize>,
    pub payment_id: Option<String>,
}

/// A fresh human-facing order number, e.g. `ORD-1A2B3C4D5E`.
#[must_use]
pub fn new_order_number() -> String {
    let hex = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("ORD-{}", hex.get(..10).unwrap_or(&hex))
}

/// Pick the delivery address for a checkout.
fn delivery_address(user: &User, request: &CheckoutRequest) -> Result<String, CheckoutError> {
    let address = match (&request.address, request.address_index) {
        (Some(address), _) => Some(address),
        (None, Some(index)) => user.addresses.get(index),
        (None, None) => user.addresses.first(),
    };
    address
        .map(Address::one_line)
        .filter(|a| !a.trim().is_empty())
        .ok_or(CheckoutError::MissingAddress)
}

fn snapshot(product: &Product, line: &CartLine) -> Result<OrderItem, CheckoutError> {
    let offers = |options: &[String], wanted: &str| {
        options.is_empty() || options.iter().any(|o| o.eq_ignore_ascii_case(wanted))
    };
    if !offers(&product.sizes, &line.key.size) || !offers(&product.colors, &line.key.color) {
        return Err(CheckoutError::UnknownVariant {
            name: product.name.clone(),
            size: line.key.size.clone(),
            color: line.key.color.clone(),
        });
    }

    let split = product.split_for(line.quantity)?;
    Ok(OrderItem {
        product_id: product.id,
        name: product.name.clone(),
        price: product.price,
        quantity: line.quantity,
        size: line.key.size.clone(),
        color: line.key.color.clone(),
        material: product.material.clone(),
        gender: product.gender.clone(),
        brand: product.brand.clone(),
        fit: product.fit.clone(),
        care_instructions: product.care_instructions.clone(),
        dimensions: product.dimensions.clone(),
        weight: product.weight,
        image: product.images.first().cloned(),
        is_returnable: product.is_returnable,
        return_period: product.return_period,
        online_amount: split.online_amount,
        cod_amount: split.cod_amount,
    })
}

/// Build one order per seller from cart lines.
///
/// Pure: nothing is persisted. Sellers are visited in id order so the result
/// is deterministic.
///
/// # Errors
///
/// Returns [`CheckoutError`] for an empty cart, a missing address, a product
/// that is gone or unlisted, an unknown size or color, or short stock.
pub fn build_orders(
    user: &User,
    cart: &LineList,
    products: &HashMap<ProductId, Product>,
    request: &CheckoutRequest,
    shipping: Decimal,
    now: DateTime<Utc>,
) -> Result<Vec<Order>, CheckoutError> {
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    let address = delivery_address(user, request)?;

    let mut wanted: HashMap<ProductId, i32> = HashMap::new();
    let mut by_seller: BTreeMap<SellerId, Vec<OrderItem>> = BTreeMap::new();

    for line in cart.lines() {
        let product = products
            .get(&line.key.product_id)
            .filter(|p| p.is_listed())
            .ok_or(CheckoutError::Unavailable(line.key.product_id))?;

        let total = wanted.entry(product.id).or_default();
        *total = total.saturating_add(line.quantity);
        if *total > product.stock {
            return Err(CheckoutError::OutOfStock {
                name: product.name.clone(),
                available: product.stock,
            });
        }

        by_seller
            .entry(product.seller_id)
            .or_default()
            .push(snapshot(product, line)?);
    }

    let customer = CustomerDetails {
        name: user.display_name(),
        email: user.email.clone(),
        phone_number: user.phone_number.clone(),
        address,
    };
    let payment_id = clean(request.payment_id.clone());

    by_seller
        .into_iter()
        .map(|(seller_id, items)| {
            Order::open(
                NewOrder {
                    order_number: new_order_number(),
                    user_id: user.id,
                    seller_id,
                    customer: customer.clone(),
                    items,
                    shipping,
                    payment_id: payment_id.clone(),
                },
                now,
            )
            .map_err(CheckoutError::from)
        })
        .collect()
}

/// Checkout against the database.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    shipping: Decimal,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, shipping: Decimal) -> Self {
        Self { pool, shipping }
    }

    /// Place orders for everything in a shopper's cart.
    ///
    /// Orders, stock decrements and the emptied cart are committed together;
    /// if stock ran out in the meantime nothing is written.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError`] as described on [`build_orders`], or a
    /// repository error.
    pub async fn place_orders(
        &self,
        user_id: UserId,
        request: &CheckoutRequest,
    ) -> Result<Vec<Order>, CheckoutError> {
        let user_repo = UserRepository::new(self.pool);
        let user = user_repo
            .get_by_id(user_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        let cart = user_repo.load_lines(user_id, ListKind::Cart).await?;

        let ids: Vec<ProductId> = cart.lines().iter().map(|l| l.key.product_id).collect();
        let catalog: HashMap<ProductId, Product> = ProductRepository::new(self.pool)
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let now = Utc::now();
        let mut placed = build_orders(&user, &cart, &catalog, request, self.shipping, now)?;

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        for line in cart.lines() {
            if !products::take_stock(&mut *tx, line.key.product_id, line.quantity).await? {
                let product = catalog.get(&line.key.product_id);
                return Err(CheckoutError::OutOfStock {
                    name: product.map(|p| p.name.clone()).unwrap_or_default(),
                    available: product.map_or(0, |p| p.stock),
                });
            }
        }
        for order in &mut placed {
            orders::insert(&mut *tx, order, now).await?;
        }
        users::write_lines(&mut *tx, user_id, ListKind::Cart, &LineList::new()).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        tracing::info!(
            user_id = %user_id,
            orders = placed.len(),
            "Checkout completed"
        );
        Ok(placed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use haat_core::cart::LineKey;
    use haat_core::order::Dimensions;
    use haat_core::{ApprovalStatus, PaymentMethod, PhoneNumber, ProductStatus, Role};

    use super::*;
    use crate::models::{PaymentDetails, Preferences};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn user(addresses: Vec<Address>) -> User {
        let now = Utc::now();
        User {
            id: UserId::new(1),
            phone_number: PhoneNumber::parse("+919876543210").unwrap(),
            email: None,
            first_name: Some("Asha".to_owned()),
            last_name: Some("Rao".to_owned()),
            date_of_birth: None,
            role: Role::User,
            profile_picture: None,
            bio: None,
            preferences: Preferences::default(),
            recent_searches: Vec::new(),
            addresses,
            payment_details: PaymentDetails::default(),
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn address() -> Address {
        Address {
            street: Some("12 MG Road".to_owned()),
            city: Some("Bengaluru".to_owned()),
            state: Some("Karnataka".to_owned()),
            postal_code: Some("560001".to_owned()),
            country: "India".to_owned(),
        }
    }

    fn product(id: i32, seller: i32, price: &str, cod: bool, pct: i32) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(id),
            seller_id: SellerId::new(seller),
            category_id: None,
            name: format!("Product {id}"),
            description: None,
            price: dec(price),
            stock: 5,
            sizes: vec!["M".to_owned(), "L".to_owned()],
            colors: vec!["Indigo".to_owned()],
            material: None,
            gender: None,
            brand: None,
            fit: None,
            care_instructions: None,
            is_returnable: true,
            return_period: 7,
            dimensions: Dimensions::default(),
            weight: None,
            images: vec!["/uploads/product-1.jpg".to_owned()],
            cod_available: cod,
            online_payment_percentage: pct,
            status: ProductStatus::Enabled,
            approval: ApprovalStatus::Approved,
            created_at: now,
            updated_at: now,
            seller_enabled: true,
        }
    }

    fn cart(lines: &[(i32, &str, i32)]) -> LineList {
        let mut list = LineList::new();
        for (product, size, quantity) in lines {
            list.upsert(
                LineKey {
                    product_id: ProductId::new(*product),
                    size: (*size).to_owned(),
                    color: "Indigo".to_owned(),
                },
                *quantity,
                Utc::now(),
            );
        }
        list
    }

    fn catalog(products: Vec<Product>) -> HashMap<ProductId, Product> {
        products.into_iter().map(|p| (p.id, p)).collect()
    }

    #[test]
    fn test_one_order_per_seller() {
        let catalog = catalog(vec![
            product(1, 10, "500", false, 100),
            product(2, 20, "300", true, 0),
            product(3, 10, "200", true, 50),
        ]);
        let cart = cart(&[(1, "M", 1), (2, "L", 2), (3, "M", 1)]);

        let orders = build_orders(
            &user(vec![address()]),
            &cart,
            &catalog,
            &CheckoutRequest::default(),
            dec("40"),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(orders.len(), 2);
        let first = orders.first().unwrap();
        assert_eq!(first.seller_id, SellerId::new(10));
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.online_amount, dec("600"));
        assert_eq!(first.cod_amount, dec("100"));
        assert_eq!(first.total, dec("740"));
        assert_eq!(first.payment_method, PaymentMethod::SplitPayment);

        let second = orders.get(1).unwrap();
        assert_eq!(second.payment_method, PaymentMethod::CashOnDelivery);
        assert_eq!(second.total, dec("640"));
        assert_eq!(second.customer.name, "Asha Rao");
        assert!(second.customer.address.contains("Bengaluru"));
        assert_ne!(first.order_number, second.order_number);
    }

    #[test]
    fn test_empty_cart_rejected() {
        let result = build_orders(
            &user(vec![address()]),
            &LineList::new(),
            &HashMap::new(),
            &CheckoutRequest::default(),
            Decimal::ZERO,
            Utc::now(),
        );
        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
    }

    #[test]
    fn test_address_required() {
        let result = build_orders(
            &user(Vec::new()),
            &cart(&[(1, "M", 1)]),
            &catalog(vec![product(1, 10, "500", false, 100)]),
            &CheckoutRequest::default(),
            Decimal::ZERO,
            Utc::now(),
        );
        assert!(matches!(result, Err(CheckoutError::MissingAddress)));
    }

    #[test]
    fn test_stock_counted_across_variants() {
        let result = build_orders(
            &user(vec![address()]),
            &cart(&[(1, "M", 3), (1, "L", 3)]),
            &catalog(vec![product(1, 10, "500", false, 100)]),
            &CheckoutRequest::default(),
            Decimal::ZERO,
            Utc::now(),
        );
        assert!(matches!(
            result,
            Err(CheckoutError::OutOfStock { available: 5, .. })
        ));
    }

    #[test]
    fn test_unlisted_product_unavailable() {
        let mut hidden = product(1, 10, "500", false, 100);
        hidden.approval = ApprovalStatus::Suspended;
        let result = build_orders(
            &user(vec![address()]),
            &cart(&[(1, "M", 1)]),
            &catalog(vec![hidden]),
            &CheckoutRequest::default(),
            Decimal::ZERO,
            Utc::now(),
        );
        assert!(matches!(result, Err(CheckoutError::Unavailable(_))));
    }

    #[test]
    fn test_disabled_seller_product_unavailable() {
        let mut orphaned = product(1, 10, "500", false, 100);
        orphaned.seller_enabled = false;
        let result = build_orders(
            &user(vec![address()]),
            &cart(&[(1, "M", 1)]),
            &catalog(vec![orphaned]),
            &CheckoutRequest::default(),
            Decimal::ZERO,
            Utc::now(),
        );
        assert!(matches!(
            result,
            Err(CheckoutError::Unavailable(id)) if id == ProductId::new(1)
        ));
    }

    #[test]
    fn test_unknown_size_rejected() {
        let result = build_orders(
            &user(vec![address()]),
            &cart(&[(1, "XXL", 1)]),
            &catalog(vec![product(1, 10, "500", false, 100)]),
            &CheckoutRequest::default(),
            Decimal::ZERO,
            Utc::now(),
        );
        assert!(matches!(result, Err(CheckoutError::UnknownVariant { .. })));
    }

    #[test]
    fn test_order_number_shape() {
        let number = new_order_number();
        assert!(number.starts_with("ORD-"));
        assert_eq!(number.len(), 14);
    }
}
