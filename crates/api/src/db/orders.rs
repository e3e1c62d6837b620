//! Order repository.
//!
//! Orders are stored as a `shop.order` row plus `shop.order_item` lines and an
//! append-only `shop.order_status_history`. Every write goes through
//! [`Order::prepare_for_save`], so the stored totals always equal the sum of
//! the line splits plus shipping.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use haat_core::order::{CustomerDetails, Dimensions, Order, OrderItem, SaveReport, StatusChange};
use haat_core::{
    Email, OrderId, OrderStatus, PaymentMethod, PaymentStatus, PhoneNumber, ProductId, SellerId,
    UserId,
};

use super::{RepositoryError, conflict_on_unique};

const ORDER_COLUMNS: &str = r"
    id, order_number, user_id, seller_id, customer_name, customer_email,
    customer_phone, customer_address, total, online_amount, cod_amount, shipping,
    payment_method, payment_status, payment_id, status, created_at, updated_at
";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i32,
    order_number: String,
    user_id: i32,
    seller_id: i32,
    customer_name: String,
    customer_email: Option<String>,
    customer_phone: String,
    customer_address: String,
    total: Decimal,
    online_amount: Decimal,
    cod_amount: Decimal,
    shipping: Decimal,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    payment_id: Option<String>,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    order_id: i32,
    product_id: i32,
    name: String,
    price: Decimal,
    quantity: i32,
    size: String,
    color: String,
    material: Option<String>,
    gender: Option<String>,
    brand: Option<String>,
    fit: Option<String>,
    care_instructions: Option<String>,
    chest: Option<Decimal>,
    length: Option<Decimal>,
    sleeve: Option<Decimal>,
    weight: Option<Decimal>,
    image: Option<String>,
    is_returnable: bool,
    return_period: i32,
    online_amount: Decimal,
    cod_amount: Decimal,
}

impl From<ItemRow> for OrderItem {
    fn from(row: ItemRow) -> Self {
        Self {
            product_id: ProductId::new(row.product_id),
            name: row.name,
            price: row.price,
            quantity: row.quantity,
            size: row.size,
            color: row.color,
            material: row.material,
            gender: row.gender,
            brand: row.brand,
            fit: row.fit,
            care_instructions: row.care_instructions,
            dimensions: Dimensions {
                chest: row.chest,
                length: row.length,
                sleeve: row.sleeve,
            },
            weight: row.weight,
            image: row.image,
            is_returnable: row.is_returnable,
            return_period: row.return_period,
            online_amount: row.online_amount,
            cod_amount: row.cod_amount,
        }
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    order_id: i32,
    status: OrderStatus,
    details: Option<String>,
    changed_at: DateTime<Utc>,
}

impl From<HistoryRow> for StatusChange {
    fn from(row: HistoryRow) -> Self {
        Self {
            status: row.status,
            timestamp: row.changed_at,
            details: row.details,
        }
    }
}

impl OrderRow {
    fn into_order(
        self,
        items: Vec<OrderItem>,
        status_history: Vec<StatusChange>,
    ) -> Result<Order, RepositoryError> {
        let phone_number = PhoneNumber::parse(&self.customer_phone).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid customer phone in database: {e}"))
        })?;
        let email = self
            .customer_email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid customer email in database: {e}"))
            })?;

        Ok(Order {
            id: Some(OrderId::new(self.id)),
            order_number: self.order_number,
            user_id: UserId::new(self.user_id),
            seller_id: SellerId::new(self.seller_id),
            customer: CustomerDetails {
                name: self.customer_name,
                email,
                phone_number,
                address: self.customer_address,
            },
            items,
            total: self.total,
            online_amount: self.online_amount,
            cod_amount: self.cod_amount,
            shipping: self.shipping,
            payment_method: self.payment_method,
            payment_status: self.payment_status,
            payment_id: self.payment_id,
            status: self.status,
            status_history,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Revenue figures for one seller.
///
/// Cancelled and returned orders are excluded from every amount.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RevenueSummary {
    pub total_orders: i64,
    pub total_revenue: Decimal,
    pub online_revenue: Decimal,
    pub cod_revenue: Decimal,
    /// Revenue of delivered orders only.
    pub delivered_revenue: Decimal,
    /// COD still to be collected on orders that are not delivered yet.
    pub pending_cod: Decimal,
}

/// Number of a seller's orders in one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

/// Log a silently corrected total.
fn report_correction(order: &Order, report: &SaveReport) {
    if let Some(correction) = report.total_correction {
        tracing::warn!(
            order_number = %order.order_number,
            stored_total = %correction.stored,
            computed_total = %correction.computed,
            "Order total disagreed with its items; overwritten with recomputed value"
        );
    }
}

async fn write_items(
    conn: &mut PgConnection,
    order_id: OrderId,
    items: &[OrderItem],
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM shop.order_item WHERE order_id = $1")
        .bind(order_id)
        .execute(&mut *conn)
        .await?;

    for (position, item) in (0_i32..).zip(items) {
        sqlx::query(
            r"
            INSERT INTO shop.order_item (
                order_id, position, product_id, name, price, quantity, size, color,
                material, gender, brand, fit, care_instructions, chest, length, sleeve,
                weight, image, is_returnable, return_period, online_amount, cod_amount
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22)
            ",
        )
        .bind(order_id)
        .bind(position)
        .bind(item.product_id)
        .bind(&item.name)
        .bind(item.price)
        .bind(item.quantity)
        .bind(&item.size)
        .bind(&item.color)
        .bind(item.material.as_deref())
        .bind(item.gender.as_deref())
        .bind(item.brand.as_deref())
        .bind(item.fit.as_deref())
        .bind(item.care_instructions.as_deref())
        .bind(item.dimensions.chest)
        .bind(item.dimensions.length)
        .bind(item.dimensions.sleeve)
        .bind(item.weight)
        .bind(item.image.as_deref())
        .bind(item.is_returnable)
        .bind(item.return_period)
        .bind(item.online_amount)
        .bind(item.cod_amount)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Append history entries not yet stored.
async fn append_history(
    conn: &mut PgConnection,
    order_id: OrderId,
    history: &[StatusChange],
) -> Result<(), RepositoryError> {
    let stored: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM shop.order_status_history WHERE order_id = $1")
            .bind(order_id)
            .fetch_one(&mut *conn)
            .await?;
    let stored = usize::try_from(stored).unwrap_or(0);

    for change in history.iter().skip(stored) {
        sqlx::query(
            r"
            INSERT INTO shop.order_status_history (order_id, status, details, changed_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(order_id)
        .bind(change.status)
        .bind(change.details.as_deref())
        .bind(change.timestamp)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Insert a new order on an open connection and set its id.
///
/// Checkout calls this inside the transaction that also takes stock and
/// clears the cart.
pub(crate) async fn insert(
    conn: &mut PgConnection,
    order: &mut Order,
    now: DateTime<Utc>,
) -> Result<SaveReport, RepositoryError> {
    let report = order.prepare_for_save(now, None);
    report_correction(order, &report);

    let id: i32 = sqlx::query_scalar(
        r"
        INSERT INTO shop.order (
            order_number, user_id, seller_id, customer_name, customer_email,
            customer_phone, customer_address, total, online_amount, cod_amount,
            shipping, payment_method, payment_status, payment_id, status,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        RETURNING id
        ",
    )
    .bind(&order.order_number)
    .bind(order.user_id)
    .bind(order.seller_id)
    .bind(&order.customer.name)
    .bind(order.customer.email.as_ref())
    .bind(&order.customer.phone_number)
    .bind(&order.customer.address)
    .bind(order.total)
    .bind(order.online_amount)
    .bind(order.cod_amount)
    .bind(order.shipping)
    .bind(order.payment_method)
    .bind(order.payment_status)
    .bind(order.payment_id.as_deref())
    .bind(order.status)
    .bind(order.created_at)
    .bind(order.updated_at)
    .fetch_one(&mut *conn)
    .await
    .map_err(conflict_on_unique("order number already exists"))?;

    let order_id = OrderId::new(id);
    write_items(conn, order_id, &order.items).await?;
    append_history(conn, order_id, &order.status_history).await?;
    order.id = Some(order_id);

    Ok(report)
}

/// Repository for orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Persist an order, inserting it when it has no id yet.
    ///
    /// Derived fields are refreshed first: a status change appends one history
    /// entry (with `note` as its details) and the totals are recomputed from
    /// the items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if an existing order was deleted
    /// and `RepositoryError::Conflict` for a duplicate order number.
    pub async fn save(
        &self,
        order: &mut Order,
        note: Option<&str>,
    ) -> Result<SaveReport, RepositoryError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let Some(order_id) = order.id else {
            let report = insert(&mut *tx, order, now).await?;
            tx.commit().await?;
            return Ok(report);
        };

        let report = order.prepare_for_save(now, note);
        report_correction(order, &report);

        let updated = sqlx::query(
            r"
            UPDATE shop.order SET
                customer_name = $2, customer_email = $3, customer_phone = $4,
                customer_address = $5, total = $6, online_amount = $7, cod_amount = $8,
                shipping = $9, payment_method = $10, payment_status = $11,
                payment_id = $12, status = $13, updated_at = $14
            WHERE id = $1
            ",
        )
        .bind(order_id)
        .bind(&order.customer.name)
        .bind(order.customer.email.as_ref())
        .bind(&order.customer.phone_number)
        .bind(&order.customer.address)
        .bind(order.total)
        .bind(order.online_amount)
        .bind(order.cod_amount)
        .bind(order.shipping)
        .bind(order.payment_method)
        .bind(order.payment_status)
        .bind(order.payment_id.as_deref())
        .bind(order.status)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        write_items(&mut *tx, order_id, &order.items).await?;
        append_history(&mut *tx, order_id, &order.status_history).await?;
        tx.commit().await?;

        Ok(report)
    }

    /// Attach items and history to order rows.
    async fn hydrate(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();

        let item_rows = sqlx::query_as::<_, ItemRow>(
            r"
            SELECT order_id, product_id, name, price, quantity, size, color, material,
                   gender, brand, fit, care_instructions, chest, length, sleeve, weight,
                   image, is_returnable, return_period, online_amount, cod_amount
            FROM shop.order_item
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let history_rows = sqlx::query_as::<_, HistoryRow>(
            r"
            SELECT order_id, status, details, changed_at
            FROM shop.order_status_history
            WHERE order_id = ANY($1)
            ORDER BY order_id, id
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut items: HashMap<i32, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            items.entry(row.order_id).or_default().push(row.into());
        }
        let mut history: HashMap<i32, Vec<StatusChange>> = HashMap::new();
        for row in history_rows {
            history.entry(row.order_id).or_default().push(row.into());
        }

        rows.into_iter()
            .map(|row| {
                let own_items = items.remove(&row.id).unwrap_or_default();
                let own_history = history.remove(&row.id).unwrap_or_default();
                row.into_order(own_items, own_history)
            })
            .collect()
    }

    /// Get an order by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.order WHERE id = $1"
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(self.hydrate(rows).await?.into_iter().next())
    }

    /// A shopper's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.order WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        self.hydrate(rows).await
    }

    /// A seller's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_seller(&self, seller_id: SellerId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.order WHERE seller_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(seller_id)
        .fetch_all(self.pool)
        .await?;

        self.hydrate(rows).await
    }

    /// Revenue totals for a seller.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn revenue_for_seller(
        &self,
        seller_id: SellerId,
    ) -> Result<RevenueSummary, RepositoryError> {
        let summary = sqlx::query_as::<_, RevenueSummary>(
            r"
            SELECT
                COUNT(*) AS total_orders,
                COALESCE(SUM(total), 0) AS total_revenue,
                COALESCE(SUM(online_amount), 0) AS online_revenue,
                COALESCE(SUM(cod_amount), 0) AS cod_revenue,
                COALESCE(SUM(total) FILTER (WHERE status = 'delivered'), 0) AS delivered_revenue,
                COALESCE(SUM(cod_amount) FILTER (WHERE status <> 'delivered'), 0) AS pending_cod
            FROM shop.order
            WHERE seller_id = $1 AND status NOT IN ('cancelled', 'returned')
            ",
        )
        .bind(seller_id)
        .fetch_one(self.pool)
        .await?;

        Ok(summary)
    }

    /// Order counts per status for a seller, in progression order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn status_counts_for_seller(
        &self,
        seller_id: SellerId,
    ) -> Result<Vec<StatusCount>, RepositoryError> {
        let counts = sqlx::query_as::<_, StatusCount>(
            r"
            SELECT status, COUNT(*) AS count
            FROM shop.order
            WHERE seller_id = $1
            GROUP BY status
            ORDER BY status
            ",
        )
        .bind(seller_id)
        .fetch_all(self.pool)
        .await?;

        Ok(counts)
    }
}
