//! Order aggregate.
//!
//! An [`Order`] is one seller's share of a checkout. Its money fields are
//! derived from the line items: every line carries its own online/COD split,
//! and the order-level amounts are always recomputed from those lines before
//! the order is persisted (see [`Order::prepare_for_save`]).

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::{
    Email, OrderId, OrderStatus, PaymentMethod, PaymentStatus, PhoneNumber, ProductId, SellerId,
    UserId,
};

/// Errors raised by order rules.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// An order needs at least one line.
    #[error("order must contain at least one item")]
    NoItems,
    /// Quantities start at one.
    #[error("item quantity must be at least 1 (got {0})")]
    InvalidQuantity(i32),
    /// Prices, splits and shipping are never negative.
    #[error("{0} cannot be negative")]
    NegativeAmount(&'static str),
    /// Online share of a product price is a percentage.
    #[error("online payment percentage must be between 0 and 100 (got {0})")]
    InvalidPercentage(i32),
    /// The status cannot move forward.
    #[error("no further status updates available for '{0}'")]
    NoFurtherUpdates(OrderStatus),
}

/// Garment measurements copied onto an order line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimensions {
    pub chest: Option<Decimal>,
    pub length: Option<Decimal>,
    pub sleeve: Option<Decimal>,
}

/// How much of an amount is paid online and how much in cash on delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSplit {
    pub online_amount: Decimal,
    pub cod_amount: Decimal,
}

impl PaymentSplit {
    /// Split one order line.
    ///
    /// The line amount is `price * quantity`. The online share is
    /// `online_percentage` of it, rounded to two decimal places (half away
    /// from zero); the remainder is collected on delivery. Products that do
    /// not allow cash on delivery are paid fully online whatever the
    /// percentage says.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError`] for a negative price, a quantity below one, or a
    /// percentage outside `0..=100`.
    pub fn for_line(
        price: Decimal,
        quantity: i32,
        cod_available: bool,
        online_percentage: i32,
    ) -> Result<Self, OrderError> {
        if price.is_sign_negative() && !price.is_zero() {
            return Err(OrderError::NegativeAmount("price"));
        }
        if quantity < 1 {
            return Err(OrderError::InvalidQuantity(quantity));
        }
        if !(0..=100).contains(&online_percentage) {
            return Err(OrderError::InvalidPercentage(online_percentage));
        }

        let line = price * Decimal::from(quantity);
        if !cod_available {
            return Ok(Self {
                online_amount: line,
                cod_amount: Decimal::ZERO,
            });
        }

        let online = (line * Decimal::from(online_percentage) / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        Ok(Self {
            online_amount: online,
            cod_amount: line - online,
        })
    }

    /// Sum of both parts.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.online_amount + self.cod_amount
    }
}

impl PaymentMethod {
    /// Derive the payment method from order-level split totals.
    #[must_use]
    pub fn for_amounts(online: Decimal, cod: Decimal) -> Self {
        if cod.is_zero() {
            Self::Razorpay
        } else if online.is_zero() {
            Self::CashOnDelivery
        } else {
            Self::SplitPayment
        }
    }
}

/// One product line inside an order, snapshotted at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub size: String,
    pub color: String,
    pub material: Option<String>,
    pub gender: Option<String>,
    pub brand: Option<String>,
    pub fit: Option<String>,
    pub care_instructions: Option<String>,
    #[serde(default)]
    pub dimensions: Dimensions,
    pub weight: Option<Decimal>,
    pub image: Option<String>,
    #[serde(default)]
    pub is_returnable: bool,
    #[serde(default)]
    pub return_period: i32,
    /// Amount of this line paid online.
    #[serde(default)]
    pub online_amount: Decimal,
    /// Amount of this line collected on delivery.
    #[serde(default)]
    pub cod_amount: Decimal,
}

impl OrderItem {
    /// `price * quantity`, ignoring the split.
    #[must_use]
    pub fn line_amount(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }

    /// Check the line's own invariants.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError`] for a quantity below one or a negative amount.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.quantity < 1 {
            return Err(OrderError::InvalidQuantity(self.quantity));
        }
        for (field, value) in [
            ("price", self.price),
            ("online amount", self.online_amount),
            ("COD amount", self.cod_amount),
        ] {
            if value.is_sign_negative() && !value.is_zero() {
                return Err(OrderError::NegativeAmount(field));
            }
        }
        Ok(())
    }
}

/// Delivery contact snapshot stored with the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetails {
    pub name: String,
    pub email: Option<Email>,
    pub phone_number: PhoneNumber,
    pub address: String,
}

/// One entry of the append-only status log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    pub details: Option<String>,
}

/// Record of a silently corrected total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalCorrection {
    /// Total held by the order before the save.
    pub stored: Decimal,
    /// Total recomputed from lines and shipping.
    pub computed: Decimal,
}

/// What [`Order::prepare_for_save`] changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveReport {
    /// Set when the stored total disagreed with the lines and was overwritten.
    pub total_correction: Option<TotalCorrection>,
    /// Whether a status history entry was appended.
    pub status_recorded: bool,
}

/// A buyer's order with one seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Database id; `None` until first persisted.
    pub id: Option<OrderId>,
    /// Human-facing unique order number.
    #[serde(rename = "orderId")]
    pub order_number: String,
    pub user_id: UserId,
    pub seller_id: SellerId,
    pub customer: CustomerDetails,
    pub items: Vec<OrderItem>,
    /// `sum(item.online_amount + item.cod_amount) + shipping`.
    pub total: Decimal,
    pub online_amount: Decimal,
    pub cod_amount: Decimal,
    pub shipping: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
    pub status: OrderStatus,
    pub status_history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to open a new order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: UserId,
    pub seller_id: SellerId,
    pub customer: CustomerDetails,
    pub items: Vec<OrderItem>,
    pub shipping: Decimal,
    pub payment_id: Option<String>,
}

impl Order {
    /// Open an order in `order confirmed` state.
    ///
    /// The payment method is derived from the line splits, the totals are
    /// computed and the first history entry is written, exactly as a first
    /// save would.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError`] if there are no items, an item is invalid, or
    /// shipping is negative.
    pub fn open(new: NewOrder, now: DateTime<Utc>) -> Result<Self, OrderError> {
        if new.items.is_empty() {
            return Err(OrderError::NoItems);
        }
        for item in &new.items {
            item.validate()?;
        }
        if new.shipping.is_sign_negative() && !new.shipping.is_zero() {
            return Err(OrderError::NegativeAmount("shipping"));
        }

        let online: Decimal = new.items.iter().map(|i| i.online_amount).sum();
        let cod: Decimal = new.items.iter().map(|i| i.cod_amount).sum();

        let mut order = Self {
            id: None,
            order_number: new.order_number,
            user_id: new.user_id,
            seller_id: new.seller_id,
            customer: new.customer,
            items: new.items,
            total: Decimal::ZERO,
            online_amount: Decimal::ZERO,
            cod_amount: Decimal::ZERO,
            shipping: new.shipping,
            payment_method: PaymentMethod::for_amounts(online, cod),
            payment_status: PaymentStatus::Pending,
            payment_id: new.payment_id,
            status: OrderStatus::OrderConfirmed,
            status_history: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        order.prepare_for_save(now, None);
        Ok(order)
    }

    /// Bring derived fields up to date before persisting.
    ///
    /// - bumps `updated_at`,
    /// - appends a history entry when the history is empty or its last
    ///   status differs from the current one,
    /// - recomputes `online_amount`, `cod_amount` and `total` from the lines,
    ///   overwriting a disagreeing total without failing.
    pub fn prepare_for_save(&mut self, now: DateTime<Utc>, note: Option<&str>) -> SaveReport {
        self.updated_at = now;
        let status_recorded = self.record_status(now, note);
        let total_correction = self.recompute_totals();
        SaveReport {
            total_correction,
            status_recorded,
        }
    }

    /// Append the current status to the history unless it is already last.
    pub fn record_status(&mut self, now: DateTime<Utc>, note: Option<&str>) -> bool {
        let unchanged = self
            .status_history
            .last()
            .is_some_and(|last| last.status == self.status);
        if unchanged {
            return false;
        }
        self.status_history.push(StatusChange {
            status: self.status,
            timestamp: now,
            details: note.map(str::to_owned),
        });
        true
    }

    /// Recompute the order-level amounts from the lines.
    ///
    /// Returns the correction when the stored total was wrong.
    pub fn recompute_totals(&mut self) -> Option<TotalCorrection> {
        self.online_amount = self.items.iter().map(|i| i.online_amount).sum();
        self.cod_amount = self.items.iter().map(|i| i.cod_amount).sum();

        let computed = self.online_amount + self.cod_amount + self.shipping;
        if self.total == computed {
            return None;
        }
        let correction = TotalCorrection {
            stored: self.total,
            computed,
        };
        self.total = computed;
        Some(correction)
    }

    /// `sum(price * quantity) + shipping`, independent of the split.
    #[must_use]
    pub fn calculated_total(&self) -> Decimal {
        self.items.iter().map(OrderItem::line_amount).sum::<Decimal>() + self.shipping
    }

    /// Move one step along the forward progression.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::NoFurtherUpdates`] for delivered and terminal orders.
    pub fn advance(&mut self) -> Result<OrderStatus, OrderError> {
        if !self.status.can_advance() {
            return Err(OrderError::NoFurtherUpdates(self.status));
        }
        self.status = self.status.next();
        Ok(self.status)
    }

    /// Jump straight to `status`, e.g. to cancel or mark a return.
    ///
    /// Delivered, cancelled and returned orders are closed and accept no
    /// further status changes.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::NoFurtherUpdates`] when the order is closed.
    pub fn set_status(&mut self, status: OrderStatus) -> Result<OrderStatus, OrderError> {
        if !self.status.can_advance() {
            return Err(OrderError::NoFurtherUpdates(self.status));
        }
        self.status = status;
        Ok(self.status)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    use super::*;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 10, minute, 0).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn item(product: i32, price: &str, quantity: i32, online: &str, cod: &str) -> OrderItem {
        OrderItem {
            product_id: ProductId::new(product),
            name: format!("Kurta {product}"),
            price: dec(price),
            quantity,
            size: "M".to_owned(),
            color: "Indigo".to_owned(),
            material: Some("Cotton".to_owned()),
            gender: None,
            brand: None,
            fit: None,
            care_instructions: None,
            dimensions: Dimensions::default(),
            weight: None,
            image: None,
            is_returnable: false,
            return_period: 0,
            online_amount: dec(online),
            cod_amount: dec(cod),
        }
    }

    fn new_order(items: Vec<OrderItem>, shipping: &str) -> NewOrder {
        NewOrder {
            order_number: "ORD-TEST0001".to_owned(),
            user_id: UserId::new(1),
            seller_id: SellerId::new(2),
            customer: CustomerDetails {
                name: "Asha Rao".to_owned(),
                email: None,
                phone_number: PhoneNumber::parse("+919876543210").unwrap(),
                address: "12 MG Road, Pune".to_owned(),
            },
            items,
            shipping: dec(shipping),
            payment_id: None,
        }
    }

    #[test]
    fn test_split_full_online_when_cod_unavailable() {
        let split = PaymentSplit::for_line(dec("499.00"), 2, false, 30).unwrap();
        assert_eq!(split.online_amount, dec("998.00"));
        assert_eq!(split.cod_amount, Decimal::ZERO);
    }

    #[test]
    fn test_split_by_percentage_rounds_half_away_from_zero() {
        // 33% of 100.50 = 33.165 -> 33.17
        let split = PaymentSplit::for_line(dec("100.50"), 1, true, 33).unwrap();
        assert_eq!(split.online_amount, dec("33.17"));
        assert_eq!(split.cod_amount, dec("67.33"));
        assert_eq!(split.total(), dec("100.50"));
    }

    #[test]
    fn test_split_rejects_bad_input() {
        assert_eq!(
            PaymentSplit::for_line(dec("10"), 0, true, 50),
            Err(OrderError::InvalidQuantity(0))
        );
        assert_eq!(
            PaymentSplit::for_line(dec("10"), 1, true, 101),
            Err(OrderError::InvalidPercentage(101))
        );
        assert_eq!(
            PaymentSplit::for_line(dec("-1"), 1, true, 50),
            Err(OrderError::NegativeAmount("price"))
        );
    }

    #[test]
    fn test_payment_method_for_amounts() {
        assert_eq!(
            PaymentMethod::for_amounts(dec("10"), Decimal::ZERO),
            PaymentMethod::Razorpay
        );
        assert_eq!(
            PaymentMethod::for_amounts(Decimal::ZERO, dec("10")),
            PaymentMethod::CashOnDelivery
        );
        assert_eq!(
            PaymentMethod::for_amounts(dec("4"), dec("6")),
            PaymentMethod::SplitPayment
        );
    }

    #[test]
    fn test_open_computes_totals_and_first_history_entry() {
        let order = Order::open(
            new_order(
                vec![
                    item(1, "500", 2, "600", "400"),
                    item(2, "250", 1, "250", "0"),
                ],
                "40",
            ),
            at(0),
        )
        .unwrap();

        assert_eq!(order.online_amount, dec("850"));
        assert_eq!(order.cod_amount, dec("400"));
        assert_eq!(order.total, dec("1290"));
        assert_eq!(order.payment_method, PaymentMethod::SplitPayment);
        assert_eq!(order.status, OrderStatus::OrderConfirmed);
        assert_eq!(order.status_history.len(), 1);
        assert_eq!(order.status_history[0].status, OrderStatus::OrderConfirmed);
    }

    #[test]
    fn test_open_rejects_empty_orders() {
        assert_eq!(
            Order::open(new_order(Vec::new(), "0"), at(0)),
            Err(OrderError::NoItems)
        );
    }

    #[test]
    fn test_save_overwrites_wrong_total_silently() {
        let mut order =
            Order::open(new_order(vec![item(1, "100", 1, "100", "0")], "20"), at(0)).unwrap();
        order.total = dec("9999");

        let report = order.prepare_for_save(at(1), None);

        assert_eq!(order.total, dec("120"));
        assert_eq!(
            report.total_correction,
            Some(TotalCorrection {
                stored: dec("9999"),
                computed: dec("120"),
            })
        );
    }

    #[test]
    fn test_total_invariant_holds_after_any_save() {
        let mut order = Order::open(
            new_order(vec![item(1, "100", 3, "90", "210")], "15"),
            at(0),
        )
        .unwrap();

        order.items.push(item(9, "80", 1, "80", "0"));
        order.shipping = dec("0");
        order.prepare_for_save(at(2), None);

        let expected: Decimal = order
            .items
            .iter()
            .map(|i| i.online_amount + i.cod_amount)
            .sum::<Decimal>()
            + order.shipping;
        assert_eq!(order.total, expected);
        assert_eq!(order.online_amount, dec("170"));
        assert_eq!(order.cod_amount, dec("210"));
    }

    #[test]
    fn test_history_appends_only_on_change() {
        let mut order =
            Order::open(new_order(vec![item(1, "100", 1, "100", "0")], "0"), at(0)).unwrap();

        let report = order.prepare_for_save(at(1), None);
        assert!(!report.status_recorded);
        assert_eq!(order.status_history.len(), 1);

        order.advance().unwrap();
        let report = order.prepare_for_save(at(2), Some("Packed"));
        assert!(report.status_recorded);
        assert_eq!(order.status_history.len(), 2);
        assert_eq!(order.status_history[1].status, OrderStatus::Processing);
        assert_eq!(order.status_history[1].details.as_deref(), Some("Packed"));

        order.prepare_for_save(at(3), None);
        assert_eq!(order.status_history.len(), 2);
    }

    #[test]
    fn test_empty_history_gets_current_status() {
        let mut order =
            Order::open(new_order(vec![item(1, "100", 1, "100", "0")], "0"), at(0)).unwrap();
        order.status_history.clear();
        order.status = OrderStatus::Shipped;

        assert!(order.record_status(at(5), None));
        assert_eq!(order.status_history.len(), 1);
        assert_eq!(order.status_history[0].status, OrderStatus::Shipped);
    }

    #[test]
    fn test_advance_stops_at_delivered_and_terminal() {
        let mut order =
            Order::open(new_order(vec![item(1, "100", 1, "100", "0")], "0"), at(0)).unwrap();
        for _ in 0..4 {
            order.advance().unwrap();
        }
        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(
            order.advance(),
            Err(OrderError::NoFurtherUpdates(OrderStatus::Delivered))
        );

        order.status = OrderStatus::Cancelled;
        assert_eq!(
            order.advance(),
            Err(OrderError::NoFurtherUpdates(OrderStatus::Cancelled))
        );
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[test]
    fn test_set_status_refuses_closed_orders() {
        let mut order =
            Order::open(new_order(vec![item(1, "100", 1, "100", "0")], "0"), at(0)).unwrap();
        assert_eq!(
            order.set_status(OrderStatus::Cancelled),
            Ok(OrderStatus::Cancelled)
        );
        order.prepare_for_save(at(1), Some("Buyer changed their mind"));

        assert_eq!(
            order.set_status(OrderStatus::Processing),
            Err(OrderError::NoFurtherUpdates(OrderStatus::Cancelled))
        );
        order.prepare_for_save(at(2), None);
        let history: Vec<_> = order.status_history.iter().map(|c| c.status).collect();
        assert_eq!(
            history,
            vec![OrderStatus::OrderConfirmed, OrderStatus::Cancelled]
        );

        order.status = OrderStatus::Delivered;
        assert!(order.set_status(OrderStatus::OrderConfirmed).is_err());
        order.status = OrderStatus::Returned;
        assert!(order.set_status(OrderStatus::Shipped).is_err());
        assert_eq!(order.status, OrderStatus::Returned);
    }

    #[test]
    fn test_calculated_total_ignores_split() {
        let order = Order::open(
            new_order(vec![item(1, "120", 2, "100", "100")], "30"),
            at(0),
        )
        .unwrap();
        assert_eq!(order.calculated_total(), dec("270"));
        assert_eq!(order.total, dec("230"));
    }

    #[test]
    fn test_order_serializes_with_wire_names() {
        let order =
            Order::open(new_order(vec![item(1, "100", 1, "100", "0")], "0"), at(0)).unwrap();
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["orderId"], "ORD-TEST0001");
        assert_eq!(json["status"], "order confirmed");
        assert_eq!(json["paymentMethod"], "Razorpay");
        assert!(json["statusHistory"].is_array());
    }
}
