//! Response shape for orders.

use rust_decimal::Decimal;
use serde::Serialize;

use haat_core::order::Order;

/// An order plus `calculatedTotal` (`sum(price * quantity) + shipping`).
///
/// `total` is the stored split-based figure; the two agree unless a split was
/// rounded differently from the line amount.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub calculated_total: Decimal,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        let calculated_total = order.calculated_total();
        Self {
            order,
            calculated_total,
        }
    }
}

/// Convert a batch of orders for a list response.
pub fn views(orders: Vec<Order>) -> Vec<OrderView> {
    orders.into_iter().map(OrderView::from).collect()
}
