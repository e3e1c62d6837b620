//! Status enums for orders, payments, sellers and products.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Order fulfillment status.
///
/// Orders move forward through [`OrderStatus::FORWARD`] one step at a time.
/// `Cancelled` and `Returned` are side branches: an order can be put into
/// them directly, but never moves out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "shop.order_status"))]
pub enum OrderStatus {
    #[default]
    #[serde(rename = "order confirmed")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "order confirmed"))]
    OrderConfirmed,
    #[serde(rename = "processing")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "processing"))]
    Processing,
    #[serde(rename = "shipped")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "shipped"))]
    Shipped,
    #[serde(rename = "out for delivery")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "out for delivery"))]
    OutForDelivery,
    #[serde(rename = "delivered")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "delivered"))]
    Delivered,
    #[serde(rename = "cancelled")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "cancelled"))]
    Cancelled,
    #[serde(rename = "returned")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "returned"))]
    Returned,
}

/// Error returned when a string does not name an [`OrderStatus`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown order status: {0}")]
pub struct UnknownOrderStatus(pub String);

impl OrderStatus {
    /// The forward progression, in order. Side branches are not part of it.
    pub const FORWARD: [Self; 5] = [
        Self::OrderConfirmed,
        Self::Processing,
        Self::Shipped,
        Self::OutForDelivery,
        Self::Delivered,
    ];

    /// Every status, in display order.
    pub const ALL: [Self; 7] = [
        Self::OrderConfirmed,
        Self::Processing,
        Self::Shipped,
        Self::OutForDelivery,
        Self::Delivered,
        Self::Cancelled,
        Self::Returned,
    ];

    /// The wire label, e.g. `"out for delivery"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OrderConfirmed => "order confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::OutForDelivery => "out for delivery",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Returned => "returned",
        }
    }

    /// Whether this is one of the side-branch states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Returned)
    }

    /// The status one step further along [`Self::FORWARD`].
    ///
    /// Terminal states and `Delivered` map to themselves.
    #[must_use]
    pub fn next(self) -> Self {
        if self.is_terminal() {
            return self;
        }
        Self::FORWARD
            .iter()
            .position(|s| *s == self)
            .and_then(|i| Self::FORWARD.get(i + 1))
            .copied()
            .unwrap_or(self)
    }

    /// Whether [`Self::next`] would change anything.
    #[must_use]
    pub fn can_advance(self) -> bool {
        self.next() != self
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownOrderStatus;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| UnknownOrderStatus(s.to_owned()))
    }
}

/// Outcome of asking for the next status of a raw status label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progression {
    /// The order can move on to the contained status.
    Advanced {
        /// Status before the step.
        from: OrderStatus,
        /// Status after the step.
        to: OrderStatus,
    },
    /// Nothing further is possible; the input label is handed back unchanged.
    ///
    /// Covers terminal states, `delivered`, and labels that are not statuses
    /// at all.
    NoFurtherUpdates(String),
}

impl Progression {
    /// The label the caller ends up with: the new status, or the input as-is.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Advanced { to, .. } => to.as_str(),
            Self::NoFurtherUpdates(current) => current,
        }
    }
}

/// Compute the next status for a raw status label.
///
/// ```
/// use haat_core::{next_status, Progression, OrderStatus};
///
/// assert_eq!(next_status("shipped").label(), "out for delivery");
/// assert_eq!(next_status("cancelled").label(), "cancelled");
/// assert!(matches!(next_status("lost in transit"), Progression::NoFurtherUpdates(_)));
/// ```
#[must_use]
pub fn next_status(current: &str) -> Progression {
    match current.parse::<OrderStatus>() {
        Ok(from) if from.can_advance() => Progression::Advanced {
            from,
            to: from.next(),
        },
        _ => Progression::NoFurtherUpdates(current.to_owned()),
    }
}

/// How an order is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "shop.payment_method"))]
pub enum PaymentMethod {
    /// Fully paid online through Razorpay.
    #[serde(rename = "Razorpay")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Razorpay"))]
    Razorpay,
    /// Fully paid in cash at delivery.
    #[serde(rename = "Cash on Delivery")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Cash on Delivery"))]
    CashOnDelivery,
    /// Part online, part cash on delivery.
    #[serde(rename = "Split Payment")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Split Payment"))]
    SplitPayment,
}

/// Settlement state of the online part of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.payment_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

/// Whether a seller account may trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.seller_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum SellerStatus {
    #[default]
    Enabled,
    Disabled,
}

/// Seller-controlled listing visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.product_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    #[default]
    Enabled,
    Disabled,
}

impl ProductStatus {
    /// Flip between enabled and disabled.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Enabled => Self::Disabled,
            Self::Disabled => Self::Enabled,
        }
    }
}

/// Admin moderation state of a product listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.approval_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    #[default]
    Approved,
    Suspended,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_next_walks_forward_progression() {
        assert_eq!(OrderStatus::OrderConfirmed.next(), OrderStatus::Processing);
        assert_eq!(OrderStatus::Processing.next(), OrderStatus::Shipped);
        assert_eq!(OrderStatus::Shipped.next(), OrderStatus::OutForDelivery);
        assert_eq!(OrderStatus::OutForDelivery.next(), OrderStatus::Delivered);
    }

    #[test]
    fn test_delivered_is_last_step() {
        assert_eq!(OrderStatus::Delivered.next(), OrderStatus::Delivered);
        assert!(!OrderStatus::Delivered.can_advance());
    }

    #[test]
    fn test_terminal_states_never_move() {
        for status in [OrderStatus::Cancelled, OrderStatus::Returned] {
            let mut current = status;
            for _ in 0..10 {
                current = current.next();
                assert_eq!(current, status);
            }
        }
    }

    #[test]
    fn test_progression_never_enters_side_branch() {
        for status in OrderStatus::FORWARD {
            assert!(!status.next().is_terminal());
        }
    }

    #[test]
    fn test_next_status_labels() {
        assert_eq!(next_status("shipped").label(), "out for delivery");
        assert_eq!(next_status("cancelled").label(), "cancelled");
        assert_eq!(next_status("returned").label(), "returned");
        assert_eq!(next_status("delivered").label(), "delivered");
    }

    #[test]
    fn test_next_status_unknown_is_noop() {
        let progression = next_status("misplaced");
        assert_eq!(
            progression,
            Progression::NoFurtherUpdates("misplaced".to_owned())
        );
        assert_eq!(progression.label(), "misplaced");
    }

    #[test]
    fn test_next_status_reports_transition() {
        assert_eq!(
            next_status("Order Confirmed"),
            Progression::Advanced {
                from: OrderStatus::OrderConfirmed,
                to: OrderStatus::Processing,
            }
        );
    }

    #[test]
    fn test_order_status_parse_is_case_insensitive() {
        assert_eq!(
            " OUT FOR DELIVERY ".parse::<OrderStatus>().unwrap(),
            OrderStatus::OutForDelivery
        );
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_order_status_serde_uses_labels() {
        let json = serde_json::to_string(&OrderStatus::OutForDelivery).unwrap();
        assert_eq!(json, "\"out for delivery\"");
        let parsed: OrderStatus = serde_json::from_str("\"order confirmed\"").unwrap();
        assert_eq!(parsed, OrderStatus::OrderConfirmed);
    }

    #[test]
    fn test_payment_method_labels() {
        let json = serde_json::to_string(&PaymentMethod::CashOnDelivery).unwrap();
        assert_eq!(json, "\"Cash on Delivery\"");
    }

    #[test]
    fn test_product_status_toggle() {
        assert_eq!(ProductStatus::Enabled.toggled(), ProductStatus::Disabled);
        assert_eq!(
            ProductStatus::Enabled.toggled().toggled(),
            ProductStatus::Enabled
        );
    }
}
