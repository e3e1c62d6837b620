//! Cart, saved-for-later and wishlist reconciliation.
//!
//! The cart and the saved-for-later list share one shape: lines keyed by
//! `(product, size, color)`. Adding a line whose key already exists overwrites
//! its quantity rather than incrementing it. The wishlist is a plain set of
//! products that can be toggled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ProductId;

/// Which per-user line list an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Cart,
    SavedForLater,
}

impl ListKind {
    const fn label(self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::SavedForLater => "saved for later",
        }
    }
}

/// Errors raised while editing a line list.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    /// One of product, quantity, size or color is absent or blank.
    #[error("Missing required {} fields: productId, quantity, size, or color", .0.label())]
    MissingFields(ListKind),
    /// Quantity below one.
    #[error("quantity must be at least 1 (got {0})")]
    InvalidQuantity(i32),
}

/// Identity of a line: the same product in another size or color is another line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineKey {
    pub product_id: ProductId,
    pub size: String,
    pub color: String,
}

/// A raw add-to-list request as it arrives from a client.
///
/// All fields are optional so that a missing field can be reported with one
/// consistent message instead of a deserialization error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRequest {
    pub product_id: Option<ProductId>,
    pub quantity: Option<i32>,
    pub size: Option<String>,
    pub color: Option<String>,
}

impl LineRequest {
    /// Check presence of every field and produce a key plus quantity.
    ///
    /// Size and color are trimmed. A zero quantity counts as missing.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::MissingFields`] when a field is absent or blank
    /// and [`CartError::InvalidQuantity`] for negative quantities.
    pub fn validate(self, kind: ListKind) -> Result<(LineKey, i32), CartError> {
        let missing = || CartError::MissingFields(kind);

        let product_id = self.product_id.ok_or_else(missing)?;
        let quantity = self.quantity.filter(|q| *q != 0).ok_or_else(missing)?;
        let size = non_blank(self.size).ok_or_else(missing)?;
        let color = non_blank(self.color).ok_or_else(missing)?;

        if quantity < 1 {
            return Err(CartError::InvalidQuantity(quantity));
        }

        Ok((
            LineKey {
                product_id,
                size,
                color,
            },
            quantity,
        ))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

/// One line of a cart or saved-for-later list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    #[serde(flatten)]
    pub key: LineKey,
    pub quantity: i32,
    pub added_at: DateTime<Utc>,
}

/// Result of [`LineList::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// A new line was appended.
    Inserted,
    /// An existing line's quantity was replaced.
    Updated {
        /// Quantity before the overwrite.
        previous: i32,
    },
}

/// An ordered list of cart lines with unique keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineList(Vec<CartLine>);

impl LineList {
    /// Empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Build from stored lines, keeping the first line of any duplicate key.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut list = Self::new();
        for line in lines {
            if list.get(&line.key).is_none() {
                list.0.push(line);
            }
        }
        list
    }

    /// Add a line or overwrite the quantity of the line with the same key.
    ///
    /// `added_at` is only set for new lines.
    pub fn upsert(&mut self, key: LineKey, quantity: i32, now: DateTime<Utc>) -> Upsert {
        if let Some(line) = self.0.iter_mut().find(|l| l.key == key) {
            let previous = line.quantity;
            line.quantity = quantity;
            return Upsert::Updated { previous };
        }
        self.0.push(CartLine {
            key,
            quantity,
            added_at: now,
        });
        Upsert::Inserted
    }

    /// Remove the line with exactly this key.
    pub fn remove(&mut self, key: &LineKey) -> Option<CartLine> {
        let index = self.0.iter().position(|l| &l.key == key)?;
        Some(self.0.remove(index))
    }

    /// Remove every variant of a product. Returns how many lines went away.
    pub fn remove_product(&mut self, product_id: ProductId) -> usize {
        let before = self.0.len();
        self.0.retain(|l| l.key.product_id != product_id);
        before - self.0.len()
    }

    /// Take every variant of a product out of the list, in list order.
    pub fn take_product(&mut self, product_id: ProductId) -> Vec<CartLine> {
        let (taken, kept) = std::mem::take(&mut self.0)
            .into_iter()
            .partition(|l| l.key.product_id == product_id);
        self.0 = kept;
        taken
    }

    /// Drop all lines.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Look up a line by key.
    #[must_use]
    pub fn get(&self, key: &LineKey) -> Option<&CartLine> {
        self.0.iter().find(|l| &l.key == key)
    }

    /// Whether any line is for this product.
    #[must_use]
    pub fn contains_product(&self, product_id: ProductId) -> bool {
        self.0.iter().any(|l| l.key.product_id == product_id)
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all quantities.
    #[must_use]
    pub fn total_quantity(&self) -> i64 {
        self.0.iter().map(|l| i64::from(l.quantity)).sum()
    }
}

impl IntoIterator for LineList {
    type Item = CartLine;
    type IntoIter = std::vec::IntoIter<CartLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Move every variant of a product from one list into another.
///
/// Lines are upserted into `to`, so a matching key there has its quantity
/// overwritten. Returns the number of lines moved.
pub fn move_product(
    from: &mut LineList,
    to: &mut LineList,
    product_id: ProductId,
    now: DateTime<Utc>,
) -> usize {
    let moved = from.take_product(product_id);
    let count = moved.len();
    for line in moved {
        to.upsert(line.key, line.quantity, now);
    }
    count
}

/// Outcome of [`Wishlist::toggle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    Added,
    Removed,
}

/// One wishlisted product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistEntry {
    pub product_id: ProductId,
    pub added_at: DateTime<Utc>,
}

/// A set of products a user has marked, in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wishlist(Vec<WishlistEntry>);

impl Wishlist {
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = WishlistEntry>) -> Self {
        let mut list = Self::default();
        for entry in entries {
            if !list.contains(entry.product_id) {
                list.0.push(entry);
            }
        }
        list
    }

    /// Remove the product if present, otherwise add it.
    pub fn toggle(&mut self, product_id: ProductId, now: DateTime<Utc>) -> Toggle {
        if let Some(index) = self.0.iter().position(|e| e.product_id == product_id) {
            self.0.remove(index);
            Toggle::Removed
        } else {
            self.0.push(WishlistEntry {
                product_id,
                added_at: now,
            });
            Toggle::Added
        }
    }

    #[must_use]
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.0.iter().any(|e| e.product_id == product_id)
    }

    #[must_use]
    pub fn entries(&self) -> &[WishlistEntry] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
