//! Product listings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use haat_core::order::{Dimensions, OrderError, PaymentSplit};
use haat_core::{ApprovalStatus, CategoryId, ProductId, ProductStatus, SellerId};

use super::clean;
use crate::services::uploads::FormFields;

/// A seller's product listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub seller_id: SellerId,
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub material: Option<String>,
    pub gender: Option<String>,
    pub brand: Option<String>,
    pub fit: Option<String>,
    pub care_instructions: Option<String>,
    pub is_returnable: bool,
    pub return_period: i32,
    pub dimensions: Dimensions,
    pub weight: Option<Decimal>,
    pub images: Vec<String>,
    #[serde(rename = "isCashOnDeliveryAvailable")]
    pub cod_available: bool,
    pub online_payment_percentage: i32,
    pub status: ProductStatus,
    pub approval: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Whether the owning seller account is enabled.
    #[serde(skip)]
    pub seller_enabled: bool,
}

impl Product {
    /// Enabled by the seller, not suspended by an admin, and owned by an
    /// enabled seller account.
    #[must_use]
    pub fn is_listed(&self) -> bool {
        self.seller_enabled
            && self.status == ProductStatus::Enabled
            && self.approval == ApprovalStatus::Approved
    }

    /// Online/COD split for buying `quantity` units.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError`] when the quantity is below one or stored
    /// percentages are out of range.
    pub fn split_for(&self, quantity: i32) -> Result<PaymentSplit, OrderError> {
        PaymentSplit::for_line(
            self.price,
            quantity,
            self.cod_available,
            self.online_payment_percentage,
        )
    }
}

/// Listing data submitted by a seller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductInput {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub category_id: Option<CategoryId>,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub material: Option<String>,
    pub gender: Option<String>,
    pub brand: Option<String>,
    pub fit: Option<String>,
    pub care_instructions: Option<String>,
    pub is_returnable: bool,
    pub return_period: i32,
    pub dimensions: Dimensions,
    pub weight: Option<Decimal>,
    pub images: Vec<String>,
    pub cod_available: bool,
    pub online_payment_percentage: i32,
}

impl ProductInput {
    /// Build from multipart text fields.
    ///
    /// List fields (`sizes`, `colors`) may be repeated, sent as a JSON array
    /// string, or comma separated. `dimensions` may be a JSON object or the
    /// separate `chest`, `length` and `sleeve` fields.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message for missing or malformed fields.
    pub fn from_form(form: &FormFields) -> Result<Self, String> {
        let name = form
            .text("name")
            .map(str::to_owned)
            .ok_or_else(|| "Product name is required".to_owned())?;
        let price = form
            .text("price")
            .ok_or_else(|| "Price is required".to_owned())?
            .parse::<Decimal>()
            .map_err(|_| "Price must be a number".to_owned())?;

        let dimensions = match form.text("dimensions") {
            Some(raw) => serde_json::from_str::<Dimensions>(raw)
                .map_err(|_| "dimensions must be an object with chest, length and sleeve".to_owned())?,
            None => Dimensions {
                chest: parse_opt(form, "chest")?,
                length: parse_opt(form, "length")?,
                sleeve: parse_opt(form, "sleeve")?,
            },
        };

        let input = Self {
            name,
            description: form.text("description").map(str::to_owned),
            price,
            stock: parse_opt(form, "stock")?.unwrap_or(0),
            category_id: parse_opt::<i32>(form, "category")?.map(CategoryId::new),
            sizes: form.list("sizes"),
            colors: form.list("colors"),
            material: form.text("material").map(str::to_owned),
            gender: form.text("gender").map(str::to_owned),
            brand: form.text("brand").map(str::to_owned),
            fit: form.text("fit").map(str::to_owned),
            care_instructions: form.text("careInstructions").map(str::to_owned),
            is_returnable: parse_opt(form, "isReturnable")?.unwrap_or(false),
            return_period: parse_opt(form, "returnPeriod")?.unwrap_or(0),
            dimensions,
            weight: parse_opt(form, "weight")?,
            images: form.list("existingImages"),
            cod_available: parse_opt(form, "isCashOnDeliveryAvailable")?.unwrap_or(false),
            online_payment_percentage: parse_opt(form, "onlinePaymentPercentage")?.unwrap_or(100),
        };
        input.normalize()
    }

    /// Apply listing rules.
    ///
    /// Without cash on delivery the product is paid fully online, so the
    /// online percentage is forced to 100.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message when a value is out of range.
    pub fn normalize(mut self) -> Result<Self, String> {
        self.name = self.name.trim().to_owned();
        if self.name.is_empty() {
            return Err("Product name is required".to_owned());
        }
        if self.price.is_sign_negative() && !self.price.is_zero() {
            return Err("Price cannot be negative".to_owned());
        }
        if self.stock < 0 {
            return Err("Stock cannot be negative".to_owned());
        }
        if self.return_period < 0 {
            return Err("Return period cannot be negative".to_owned());
        }
        if !self.cod_available {
            self.online_payment_percentage = 100;
        }
        if !(0..=100).contains(&self.online_payment_percentage) {
            return Err("Online payment percentage must be between 0 and 100".to_owned());
        }
        self.description = clean(self.description);
        self.material = clean(self.material);
        self.gender = clean(self.gender);
        self.brand = clean(self.brand);
        self.fit = clean(self.fit);
        self.care_instructions = clean(self.care_instructions);
        Ok(self)
    }
}

fn parse_opt<T: std::str::FromStr>(form: &FormFields, field: &str) -> Result<Option<T>, String> {
    form.text(field)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| format!("{field} has an invalid value"))
        })
        .transpose()
}

/// Catalog filters for shoppers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub category: Option<CategoryId>,
    pub seller: Option<SellerId>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Moderation changes an admin applies to a listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminProductUpdate {
    pub status: Option<ProductStatus>,
    pub approval: Option<ApprovalStatus>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> FormFields {
        let mut form = FormFields::default();
        for (k, v) in pairs {
            form.push(k, v);
        }
        form
    }

    #[test]
    fn test_from_form_reads_fields() {
        let input = ProductInput::from_form(&form(&[
            ("name", "Block Print Kurta"),
            ("price", "1299.50"),
            ("stock", "12"),
            ("sizes", r#"["S","M","L"]"#),
            ("colors", "Indigo, Rust"),
            ("isCashOnDeliveryAvailable", "true"),
            ("onlinePaymentPercentage", "40"),
            ("chest", "40"),
        ]))
        .unwrap();

        assert_eq!(input.name, "Block Print Kurta");
        assert_eq!(input.price, "1299.50".parse::<Decimal>().unwrap());
        assert_eq!(input.stock, 12);
        assert_eq!(input.sizes, vec!["S", "M", "L"]);
        assert_eq!(input.colors, vec!["Indigo", "Rust"]);
        assert_eq!(input.online_payment_percentage, 40);
        assert_eq!(input.dimensions.chest, Some(Decimal::from(40)));
    }

    #[test]
    fn test_percentage_forced_to_100_without_cod() {
        let input = ProductInput::from_form(&form(&[
            ("name", "Dupatta"),
            ("price", "499"),
            ("isCashOnDeliveryAvailable", "false"),
            ("onlinePaymentPercentage", "20"),
        ]))
        .unwrap();
        assert_eq!(input.online_payment_percentage, 100);
    }

    #[test]
    fn test_percentage_out_of_range_rejected() {
        let result = ProductInput::from_form(&form(&[
            ("name", "Dupatta"),
            ("price", "499"),
            ("isCashOnDeliveryAvailable", "true"),
            ("onlinePaymentPercentage", "120"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_price_rejected() {
        assert_eq!(
            ProductInput::from_form(&form(&[("name", "Stole")])),
            Err("Price is required".to_owned())
        );
    }

    #[test]
    fn test_dimensions_json() {
        let input = ProductInput::from_form(&form(&[
            ("name", "Shirt"),
            ("price", "899"),
            ("dimensions", r#"{"chest": "42", "length": "29", "sleeve": null}"#),
        ]))
        .unwrap();
        assert_eq!(input.dimensions.length, Some(Decimal::from(29)));
        assert_eq!(input.dimensions.sleeve, None);
    }
}
