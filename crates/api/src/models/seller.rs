//! Seller account types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use haat_core::{Email, PhoneNumber, SellerId, SellerStatus};

use super::PaymentDetails;

/// A seller managing a shop.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Seller {
    pub id: SellerId,
    pub name: String,
    pub shop_name: String,
    pub phone_number: PhoneNumber,
    pub email: Option<Email>,
    pub address: Option<String>,
    pub profile_picture: Option<String>,
    pub payment_id: Option<String>,
    pub aadhaar_id: Option<String>,
    pub payment_details: PaymentDetails,
    pub status: SellerStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated seller registration data.
#[derive(Debug, Clone)]
pub struct NewSeller {
    pub name: String,
    pub shop_name: String,
    pub phone_number: PhoneNumber,
    pub email: Option<Email>,
    pub address: Option<String>,
    pub aadhaar_id: Option<String>,
}

/// Profile changes a seller makes from the dashboard.
///
/// Built from multipart form fields, so every value is optional and
/// absent fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct SellerUpdate {
    pub name: Option<String>,
    pub shop_name: Option<String>,
    pub email: Option<Email>,
    pub address: Option<String>,
    pub profile_picture: Option<String>,
    pub payment_id: Option<String>,
    pub aadhaar_id: Option<String>,
    pub payment_details: Option<PaymentDetails>,
}

/// Fields an admin may change on a seller account.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSellerUpdate {
    pub name: Option<String>,
    pub shop_name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub status: Option<SellerStatus>,
}
