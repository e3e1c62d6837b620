//! Domain models for the API.
//!
//! These types represent validated records separate from database row types.
//! Order types live in `haat_core::order` because their invariants are pure
//! rules; [`OrderView`] only decorates them for responses.

pub mod admin;
pub mod category;
pub mod order;
pub mod product;
pub mod seller;
pub mod user;

use serde::Serialize;

pub use admin::Admin;
pub use category::{Category, CategoryInput};
pub use order::OrderView;
pub use product::{AdminProductUpdate, Product, ProductInput, ProductQuery};
pub use seller::{AdminSellerUpdate, NewSeller, Seller, SellerUpdate};
pub use user::{
    AdminUserUpdate, Address, BankAccount, NewUser, PaymentDetails, Preferences, ProfileUpdate,
    User, ValidProfileUpdate,
};

/// `{"data": ...}` envelope used by the seller namespace.
#[derive(Debug, Serialize)]
pub struct Data<T> {
    pub data: T,
}

impl<T> Data<T> {
    pub const fn new(data: T) -> Self {
        Self { data }
    }
}

/// `{"message": ...}` body for acknowledgements.
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Trim an optional text field, treating blank input as absent.
pub(crate) fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}
