//! Business services for the API.
//!
//! - `auth` - password hashing, account registration/login and bearer tokens
//! - `checkout` - turning a cart into per-seller orders
//! - `uploads` - multipart image uploads

pub mod auth;
pub mod checkout;
pub mod uploads;
