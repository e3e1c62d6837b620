//! Haat Core - Domain types and rules for the Haat marketplace.
//!
//! This crate is shared by every Haat component:
//! - `api` - REST service for shoppers, sellers and admins
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP. Repositories in the `api` crate load records, call the
//! rules defined here, and persist the result.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, emails, phone numbers, roles and statuses
//! - [`order`] - Order aggregate: line items, payment split, status history
//! - [`cart`] - Cart, saved-for-later and wishlist reconciliation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod order;
pub mod types;

pub use types::*;
