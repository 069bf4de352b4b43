//! BINWAHAB store backend
//!
//! Storefront and back-office API for a Malaysian fashion label.
//!
//! ## Features
//! - Catalog: products with size/colour variants, categories, collections
//! - Customer accounts, address book and persistent carts
//! - Checkout through Stripe or Curlec, confirmed by signed webhooks
//! - Order and return workflows with inventory ledger
//! - Shipping zones with flat, order-value and weight rates
//! - Media library, store settings and sales reports

pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod http;
pub mod payments;
pub mod services;
pub mod telemetry;

pub use config::Config;
pub use error::{AppError, Result};
