//! Back-office handlers. Every one takes [`crate::auth::AdminUser`].

pub mod catalog;
pub mod customers;
pub mod inventory;
pub mod media;
pub mod orders;
pub mod products;
pub mod reports;
pub mod returns;
pub mod settings;
pub mod shipping;
