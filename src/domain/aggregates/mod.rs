//! Aggregates module
pub mod address;
pub mod cart;
pub mod catalog;
pub mod inventory;
pub mod media;
pub mod order;
pub mod product;
pub mod returns;
pub mod settings;
pub mod shipping;
pub mod user;

pub use address::{Address, ShippingAddress};
pub use cart::{Cart, CartError, CartLine, CartView};
pub use catalog::{CatalogError, Category, Collection};
pub use inventory::{InventoryError, InventoryTransaction, InventoryTransactionKind, StockLevel};
pub use media::{Media, MediaError};
pub use order::{FulfillmentStatus, GatewayKind, Order, OrderDetail, OrderError, OrderItem, OrderStatus, PaymentStatus};
pub use product::{Product, ProductDetail, ProductError, ProductStatus, ProductVariant};
pub use returns::{ReturnDetail, ReturnError, ReturnRequest, ReturnStatus};
pub use settings::{PublicSettings, SettingsError, StoreSettings};
pub use shipping::{Parcel, RateKind, ShippingError, ShippingRate, ShippingZone};
pub use user::{User, UserRole};
