//! Database access for the store.
//!
//! One repository per aggregate, each borrowing the shared `PgPool`.
//! Multi-table writes open a transaction inside the repository method.
//!
//! # Migrations
//!
//! SQL migrations live in `migrations/` and are embedded with
//! `sqlx::migrate!`; [`run_migrations`] applies them at startup.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;

pub mod addresses;
pub mod carts;
pub mod catalog;
pub mod inventory;
pub mod media;
pub mod orders;
pub mod products;
pub mod reports;
pub mod returns;
pub mod settings;
pub mod shipping;
pub mod users;

pub use addresses::AddressRepository;
pub use carts::CartRepository;
pub use catalog::{CategoryRepository, CollectionRepository};
pub use inventory::InventoryRepository;
pub use media::MediaRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use reports::ReportRepository;
pub use returns::ReturnRepository;
pub use settings::SettingsRepository;
pub use shipping::ShippingRepository;
pub use users::UserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                let what = db_err.constraint().unwrap_or("unique constraint").to_string();
                return RepositoryError::Conflict(format!("{what} already exists"));
            }
            if db_err.is_foreign_key_violation() {
                return RepositoryError::Conflict("referenced record does not exist or is still in use".to_string());
            }
        }
        RepositoryError::Database(err)
    }
}

/// Page request shared by list endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    pub const MAX_PER_PAGE: u32 = 100;

    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self { page: page.unwrap_or(1).max(1), per_page: per_page.unwrap_or(20).clamp(1, Self::MAX_PER_PAGE) }
    }

    pub fn limit(&self) -> i64 { i64::from(self.per_page) }
    pub fn offset(&self) -> i64 { i64::from(self.page - 1) * i64::from(self.per_page) }
}

/// One page of rows plus the total row count.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, page: Page) -> Self {
        Self { data, total, page: page.page, per_page: page.per_page }
    }
}

/// Wraps a free-text search term for `ILIKE`.
pub fn like_pattern(term: &str) -> String {
    let escaped = term.trim().replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

/// Create a `PostgreSQL` connection pool.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
}

/// Apply embedded migrations.
///
/// # Errors
///
/// Returns `RepositoryError::Migration` if a migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), RepositoryError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
