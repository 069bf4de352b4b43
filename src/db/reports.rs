//! Back-office reporting queries.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::RepositoryError;

const CAPTURED: &str = "payment_status IN ('paid', 'partially_refunded', 'refunded')";

/// Orders that count as sales: payment captured and not cancelled since.
/// `alias` prefixes the columns, e.g. `"o."`.
fn counted(alias: &str) -> String {
    format!("{alias}{CAPTURED} AND {alias}status <> 'cancelled'")
}

#[derive(Debug, Clone, Serialize)]
pub struct SalesReport {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub order_count: i64,
    pub gross_revenue: Decimal,
    pub refunded: Decimal,
    pub net_revenue: Decimal,
    pub average_order_value: Decimal,
    /// Paid orders cancelled afterwards, left out of the figures above.
    pub cancelled_count: i64,
    pub cancelled_amount_paid: Decimal,
    pub daily: Vec<DailySales>,
    pub top_products: Vec<TopProduct>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DailySales {
    pub day: NaiveDate,
    pub order_count: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TopProduct {
    pub product_id: Option<Uuid>,
    pub name: String,
    pub quantity: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LowStockVariant {
    pub variant_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub sku: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub stock: i32,
    pub reserved_stock: i32,
    pub available: i32,
}

pub struct ReportRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReportRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Sales between `from` (inclusive) and `to` (exclusive).
    pub async fn sales(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<SalesReport, RepositoryError> {
        let (order_count, gross_revenue, refunded): (i64, Decimal, Decimal) = sqlx::query_as(&format!(
            "SELECT COUNT(*), COALESCE(SUM(total), 0), COALESCE(SUM(refunded_total), 0) \
             FROM orders WHERE {} AND created_at >= $1 AND created_at < $2",
            counted("")
        ))
        .bind(from)
        .bind(to)
        .fetch_one(self.pool)
        .await?;

        let (cancelled_count, cancelled_amount_paid): (i64, Decimal) = sqlx::query_as(&format!(
            "SELECT COUNT(*), COALESCE(SUM(amount_paid), 0) \
             FROM orders WHERE {CAPTURED} AND status = 'cancelled' AND created_at >= $1 AND created_at < $2"
        ))
        .bind(from)
        .bind(to)
        .fetch_one(self.pool)
        .await?;

        let daily = sqlx::query_as::<_, DailySales>(&format!(
            "SELECT (created_at AT TIME ZONE 'UTC')::date AS day, COUNT(*) AS order_count, COALESCE(SUM(total), 0) AS revenue \
             FROM orders WHERE {} AND created_at >= $1 AND created_at < $2 GROUP BY day ORDER BY day",
            counted("")
        ))
        .bind(from)
        .bind(to)
        .fetch_all(self.pool)
        .await?;

        let top_products = sqlx::query_as::<_, TopProduct>(&format!(
            "SELECT oi.product_id, MIN(oi.name) AS name, SUM(oi.quantity)::bigint AS quantity, SUM(oi.total) AS revenue \
             FROM order_items oi JOIN orders o ON o.id = oi.order_id \
             WHERE {} AND o.created_at >= $1 AND o.created_at < $2 \
             GROUP BY oi.product_id ORDER BY quantity DESC, revenue DESC LIMIT 10",
            counted("o.")
        ))
        .bind(from)
        .bind(to)
        .fetch_all(self.pool)
        .await?;

        Ok(SalesReport {
            from,
            to,
            order_count,
            gross_revenue,
            refunded,
            net_revenue: gross_revenue - refunded,
            average_order_value: average(gross_revenue, order_count),
            cancelled_count,
            cancelled_amount_paid,
            daily,
            top_products,
        })
    }

    /// Variants of non-archived products at or below `threshold` available units.
    pub async fn low_stock(&self, threshold: i32) -> Result<Vec<LowStockVariant>, RepositoryError> {
        Ok(sqlx::query_as::<_, LowStockVariant>(
            "SELECT v.id AS variant_id, p.id AS product_id, p.name AS product_name, v.sku, v.size, v.color, \
                    v.stock, v.reserved_stock, GREATEST(v.stock - v.reserved_stock, 0) AS available \
             FROM product_variants v JOIN products p ON p.id = v.product_id \
             WHERE p.status <> 'archived' AND v.stock - v.reserved_stock <= $1 \
             ORDER BY available, p.name, v.sku",
        )
        .bind(threshold)
        .fetch_all(self.pool)
        .await?)
    }
}

pub fn average(revenue: Decimal, orders: i64) -> Decimal {
    if orders == 0 { Decimal::ZERO } else { (revenue / Decimal::from(orders)).round_dp(2) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_order_value() {
        assert_eq!(average(Decimal::ZERO, 0), Decimal::ZERO);
        assert_eq!(average(Decimal::new(10000, 2), 3), Decimal::new(3333, 2));
    }

    #[test]
    fn test_sales_leave_out_cancelled_orders() {
        assert_eq!(
            counted("o."),
            "o.payment_status IN ('paid', 'partially_refunded', 'refunded') AND o.status <> 'cancelled'"
        );
        assert!(counted("").starts_with("payment_status IN"));
    }
}
