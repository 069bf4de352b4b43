use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::auth::AdminUser;
use crate::db::reports::{LowStockVariant, SalesReport};
use crate::db::{ReportRepository, SettingsRepository};
use crate::error::{AppError, Result};
use crate::http::AppState;

pub const DEFAULT_REPORT_DAYS: i64 = 30;

#[derive(Debug, Default, Deserialize)]
pub struct SalesQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl SalesQuery {
    /// `[from, to)`; defaults to the last thirty days.
    fn window(&self, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let to = self.to.unwrap_or(now);
        let from = self.from.unwrap_or(to - Duration::days(DEFAULT_REPORT_DAYS));
        if from >= to {
            return Err(AppError::bad_request("`from` must be before `to`"));
        }
        Ok((from, to))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LowStockQuery {
    pub threshold: Option<i32>,
}

pub async fn sales(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<SalesQuery>,
) -> Result<Json<SalesReport>> {
    let (from, to) = query.window(Utc::now())?;
    Ok(Json(ReportRepository::new(&state.pool).sales(from, to).await?))
}

pub async fn low_stock(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<LowStockQuery>,
) -> Result<Json<Vec<LowStockVariant>>> {
    let threshold = match query.threshold {
        Some(t) if t < 0 => return Err(AppError::bad_request("threshold must not be negative")),
        Some(t) => t,
        None => SettingsRepository::new(&state.pool).load().await?.low_stock_threshold,
    };
    Ok(Json(ReportRepository::new(&state.pool).low_stock(threshold).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_window() {
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        let (from, to) = SalesQuery::default().window(now).unwrap();
        assert_eq!(to, now);
        assert_eq!(from, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_inverted_window_rejected() {
        let now = Utc::now();
        let query = SalesQuery { from: Some(now), to: Some(now - Duration::days(1)) };
        assert!(query.window(now).is_err());
    }
}
