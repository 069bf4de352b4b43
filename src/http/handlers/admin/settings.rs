use std::collections::HashMap;

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::Value;

use crate::auth::AdminUser;
use crate::db::SettingsRepository;
use crate::domain::aggregates::settings::validate_update;
use crate::domain::aggregates::StoreSettings;
use crate::error::Result;
use crate::http::AppState;

/// Stored values next to the settings actually in effect.
#[derive(Debug, Serialize)]
pub struct SettingsView {
    pub values: HashMap<String, Value>,
    pub effective: StoreSettings,
}

impl From<HashMap<String, Value>> for SettingsView {
    fn from(values: HashMap<String, Value>) -> Self {
        let effective = StoreSettings::from_pairs(&values);
        Self { values, effective }
    }
}

pub async fn get(State(state): State<AppState>, AdminUser(_): AdminUser) -> Result<Json<SettingsView>> {
    Ok(Json(SettingsRepository::new(&state.pool).all().await?.into()))
}

/// Partial update; keys not sent keep their value.
pub async fn update(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(body): Json<HashMap<String, Value>>,
) -> Result<Json<SettingsView>> {
    validate_update(&body)?;
    let repo = SettingsRepository::new(&state.pool);
    repo.upsert(&body).await?;
    tracing::info!(admin_id = %admin.id, keys = ?body.keys().collect::<Vec<_>>(), "Settings updated");
    Ok(Json(repo.all().await?.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_view_falls_back_to_defaults() {
        let values = HashMap::from([("store_name".to_string(), json!("BINWAHAB Kuala Lumpur"))]);
        let view = SettingsView::from(values);
        assert_eq!(view.effective.store_name, "BINWAHAB Kuala Lumpur");
        assert_eq!(view.effective.currency, "MYR");
        assert_eq!(view.effective.return_window_days, 14);
    }
}
