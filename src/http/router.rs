//! Route table and middleware.

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use super::handlers::{self, admin};
use super::state::AppState;

/// Room for multipart framing and the `alt_text` part on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let upload_limit = DefaultBodyLimit::max(state.media.max_bytes() + MULTIPART_OVERHEAD);
    let media_dir = state.media.dir().to_path_buf();

    let storefront = Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/me", get(handlers::auth::me))
        .route("/products", get(handlers::catalog::list_products))
        .route("/products/:slug", get(handlers::catalog::get_product))
        .route("/categories", get(handlers::catalog::list_categories))
        .route("/categories/:slug", get(handlers::catalog::get_category))
        .route("/collections", get(handlers::catalog::list_collections))
        .route("/collections/:slug", get(handlers::catalog::get_collection))
        .route("/settings/store", get(handlers::catalog::store_settings))
        .route("/cart", get(handlers::cart::get_cart).delete(handlers::cart::clear))
        .route("/cart/items", post(handlers::cart::add_item))
        .route("/cart/items/:variant_id", put(handlers::cart::set_quantity).delete(handlers::cart::remove_item))
        .route("/addresses", get(handlers::addresses::list).post(handlers::addresses::create))
        .route("/addresses/:id", put(handlers::addresses::update).delete(handlers::addresses::delete))
        .route("/addresses/:id/default", post(handlers::addresses::set_default))
        .route("/checkout/quote", post(handlers::checkout::quote))
        .route("/checkout/stripe", post(handlers::checkout::start_stripe))
        .route("/checkout/curlec", post(handlers::checkout::start_curlec))
        .route("/checkout/curlec/verify", post(handlers::checkout::verify_curlec))
        .route("/orders", get(handlers::orders::list))
        .route("/orders/:id", get(handlers::orders::get))
        .route("/returns", get(handlers::returns::list).post(handlers::returns::create))
        .route("/returns/:id", get(handlers::returns::get))
        .route("/webhooks/stripe", post(handlers::webhooks::stripe))
        .route("/webhooks/curlec", post(handlers::webhooks::curlec));

    let back_office = Router::new()
        .route("/products", get(admin::products::list).post(admin::products::create))
        .route(
            "/products/:id",
            get(admin::products::get).put(admin::products::update).delete(admin::products::archive),
        )
        .route("/products/:id/variants", post(admin::products::add_variant))
        .route(
            "/products/:id/variants/:variant_id",
            put(admin::products::update_variant).delete(admin::products::delete_variant),
        )
        .route("/categories", post(admin::catalog::create_category))
        .route("/categories/:id", put(admin::catalog::update_category).delete(admin::catalog::delete_category))
        .route("/collections", get(admin::catalog::list_collections).post(admin::catalog::create_collection))
        .route("/collections/:id", put(admin::catalog::update_collection).delete(admin::catalog::delete_collection))
        .route(
            "/collections/:id/products",
            get(admin::catalog::collection_products).put(admin::catalog::set_collection_products),
        )
        .route("/inventory/transactions", get(admin::inventory::history).post(admin::inventory::record))
        .route("/shipping/zones", get(admin::shipping::list_zones).post(admin::shipping::create_zone))
        .route("/shipping/zones/:id", put(admin::shipping::update_zone).delete(admin::shipping::delete_zone))
        .route("/shipping/zones/:id/rates", post(admin::shipping::create_rate))
        .route("/shipping/rates", get(admin::shipping::list_rates))
        .route(
            "/shipping/rates/:id",
            get(admin::shipping::get_rate).put(admin::shipping::update_rate).delete(admin::shipping::delete_rate),
        )
        .route("/orders", get(admin::orders::list))
        .route("/orders/:id", get(admin::orders::get))
        .route("/orders/:id/status", put(admin::orders::update_status))
        .route("/orders/:id/cancel", post(admin::orders::cancel))
        .route("/returns", get(admin::returns::list))
        .route("/returns/:id", get(admin::returns::get))
        .route("/returns/:id/status", put(admin::returns::update_status))
        .route("/returns/:id/refund", post(admin::returns::refund))
        .route("/media", get(admin::media::list).post(admin::media::upload).layer(upload_limit))
        .route("/media/:id", axum::routing::delete(admin::media::delete))
        .route("/settings", get(admin::settings::get).put(admin::settings::update))
        .route("/customers", get(admin::customers::list))
        .route("/reports/sales", get(admin::reports::sales))
        .route("/reports/low-stock", get(admin::reports::low_stock));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", storefront)
        .nest("/api/admin", back_office)
        .nest_service("/media", ServeDir::new(media_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Any origin when none are configured.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}
