//! BINWAHAB store API server

use anyhow::{Context, Result};
use secrecy::ExposeSecret;

use binwahab_store::auth::{AuthService, TokenSigner};
use binwahab_store::db::{self, SettingsRepository};
use binwahab_store::http::{create_router, AppState};
use binwahab_store::services::{EventPublisher, Mailer};
use binwahab_store::{telemetry, Config};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init();
    let config = Config::from_env().context("loading configuration")?;

    let pool = db::create_pool(config.database_url()).await.context("connecting to Postgres")?;
    db::run_migrations(&pool).await.context("running migrations")?;

    if let Some(admin) = &config.bootstrap_admin {
        let tokens = TokenSigner::new(config.auth_secret.clone());
        AuthService::new(&pool, &tokens)
            .ensure_admin(&admin.email, &admin.name, admin.password.expose_secret())
            .await
            .context("ensuring bootstrap admin")?;
    }

    let settings = SettingsRepository::new(&pool).load().await?;
    let events = EventPublisher::connect(config.nats_url.as_deref()).await;
    let mailer = Mailer::new(config.smtp.as_ref(), &settings.store_name)?;

    let addr = config.socket_addr();
    tracing::info!(
        stripe = config.stripe.is_some(),
        curlec = config.curlec.is_some(),
        nats = events.is_enabled(),
        smtp = mailer.is_enabled(),
        "Starting BINWAHAB store"
    );
    let app = create_router(AppState::new(pool, config, events, mailer));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");
    axum::serve(listener, app).await?;
    Ok(())
}
