use native_sso_server::AppResources;
use native_sso_server::api::start_webserver;
use native_sso_server::config::load_config;
use sea_orm::Database;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "native_sso_server=info,tower_http=info,sea_orm=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    initialize_tracing();

    let config = Arc::new(load_config()?);
    tracing::info!(
        issuer = %config.oauth2.issuer_url,
        code_lifetime = config.oauth2.authorization_code_lifetime,
        access_token_lifetime = config.oauth2.access_token_lifetime,
        refresh_token_lifetime = config.oauth2.refresh_token_lifetime,
        "oauth2 configuration"
    );

    let db = Arc::new(Database::connect(&config.database_url).await?);

    start_webserver(AppResources { db, config }).await?;
    Ok(())
}
