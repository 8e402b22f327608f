//! Helplink API server entry point

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use helplink_api::{routes, store::PgStore, AppState, Config};
use helplink_shared::ChatStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present; environment wins
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    let store: Arc<dyn ChatStore> = Arc::new(PgStore::new(pool));

    let bind_address = config.bind_address.clone();
    let state = AppState::new(config, store);
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %bind_address, "Helplink API listening");

    axum::serve(listener, app).await?;

    Ok(())
}
