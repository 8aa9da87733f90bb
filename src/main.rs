use std::sync::Arc;

use anyhow::Context;
use champions_api::{champions::ChampionService, config::Settings, db::SqliteDocumentStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting champions server...");

    let settings = Settings::from_env().context("Invalid server configuration")?;

    let store = SqliteDocumentStore::connect(&settings.database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Database connection established.");

    let app = champions_api::app(ChampionService::new(Arc::new(store)));

    let addr = settings.addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("Failed to start server")?;
    Ok(())
}
