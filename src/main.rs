//! Pustakalay Server - community book lending
//!
//! REST API server for donating, browsing and borrowing books.

use std::net::SocketAddr;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pustakalay_server::{api, config::AppConfig, repository, services::seed, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("pustakalay_server={},tower_http=debug", config.logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Pustakalay Server v{}", env!("CARGO_PKG_VERSION"));

    let pool = repository::connect(&config.database)
        .await
        .context("Failed to open database")?;

    tracing::info!("Database ready");

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    let state = AppState::new(config, pool);

    let seeded = seed::run(&state.services, &state.config.seed)
        .await
        .context("Failed to seed database")?;
    if seeded > 0 {
        tracing::info!(seeded, "Sample data added");
    }

    let app = api::create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
