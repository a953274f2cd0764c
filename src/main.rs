use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fantasta::{
    bridge::AuctionStore, catalog, config::ServerConfig, directory::AuctionDirectory, store::Rtdb,
    ws,
};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fantasta=debug,tower_http=debug,axum=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting fantasta...");

    let config = ServerConfig::from_env();
    let db = Arc::new(Rtdb::new());
    let store = Arc::new(AuctionStore::new(Arc::clone(&db)).with_join_timeout(config.join_timeout));
    let directory = AuctionDirectory::new(store);

    // Seed the player catalog from the import pipeline's artifact, if configured
    if let Some(path) = &config.catalog_path {
        match tokio::fs::read_to_string(path).await {
            Ok(data) => match catalog::parse_catalog(&data) {
                Ok(players) => {
                    if let Err(e) = directory.save_catalog(&players).await {
                        tracing::error!("failed to persist catalog: {}", e);
                    }
                }
                Err(e) => tracing::error!("failed to parse catalog at {}: {}", path, e),
            },
            Err(e) => tracing::error!("failed to read catalog at {}: {}", path, e),
        }
    }

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .fallback_service(ServeDir::new("static"))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(directory);

    tracing::info!("Listening on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("failed to bind server address");
    axum::serve(listener, app).await.expect("server error");
}
