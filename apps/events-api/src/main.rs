use axum_helpers::server::{create_production_app, health_router};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_events::LocalBlobStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;

    init_tracing(&config.environment);

    info!(database = %config.mongodb.database(), "Connecting to MongoDB");

    let mongo_client =
        database::mongodb::connect_from_config_with_retry(&config.mongodb, None).await?;
    let db = mongo_client.database(config.mongodb.database());

    api::events::init_indexes(&db).await?;

    let blobs = LocalBlobStore::open(&config.uploads).await.map_err(|e| {
        eyre::eyre!(
            "Failed to create upload directory {}: {}",
            config.uploads.dir.display(),
            e
        )
    })?;
    info!(dir = %blobs.root().display(), prefix = %config.uploads.url_prefix, "Blob store ready");

    let state = AppState {
        config,
        mongo_client,
        db,
        blobs: Arc::new(blobs),
    };

    let api_routes = api::routes(&state);

    let router = axum_helpers::create_router::<openapi::ApiDoc>(api_routes).await?;

    let app = router
        .merge(health_router(state.config.app))
        .merge(api::health::router(state.clone()))
        .merge(api::uploads::router(&state));

    info!("Starting College Events API with graceful shutdown (30s timeout)");

    let client = state.mongo_client.clone();
    create_production_app(
        app,
        &state.config.server,
        Duration::from_secs(30),
        database::mongodb::shutdown(client),
    )
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("College Events API shutdown complete");
    Ok(())
}
