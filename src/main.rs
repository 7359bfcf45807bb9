use std::sync::Arc;

use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use wishlist_sync::{
    api::{create_router, AppState},
    config::Config,
    db::{
        redis::create_redis_client, DeviceStore, FileDeviceStore, MemoryRemoteStore,
        RedisRemoteStore, RemoteStore,
    },
    services::{
        backend::Stores,
        providers::{tmdb::TmdbProvider, MetadataProvider, UnconfiguredProvider},
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("wishlist_sync=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let device: Arc<dyn DeviceStore> = Arc::new(FileDeviceStore::open(&config.device_store_dir)?);

    let remote: Arc<dyn RemoteStore> = match &config.redis_url {
        Some(redis_url) => {
            let client = create_redis_client(redis_url)?;
            Arc::new(RedisRemoteStore::new(client).await?)
        }
        None => {
            tracing::warn!("REDIS_URL not set, signed-in wishlists live in memory only");
            Arc::new(MemoryRemoteStore::new())
        }
    };

    let metadata: Arc<dyn MetadataProvider> = match &config.tmdb_api_key {
        Some(api_key) => Arc::new(TmdbProvider::new(
            api_key.clone(),
            config.tmdb_api_url.clone(),
            config.tmdb_language.clone(),
        )),
        None => Arc::new(UnconfiguredProvider),
    };

    tracing::info!(
        remote_store = remote.name(),
        metadata_provider = metadata.name(),
        device_store = %config.device_store_dir.display(),
        "Wishlist stores ready"
    );

    let stores = Stores {
        device,
        remote,
        wishlist_key: config.wishlist_key.clone(),
    };
    let state = AppState::start(stores, metadata, config.tmdb_image_base_url.clone());
    let app = create_router(state.clone()).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(addr = %config.bind_addr(), "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    state.shutdown().await;

    Ok(())
}
