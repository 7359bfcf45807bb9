use std::sync::Arc;
use tokio::task::AbortHandle;

use crate::{
    config::default_tmdb_image_base_url,
    config::default_wishlist_key,
    db::{MemoryDeviceStore, MemoryRemoteStore},
    services::{
        backend::Stores,
        favorites::FavoritesSynchronizer,
        identity::SessionIdentity,
        providers::{MetadataProvider, UnconfiguredProvider},
    },
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub favorites: Arc<FavoritesSynchronizer>,
    pub identity: Arc<SessionIdentity>,
    pub metadata: Arc<dyn MetadataProvider>,
    /// Prefix turning artwork paths into URLs
    pub image_base_url: String,
    follower: AbortHandle,
}

impl AppState {
    /// Builds the state and starts following identity changes
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        stores: Stores,
        metadata: Arc<dyn MetadataProvider>,
        image_base_url: String,
    ) -> Self {
        let favorites = Arc::new(FavoritesSynchronizer::new(stores));
        let identity = Arc::new(SessionIdentity::new());
        let follower = favorites.follow(identity.as_ref()).abort_handle();

        Self {
            favorites,
            identity,
            metadata,
            image_base_url,
            follower,
        }
    }

    /// Stops following identity changes and releases the active scope
    pub async fn shutdown(&self) {
        self.follower.abort();
        self.favorites.shutdown().await;
    }

    /// State backed entirely by process memory, with no metadata provider
    pub fn in_memory() -> Self {
        Self::with_metadata(Arc::new(UnconfiguredProvider))
    }

    /// In-memory stores with the given metadata provider
    pub fn with_metadata(metadata: Arc<dyn MetadataProvider>) -> Self {
        let stores = Stores {
            device: Arc::new(MemoryDeviceStore::new()),
            remote: Arc::new(MemoryRemoteStore::new()),
            wishlist_key: default_wishlist_key(),
        };
        Self::start(stores, metadata, default_tmdb_image_base_url())
    }
}
