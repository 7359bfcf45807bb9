use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    db::{CollectionPath, DeviceStore, RemoteStore, Snapshot, Subscription},
    error::{AppError, AppResult},
    models::{FavoriteEntry, FavoritesList, TitleSummary, ToggleAction, Viewer, ViewerId},
    services::sanitize::wishlist_document,
};

/// The stores a backend can route to
#[derive(Clone)]
pub struct Stores {
    pub device: Arc<dyn DeviceStore>,
    pub remote: Arc<dyn RemoteStore>,
    /// Device store key holding the anonymous wishlist
    pub wishlist_key: String,
}

/// Which store holds the active wishlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "viewer_id", rename_all = "lowercase")]
pub enum FavoritesBackend {
    /// Anonymous viewer, one list per device
    Local,
    /// Signed-in viewer, one list per viewer id
    Remote(ViewerId),
}

/// How a backend delivers its list
pub enum Feed {
    /// Read once; changes only through this process's own toggles
    Static(FavoritesList),
    /// Pushes a full snapshot on every change
    Live(Subscription),
}

/// Result of a toggle that reached the store
#[derive(Debug)]
pub struct Applied {
    pub action: ToggleAction,
    /// The list as written, when the write itself is authoritative
    pub list: Option<FavoritesList>,
}

impl FavoritesBackend {
    pub fn resolve(viewer: Option<&Viewer>) -> Self {
        match viewer {
            Some(viewer) => FavoritesBackend::Remote(viewer.id.clone()),
            None => FavoritesBackend::Local,
        }
    }

    pub fn collection(&self) -> Option<CollectionPath> {
        match self {
            FavoritesBackend::Local => None,
            FavoritesBackend::Remote(viewer_id) => {
                Some(CollectionPath::Wishlist(viewer_id.clone()))
            }
        }
    }

    /// Opens the backing store for reading
    pub async fn open(&self, stores: &Stores) -> AppResult<Feed> {
        match self {
            FavoritesBackend::Local => {
                let list = load_local(stores.device.as_ref(), &stores.wishlist_key)?;
                Ok(Feed::Static(list))
            }
            FavoritesBackend::Remote(viewer_id) => {
                let collection = CollectionPath::Wishlist(viewer_id.clone());
                let subscription = stores.remote.subscribe(&collection).await.map_err(|e| {
                    tracing::error!(error = %e, collection = %collection, "Wishlist subscribe failed");
                    as_read_failure(e)
                })?;
                Ok(Feed::Live(subscription))
            }
        }
    }

    /// Flips `title`'s membership in the backing store
    ///
    /// Membership is read from the store itself, never from an observed list
    /// that may lag behind earlier writes.
    pub async fn toggle(
        &self,
        stores: &Stores,
        title: TitleSummary,
        now: DateTime<Utc>,
    ) -> AppResult<Applied> {
        match self {
            FavoritesBackend::Local => {
                let stored = load_local(stores.device.as_ref(), &stores.wishlist_key)
                    .map_err(as_write_failure)?;
                let (list, action) = stored.toggled(title, now);
                let json = serde_json::to_string(&list)?;
                stores
                    .device
                    .write(&stores.wishlist_key, &json)
                    .map_err(as_write_failure)?;

                Ok(Applied {
                    action,
                    list: Some(list),
                })
            }
            FavoritesBackend::Remote(viewer_id) => {
                let collection = CollectionPath::Wishlist(viewer_id.clone());
                let entry_key = title.id.to_string();

                let existing = stores
                    .remote
                    .get_one(&collection, &entry_key)
                    .await
                    .map_err(as_write_failure)?;

                let action = if existing.is_some() {
                    stores
                        .remote
                        .delete_one(&collection, &entry_key)
                        .await
                        .map_err(as_write_failure)?;
                    ToggleAction::Removed
                } else {
                    let entry = FavoriteEntry::new(title, now);
                    let document = wishlist_document(&entry.title, now, entry.status)?;
                    stores
                        .remote
                        .write_one(&collection, &entry_key, document)
                        .await
                        .map_err(as_write_failure)?;
                    ToggleAction::Added
                };

                Ok(Applied { action, list: None })
            }
        }
    }
}

/// Reads the anonymous wishlist from the device store
///
/// A value that doesn't parse is cleared and treated as an empty list.
pub fn load_local(device: &dyn DeviceStore, key: &str) -> AppResult<FavoritesList> {
    let Some(raw) = device.read(key).map_err(as_read_failure)? else {
        return Ok(FavoritesList::new());
    };

    match serde_json::from_str::<FavoritesList>(&raw) {
        Ok(list) => Ok(list),
        Err(e) => {
            tracing::warn!(error = %e, key = %key, "Discarding corrupt local wishlist");
            device.remove(key).map_err(as_read_failure)?;
            Ok(FavoritesList::new())
        }
    }
}

/// Turns a remote snapshot into a list in arrival order
///
/// Documents that don't decode as wishlist entries are skipped.
pub fn decode_snapshot(snapshot: Snapshot) -> FavoritesList {
    let entries = snapshot
        .into_iter()
        .filter_map(|doc| match serde_json::from_value::<FavoriteEntry>(doc.data) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, key = %doc.key, "Skipping undecodable wishlist document");
                None
            }
        });
    FavoritesList::by_arrival(entries)
}

fn as_read_failure(err: AppError) -> AppError {
    match err {
        AppError::StoreRead(_) => err,
        other => AppError::StoreRead(other.to_string()),
    }
}

fn as_write_failure(err: AppError) -> AppError {
    match err {
        AppError::StoreWrite(_) => err,
        other => AppError::StoreWrite(other.to_string()),
    }
}
