/// Backing stores for wishlists
///
/// Two kinds of store sit behind the favorites synchronizer: a synchronous
/// on-device key-value store for anonymous viewers, and a remote document
/// store partitioned per viewer that can push full snapshots to subscribers.
use serde_json::Value;
use std::fmt::Display;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{error::AppResult, models::ViewerId};

pub mod device;
pub mod memory;
pub mod redis;

pub use device::{FileDeviceStore, MemoryDeviceStore};
pub use memory::MemoryRemoteStore;
pub use self::redis::RedisRemoteStore;

/// Synchronous key-value store scoped to one device
pub trait DeviceStore: Send + Sync {
    /// Returns the raw value stored under `key`
    fn read(&self, key: &str) -> AppResult<Option<String>>;

    /// Replaces the value stored under `key`
    fn write(&self, key: &str, value: &str) -> AppResult<()>;

    /// Deletes `key`; deleting a missing key is not an error
    fn remove(&self, key: &str) -> AppResult<()>;
}

/// A collection in the remote store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CollectionPath {
    /// Favorited movies of one viewer
    Wishlist(ViewerId),
}

impl CollectionPath {
    /// Path of a single document within this collection
    pub fn document(&self, entry_key: &str) -> String {
        format!("{}/{}", self, entry_key)
    }
}

impl Display for CollectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectionPath::Wishlist(viewer_id) => write!(f, "wishlists/{}/movies", viewer_id),
        }
    }
}

/// A document as stored remotely
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDocument {
    pub key: String,
    pub data: Value,
}

/// Every document of a collection at one point in time
pub type Snapshot = Vec<RemoteDocument>;

/// Live feed of collection snapshots
///
/// The first delivery is the collection's contents at subscribe time; each
/// later delivery is the full contents after a change. Dropping the handle
/// stops the feed.
pub struct Subscription {
    snapshots: mpsc::Receiver<AppResult<Snapshot>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(snapshots: mpsc::Receiver<AppResult<Snapshot>>) -> Self {
        Self {
            snapshots,
            task: None,
        }
    }

    /// Ties a background task feeding this subscription to its lifetime
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    /// Waits for the next snapshot. `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<AppResult<Snapshot>> {
        self.snapshots.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Remote document store partitioned per viewer
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    /// Opens a live feed of `collection`
    ///
    /// Fails when the initial read fails; later faults arrive through the feed.
    async fn subscribe(&self, collection: &CollectionPath) -> AppResult<Subscription>;

    /// Reads one document as the store holds it now, `None` when absent
    async fn get_one(&self, collection: &CollectionPath, entry_key: &str)
        -> AppResult<Option<Value>>;

    /// Creates or replaces one document
    async fn write_one(
        &self,
        collection: &CollectionPath,
        entry_key: &str,
        document: Value,
    ) -> AppResult<()>;

    /// Deletes one document; deleting a missing document is not an error
    async fn delete_one(&self, collection: &CollectionPath, entry_key: &str) -> AppResult<()>;

    /// Store name for logging and debugging
    fn name(&self) -> &'static str;
}
