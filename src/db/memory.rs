use serde_json::Value;
use std::{collections::HashMap, sync::Mutex};
use tokio::sync::{mpsc, watch};

use super::{CollectionPath, RemoteDocument, RemoteStore, Snapshot, Subscription};
use crate::error::{AppError, AppResult};

const FEED_BUFFER: usize = 16;

/// Remote store kept in process memory
///
/// Documents keep write order. Subscribers see the latest snapshot after each
/// change; bursts of writes may coalesce into one delivery.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    collections: Mutex<HashMap<CollectionPath, watch::Sender<Snapshot>>>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current documents of a collection
    pub fn documents(&self, collection: &CollectionPath) -> AppResult<Snapshot> {
        let collections = self.lock()?;
        Ok(collections
            .get(collection)
            .map(|sender| sender.borrow().clone())
            .unwrap_or_default())
    }

    /// Current body of one document
    pub fn document(&self, collection: &CollectionPath, entry_key: &str) -> AppResult<Option<Value>> {
        Ok(self
            .documents(collection)?
            .into_iter()
            .find(|doc| doc.key == entry_key)
            .map(|doc| doc.data))
    }

    fn lock(
        &self,
    ) -> AppResult<std::sync::MutexGuard<'_, HashMap<CollectionPath, watch::Sender<Snapshot>>>> {
        self.collections
            .lock()
            .map_err(|_| AppError::Internal("remote store lock poisoned".to_string()))
    }

    fn modify(
        &self,
        collection: &CollectionPath,
        change: impl FnOnce(&mut Snapshot),
    ) -> AppResult<()> {
        let mut collections = self.lock()?;
        let sender = collections
            .entry(collection.clone())
            .or_insert_with(|| watch::channel(Vec::new()).0);
        sender.send_modify(change);
        Ok(())
    }
}

#[async_trait::async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn subscribe(&self, collection: &CollectionPath) -> AppResult<Subscription> {
        let mut changes = {
            let mut collections = self.lock()?;
            collections
                .entry(collection.clone())
                .or_insert_with(|| watch::channel(Vec::new()).0)
                .subscribe()
        };

        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        let task = tokio::spawn(async move {
            loop {
                let snapshot = changes.borrow_and_update().clone();
                if tx.send(Ok(snapshot)).await.is_err() {
                    break;
                }
                if changes.changed().await.is_err() {
                    break;
                }
            }
        });

        tracing::debug!(collection = %collection, "Subscribed to in-memory collection");

        Ok(Subscription::new(rx).with_task(task))
    }

    async fn get_one(
        &self,
        collection: &CollectionPath,
        entry_key: &str,
    ) -> AppResult<Option<Value>> {
        self.document(collection, entry_key)
            .map_err(|e| AppError::StoreRead(e.to_string()))
    }

    async fn write_one(
        &self,
        collection: &CollectionPath,
        entry_key: &str,
        document: Value,
    ) -> AppResult<()> {
        self.modify(collection, |docs| {
            match docs.iter_mut().find(|doc| doc.key == entry_key) {
                Some(existing) => existing.data = document,
                None => docs.push(RemoteDocument {
                    key: entry_key.to_string(),
                    data: document,
                }),
            }
        })
        .map_err(|e| AppError::StoreWrite(e.to_string()))
    }

    async fn delete_one(&self, collection: &CollectionPath, entry_key: &str) -> AppResult<()> {
        self.modify(collection, |docs| docs.retain(|doc| doc.key != entry_key))
            .map_err(|e| AppError::StoreWrite(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
