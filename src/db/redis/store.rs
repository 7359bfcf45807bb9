use futures::StreamExt;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::mpsc;

use crate::db::{CollectionPath, RemoteDocument, RemoteStore, Snapshot, Subscription};
use crate::error::{AppError, AppResult};

const FEED_BUFFER: usize = 16;

/// Creates a Redis client for the wishlist store
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Remote store backed by Redis
///
/// A collection is a hash keyed by the collection path, one field per
/// document holding its JSON body. Every write and delete publishes on
/// `{collection}:changed`; subscribers re-read the whole hash when notified.
#[derive(Clone)]
pub struct RedisRemoteStore {
    client: Client,
    conn: ConnectionManager,
}

impl RedisRemoteStore {
    /// Connects to Redis
    pub async fn new(client: Client) -> AppResult<Self> {
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| AppError::StoreRead(format!("Redis connection failed: {}", e)))?;

        Ok(Self { client, conn })
    }

    fn change_channel(collection: &CollectionPath) -> String {
        format!("{}:changed", collection)
    }

    /// Reads every document of a collection, ordered by key
    async fn read_collection(
        conn: &mut ConnectionManager,
        collection: &str,
    ) -> AppResult<Snapshot> {
        let raw: HashMap<String, String> = conn.hgetall(collection).await.map_err(|e| {
            tracing::warn!(error = %e, collection = %collection, "Redis hgetall failed");
            AppError::StoreRead(e.to_string())
        })?;

        let mut documents: Snapshot = raw
            .into_iter()
            .filter_map(|(key, json)| match serde_json::from_str::<Value>(&json) {
                Ok(data) => Some(RemoteDocument { key, data }),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        collection = %collection,
                        key = %key,
                        "Skipping undecodable document"
                    );
                    None
                }
            })
            .collect();
        documents.sort_by(|a, b| a.key.cmp(&b.key));

        Ok(documents)
    }

    /// Applies one change together with its notice in a single MULTI/EXEC
    async fn commit(
        &self,
        collection: &CollectionPath,
        entry_key: &str,
        mut change: redis::Pipeline,
    ) -> AppResult<()> {
        let mut conn = self.conn.clone();
        change
            .publish(Self::change_channel(collection), entry_key)
            .ignore();

        let _: () = change.query_async(&mut conn).await.map_err(|e| {
            tracing::error!(error = %e, document = %collection.document(entry_key), "Redis write failed");
            AppError::StoreWrite(e.to_string())
        })?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RemoteStore for RedisRemoteStore {
    async fn subscribe(&self, collection: &CollectionPath) -> AppResult<Subscription> {
        let key = collection.to_string();
        let channel = Self::change_channel(collection);

        // Listen before the first read so no change slips in between
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| AppError::StoreRead(format!("Redis pubsub connection failed: {}", e)))?;
        pubsub
            .subscribe(&channel)
            .await
            .map_err(|e| AppError::StoreRead(e.to_string()))?;

        let mut conn = self.conn.clone();
        let initial = Self::read_collection(&mut conn, &key).await?;

        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        tx.try_send(Ok(initial))
            .map_err(|e| AppError::Internal(format!("Subscription feed closed: {}", e)))?;

        let task = tokio::spawn(async move {
            let mut messages = pubsub.into_on_message();
            while messages.next().await.is_some() {
                let snapshot = Self::read_collection(&mut conn, &key).await;
                if tx.send(snapshot).await.is_err() {
                    break;
                }
            }
            tracing::debug!(collection = %key, "Redis subscription closed");
        });

        tracing::info!(collection = %collection, "Subscribed to Redis collection");

        Ok(Subscription::new(rx).with_task(task))
    }

    async fn get_one(
        &self,
        collection: &CollectionPath,
        entry_key: &str,
    ) -> AppResult<Option<Value>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .hget(collection.to_string(), entry_key)
            .await
            .map_err(|e| AppError::StoreRead(e.to_string()))?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn write_one(
        &self,
        collection: &CollectionPath,
        entry_key: &str,
        document: Value,
    ) -> AppResult<()> {
        let json = serde_json::to_string(&document)?;
        let mut change = redis::pipe();
        change
            .atomic()
            .hset(collection.to_string(), entry_key, json)
            .ignore();

        self.commit(collection, entry_key, change).await
    }

    async fn delete_one(&self, collection: &CollectionPath, entry_key: &str) -> AppResult<()> {
        let mut change = redis::pipe();
        change
            .atomic()
            .hdel(collection.to_string(), entry_key)
            .ignore();

        self.commit(collection, entry_key, change).await
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ViewerId;
    use serde_json::json;

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
    }

    async fn store() -> RedisRemoteStore {
        let client = create_redis_client(&redis_url()).unwrap();
        RedisRemoteStore::new(client).await.unwrap()
    }

    #[test]
    fn test_change_channel() {
        let collection = CollectionPath::Wishlist(ViewerId::new("U1"));
        assert_eq!(
            RedisRemoteStore::change_channel(&collection),
            "wishlists/U1/movies:changed"
        );
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_write_then_subscribe_reads_document() {
        let store = store().await;
        let collection = CollectionPath::Wishlist(ViewerId::new("redis_test_read"));

        store.write_one(&collection, "7", json!({ "id": 7, "title": "Dune" })).await.unwrap();

        let mut subscription = store.subscribe(&collection).await.unwrap();
        let snapshot = subscription.next().await.unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].key, "7");
        assert_eq!(snapshot[0].data["title"], "Dune");
        assert_eq!(
            store.get_one(&collection, "7").await.unwrap().unwrap()["title"],
            "Dune"
        );

        store.delete_one(&collection, "7").await.unwrap();
        assert!(store.get_one(&collection, "7").await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_subscription_receives_changes() {
        let store = store().await;
        let collection = CollectionPath::Wishlist(ViewerId::new("redis_test_feed"));

        let mut subscription = store.subscribe(&collection).await.unwrap();
        assert!(subscription.next().await.unwrap().unwrap().is_empty());

        store.write_one(&collection, "42", json!({ "id": 42 })).await.unwrap();
        let snapshot = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            subscription.next(),
        )
        .await
        .unwrap()
        .unwrap()
        .unwrap();
        assert_eq!(snapshot[0].key, "42");

        store.delete_one(&collection, "42").await.unwrap();
        let snapshot = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            subscription.next(),
        )
        .await
        .unwrap()
        .unwrap()
        .unwrap();
        assert!(snapshot.is_empty());
    }
}
