/// Favorites synchronizer
///
/// Presents one wishlist API regardless of who is signed in. Anonymous viewers
/// read and write the on-device store; signed-in viewers read a live feed of
/// their remote collection and write single documents to it. Switching viewer
/// tears down the old scope and opens the new one. Lists are never carried
/// across scopes, so favorites made while anonymous stay on the device and are
/// hidden after sign-in.
use chrono::Utc;
use serde::Serialize;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    sync::{broadcast, watch, Mutex},
    task::JoinHandle,
};

use crate::{
    db::Subscription,
    error::{AppError, AppResult},
    models::{FavoritesList, TitleId, TitleSummary, ToggleAction, Viewer},
    services::{
        backend::{decode_snapshot, FavoritesBackend, Feed, Stores},
        identity::IdentitySource,
    },
};

const NOTICE_BUFFER: usize = 32;

/// How long opening a scope may take before it is reported as failed
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle of one scope instance
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum LoadState {
    Uninitialized,
    Loading,
    Ready,
    /// Opening the scope failed
    Error(String),
}

/// What the presentation layer renders
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FavoritesView {
    pub scope: FavoritesBackend,
    pub state: LoadState,
    pub favorites: FavoritesList,
}

impl FavoritesView {
    fn uninitialized() -> Self {
        Self {
            scope: FavoritesBackend::Local,
            state: LoadState::Uninitialized,
            favorites: FavoritesList::new(),
        }
    }

    pub fn loading(&self) -> bool {
        matches!(self.state, LoadState::Uninitialized | LoadState::Loading)
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            LoadState::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// Confirmation of a successful toggle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToggleOutcome {
    pub action: ToggleAction,
    pub title_id: TitleId,
    pub display_name: String,
    pub scope: FavoritesBackend,
}

impl ToggleOutcome {
    /// Human-readable confirmation
    pub fn message(&self) -> String {
        match self.action {
            ToggleAction::Added => format!("{} was added to your wishlist", self.display_name),
            ToggleAction::Removed => {
                format!("{} was removed from your wishlist", self.display_name)
            }
        }
    }
}

struct ActiveScope {
    backend: FavoritesBackend,
    activated: bool,
    feed: Option<JoinHandle<()>>,
}

impl Drop for ActiveScope {
    fn drop(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.abort();
        }
    }
}

/// Owns the current viewer's wishlist and keeps its view current
pub struct FavoritesSynchronizer {
    stores: Stores,
    view: Arc<watch::Sender<FavoritesView>>,
    generation: Arc<AtomicU64>,
    active: Mutex<ActiveScope>,
    notices: broadcast::Sender<ToggleOutcome>,
    open_timeout: Duration,
}

impl FavoritesSynchronizer {
    pub fn new(stores: Stores) -> Self {
        Self {
            stores,
            view: Arc::new(watch::channel(FavoritesView::uninitialized()).0),
            generation: Arc::new(AtomicU64::new(0)),
            active: Mutex::new(ActiveScope {
                backend: FavoritesBackend::Local,
                activated: false,
                feed: None,
            }),
            notices: broadcast::channel(NOTICE_BUFFER).0,
            open_timeout: DEFAULT_OPEN_TIMEOUT,
        }
    }

    pub fn with_open_timeout(mut self, open_timeout: Duration) -> Self {
        self.open_timeout = open_timeout;
        self
    }

    /// The view as of now
    pub fn current_favorites(&self) -> FavoritesView {
        self.view.borrow().clone()
    }

    /// Receiver woken on every view change
    pub fn watch(&self) -> watch::Receiver<FavoritesView> {
        self.view.subscribe()
    }

    /// Receiver of toggle confirmations
    pub fn subscribe_notices(&self) -> broadcast::Receiver<ToggleOutcome> {
        self.notices.subscribe()
    }

    /// Waits until `scope` is active and has left the loading state
    pub async fn settled(&self, scope: &FavoritesBackend) -> FavoritesView {
        let mut rx = self.view.subscribe();
        let settled = rx
            .wait_for(|view| &view.scope == scope && !view.loading())
            .await
            .map(|view| view.clone());
        // The sender lives as long as `self`
        settled.unwrap_or_else(|_| self.current_favorites())
    }

    /// Switches to the scope for `viewer`, releasing the previous one
    pub async fn activate(&self, viewer: Option<&Viewer>) {
        let backend = FavoritesBackend::resolve(viewer);
        let mut active = self.active.lock().await;

        if let Some(feed) = active.feed.take() {
            feed.abort();
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        active.backend = backend.clone();
        active.activated = true;

        self.view.send_replace(FavoritesView {
            scope: backend.clone(),
            state: LoadState::Loading,
            favorites: FavoritesList::new(),
        });
        tracing::info!(scope = ?backend, "Activating wishlist scope");

        // The scope lock is held while opening, so a hung store must not hold it forever
        let opened = match tokio::time::timeout(self.open_timeout, backend.open(&self.stores)).await
        {
            Ok(opened) => opened,
            Err(_) => Err(AppError::StoreRead(format!(
                "opening the wishlist timed out after {}s",
                self.open_timeout.as_secs_f32()
            ))),
        };

        match opened {
            Ok(Feed::Static(list)) => {
                tracing::info!(count = list.len(), "Loaded local wishlist");
                self.view.send_modify(|view| {
                    view.state = LoadState::Ready;
                    view.favorites = list;
                });
            }
            Ok(Feed::Live(subscription)) => {
                let view = Arc::clone(&self.view);
                let current = Arc::clone(&self.generation);
                active.feed = Some(tokio::spawn(apply_feed(
                    subscription,
                    view,
                    current,
                    generation,
                )));
            }
            Err(e) => {
                tracing::error!(error = %e, scope = ?backend, "Wishlist failed to load");
                self.view.send_modify(|view| view.state = LoadState::Error(e.to_string()));
            }
        }
    }

    /// Keeps the active scope in step with `identity`
    ///
    /// Activates the current viewer immediately, then again whenever the
    /// viewer id changes. Profile-only changes don't reopen the scope.
    pub fn follow(self: &Arc<Self>, identity: &dyn IdentitySource) -> JoinHandle<()> {
        let mut viewers = identity.watch();
        let this = Arc::clone(self);

        tokio::spawn(async move {
            let mut current = viewers.borrow_and_update().clone();
            this.activate(current.as_ref()).await;

            while viewers.changed().await.is_ok() {
                let next = viewers.borrow_and_update().clone();
                if next.as_ref().map(|v| &v.id) != current.as_ref().map(|v| &v.id) {
                    this.activate(next.as_ref()).await;
                }
                current = next;
            }
            tracing::debug!("Identity source closed");
        })
    }

    /// Flips membership of `title` in the active scope
    ///
    /// The observed list is never changed ahead of the store. For the remote
    /// scope the new list arrives through the feed, possibly before or after
    /// this returns.
    pub async fn toggle(&self, title: TitleSummary) -> AppResult<ToggleOutcome> {
        let title_id = title.id;
        let display_name = title.display_name().to_string();

        let active = self.active.lock().await;
        if !active.activated {
            return Err(AppError::NotReady("no scope is active".to_string()));
        }
        let backend = active.backend.clone();

        let result = match &backend {
            FavoritesBackend::Local => {
                // The scope lock stays held so local read-modify-write cycles don't interleave
                let result = backend.toggle(&self.stores, title, Utc::now()).await;
                if let Ok(applied) = &result {
                    if let Some(list) = &applied.list {
                        let list = list.clone();
                        self.view.send_modify(|view| {
                            view.state = LoadState::Ready;
                            view.favorites = list;
                        });
                    }
                }
                drop(active);
                result
            }
            FavoritesBackend::Remote(_) => {
                drop(active);
                if self.current_favorites().state != LoadState::Ready {
                    return Err(AppError::NotReady(
                        "wishlist is still loading or failed to load".to_string(),
                    ));
                }
                backend.toggle(&self.stores, title, Utc::now()).await
            }
        };

        let applied = result.map_err(|e| {
            tracing::error!(error = %e, title_id = title_id, scope = ?backend, "Wishlist toggle failed");
            e
        })?;

        let outcome = ToggleOutcome {
            action: applied.action,
            title_id,
            display_name,
            scope: backend,
        };
        tracing::info!(
            title_id = title_id,
            action = ?outcome.action,
            scope = ?outcome.scope,
            "{}",
            outcome.message()
        );
        // Nobody listening is fine
        let _ = self.notices.send(outcome.clone());

        Ok(outcome)
    }

    /// Releases the active scope's feed
    pub async fn shutdown(&self) {
        let mut active = self.active.lock().await;
        if let Some(feed) = active.feed.take() {
            feed.abort();
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// Applies snapshots from a remote feed until the scope changes
async fn apply_feed(
    mut subscription: Subscription,
    view: Arc<watch::Sender<FavoritesView>>,
    current: Arc<AtomicU64>,
    generation: u64,
) {
    while let Some(event) = subscription.next().await {
        match event {
            Ok(snapshot) => {
                let list = decode_snapshot(snapshot);
                tracing::debug!(count = list.len(), "Wishlist snapshot received");
                let applied = view.send_if_modified(|view| {
                    if current.load(Ordering::SeqCst) != generation {
                        return false;
                    }
                    view.state = LoadState::Ready;
                    view.favorites = list;
                    true
                });
                if !applied {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Wishlist feed error");
                view.send_if_modified(|view| {
                    if current.load(Ordering::SeqCst) != generation
                        || view.state != LoadState::Loading
                    {
                        return false;
                    }
                    view.state = LoadState::Error(e.to_string());
                    true
                });
            }
        }
    }

    // Still the active scope, so the store closed the feed on its own
    let stopped = view.send_if_modified(|view| {
        if current.load(Ordering::SeqCst) != generation {
            return false;
        }
        view.state = LoadState::Error("live updates stopped".to_string());
        true
    });
    if stopped {
        tracing::warn!(generation = generation, "Wishlist feed ended unexpectedly");
    }
}
