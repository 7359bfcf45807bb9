use tokio::sync::watch;

use crate::models::Viewer;

/// Source of the current viewer
///
/// `None` means nobody is signed in. That's a valid state, not an error.
pub trait IdentitySource: Send + Sync {
    /// The viewer as of now
    fn current(&self) -> Option<Viewer>;

    /// Receiver that is notified whenever the viewer changes
    fn watch(&self) -> watch::Receiver<Option<Viewer>>;
}

/// Identity reported by the embedding shell after it talks to the auth provider
#[derive(Debug)]
pub struct SessionIdentity {
    viewer: watch::Sender<Option<Viewer>>,
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionIdentity {
    /// Starts anonymous
    pub fn new() -> Self {
        Self {
            viewer: watch::channel(None).0,
        }
    }

    pub fn sign_in(&self, viewer: Viewer) {
        self.set(Some(viewer));
    }

    pub fn sign_out(&self) {
        self.set(None);
    }

    /// Replaces the viewer. Watchers are only woken when it actually changed.
    pub fn set(&self, viewer: Option<Viewer>) {
        let changed = self.viewer.send_if_modified(|current| {
            if *current == viewer {
                false
            } else {
                *current = viewer;
                true
            }
        });

        if changed {
            match self.viewer.borrow().as_ref() {
                Some(v) => tracing::info!(viewer_id = %v.id, "Viewer signed in"),
                None => tracing::info!("Viewer signed out"),
            }
        }
    }
}

impl IdentitySource for SessionIdentity {
    fn current(&self) -> Option<Viewer> {
        self.viewer.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<Viewer>> {
        self.viewer.subscribe()
    }
}
