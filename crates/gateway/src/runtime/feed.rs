//! Change notifications.
//!
//! Administrative mutations publish a cue on the [`ChangeFeed`]; a single
//! background listener reacts by reloading the settings and identity
//! stores. The cue only says "something changed"; its origin is kept for
//! logging and never interpreted.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use cg_sessions::IdentityStore;

use super::settings::SettingsStore;

#[derive(Debug, Clone, Serialize)]
pub struct ChangeCue {
    /// What published the cue (e.g. `"identities"`, `"refresh"`).
    pub origin: String,
}

#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeCue>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    /// Publish a cue. Having no listener is not an error.
    pub fn publish(&self, origin: impl Into<String>) {
        let origin = origin.into();
        if self.tx.send(ChangeCue { origin: origin.clone() }).is_err() {
            tracing::debug!(origin = %origin, "change cue dropped (no listener)");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeCue> {
        self.tx.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("receivers", &self.tx.receiver_count())
            .finish()
    }
}

/// Spawn the listener that reloads both stores on every cue.
///
/// A lagged receiver still triggers one reload, which covers every cue it
/// missed.
pub fn spawn_listener(
    feed: &ChangeFeed,
    settings: Arc<SettingsStore>,
    identities: Arc<dyn IdentityStore>,
) -> JoinHandle<()> {
    let mut rx = feed.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(cue) => {
                    tracing::debug!(origin = %cue.origin, "change cue received");
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::debug!(missed, "change listener lagged, reloading once");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
            if let Err(e) = settings.refresh_with(identities.as_ref()) {
                tracing::warn!(error = %e, "reload after change cue failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_listener_is_harmless() {
        let feed = ChangeFeed::new();
        feed.publish("test");
    }

    #[tokio::test]
    async fn subscribers_receive_cues() {
        let feed = ChangeFeed::new();
        let mut rx = feed.subscribe();
        feed.publish("identities");
        assert_eq!(rx.recv().await.unwrap().origin, "identities");
    }
}
