//! Live document subscriptions for the console session.
//!
//! One listener task per watched [`DocumentPath`]. Each listener keeps the
//! latest snapshot in a shared cache and fans it out as a [`ConsoleEvent`].
//! Teardown is explicit: [`SubscriptionManager::teardown`] on logout, or drop.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use futures::StreamExt;
use shared::{domain::DocumentPath, protocol::Snapshot};
use storage::RecordStore;
use tokio::{
    sync::{broadcast, RwLock},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::ConsoleEvent;

const EVENT_CAPACITY: usize = 1024;

type SnapshotCache = Arc<RwLock<HashMap<DocumentPath, Snapshot>>>;

pub struct SubscriptionManager {
    store: Arc<dyn RecordStore>,
    events: broadcast::Sender<ConsoleEvent>,
    listeners: Mutex<HashMap<DocumentPath, JoinHandle<()>>>,
    cache: SnapshotCache,
}

impl SubscriptionManager {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            events,
            listeners: Mutex::new(HashMap::new()),
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Subscribe before calling [`Self::watch`] to receive the initial snapshot.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ConsoleEvent> {
        self.events.subscribe()
    }

    /// Starts a listener for `path`. Returns `false` if one is already running.
    pub fn watch(&self, path: DocumentPath) -> bool {
        let mut listeners = self.lock_listeners();
        if listeners.contains_key(&path) {
            return false;
        }

        debug!(%path, "starting listener");
        let task = tokio::spawn(run_listener(
            self.store.clone(),
            path.clone(),
            self.cache.clone(),
            self.events.clone(),
        ));
        listeners.insert(path, task);
        true
    }

    /// Stops the listener for `path` and forgets its cached snapshot.
    pub async fn unwatch(&self, path: &DocumentPath) -> bool {
        let Some(task) = self.lock_listeners().remove(path) else {
            return false;
        };
        task.abort();
        let _ = task.await;
        self.cache.write().await.remove(path);
        debug!(%path, "listener stopped");
        true
    }

    /// Stops every listener and clears the cache, e.g. on logout.
    pub async fn teardown(&self) {
        let tasks: Vec<(DocumentPath, JoinHandle<()>)> = self.lock_listeners().drain().collect();
        for (_, task) in &tasks {
            task.abort();
        }
        for (path, task) in tasks {
            let _ = task.await;
            debug!(%path, "listener stopped");
        }
        self.cache.write().await.clear();
    }

    pub fn is_watching(&self, path: &DocumentPath) -> bool {
        self.lock_listeners().contains_key(path)
    }

    pub fn watched(&self) -> Vec<DocumentPath> {
        self.lock_listeners().keys().cloned().collect()
    }

    pub async fn cached(&self, path: &DocumentPath) -> Option<Snapshot> {
        self.cache.read().await.get(path).cloned()
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, HashMap<DocumentPath, JoinHandle<()>>> {
        // A poisoned map still holds valid handles.
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        for (_, task) in self.lock_listeners().drain() {
            task.abort();
        }
    }
}

async fn run_listener(
    store: Arc<dyn RecordStore>,
    path: DocumentPath,
    cache: SnapshotCache,
    events: broadcast::Sender<ConsoleEvent>,
) {
    let mut snapshots = storage::subscribe(store, path.clone());
    while let Some(next) = snapshots.next().await {
        match next {
            Ok(snapshot) => {
                cache.write().await.insert(path.clone(), snapshot.clone());
                let _ = events.send(ConsoleEvent::Snapshot {
                    path: path.clone(),
                    snapshot,
                });
            }
            Err(err) => {
                warn!(%path, error = %err, "snapshot read failed");
                let _ = events.send(ConsoleEvent::SubscriptionError {
                    path: path.clone(),
                    message: err.to_string(),
                });
            }
        }
    }
    debug!(%path, "change feed closed");
}

#[cfg(test)]
#[path = "tests/subscriptions_tests.rs"]
mod tests;
