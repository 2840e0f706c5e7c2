/// Attempt domain model.
pub mod attempt;
/// Spectator broadcast hub.
pub mod broadcast;
/// Puzzle input cache.
pub mod input_cache;
/// Per-key async locks.
pub mod locks;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::arena_store::ArenaStore,
    error::ServiceError,
    services::catalog_client::CatalogClient,
    state::{
        attempt::AttemptKey,
        broadcast::{BroadcastDispatcher, BroadcastHub},
        input_cache::InputCache,
        locks::KeyedLocks,
    },
};

/// Handle to [`AppState`] shared by every task and handler.
pub type SharedState = Arc<AppState>;

/// Central application state: storage handle, collaborators and the spectator hub.
pub struct AppState {
    store: RwLock<Option<Arc<dyn ArenaStore>>>,
    degraded: watch::Sender<bool>,
    broadcast: BroadcastHub,
    attempt_locks: KeyedLocks<AttemptKey>,
    inputs: InputCache,
    catalog: Arc<dyn CatalogClient>,
    config: Arc<AppConfig>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    /// The returned dispatcher must be spawned for spectators to receive events.
    pub fn new(
        config: AppConfig,
        catalog: Arc<dyn CatalogClient>,
    ) -> (SharedState, BroadcastDispatcher) {
        let (degraded_tx, _rx) = watch::channel(true);
        let (broadcast, dispatcher) = BroadcastHub::new();
        let state = Arc::new(Self {
            store: RwLock::new(None),
            degraded: degraded_tx,
            broadcast,
            attempt_locks: KeyedLocks::new(),
            inputs: InputCache::new(config.catalog.input_cache_ttl),
            catalog,
            config: Arc::new(config),
        });
        (state, dispatcher)
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn ArenaStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Current store, or [`ServiceError::Degraded`] while none is usable.
    pub async fn require_store(&self) -> Result<Arc<dyn ArenaStore>, ServiceError> {
        if *self.degraded.borrow() {
            return Err(ServiceError::Degraded);
        }
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn set_store(&self, store: Arc<dyn ArenaStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Hub fanning attempt events out to spectators.
    pub fn broadcast(&self) -> &BroadcastHub {
        &self.broadcast
    }

    /// Per-attempt mutation locks.
    pub fn attempt_locks(&self) -> &KeyedLocks<AttemptKey> {
        &self.attempt_locks
    }

    /// Answer checker and input generator.
    pub fn catalog(&self) -> Arc<dyn CatalogClient> {
        self.catalog.clone()
    }

    /// Puzzle inputs already generated by the catalog.
    pub fn inputs(&self) -> &InputCache {
        &self.inputs
    }

    /// Configuration the process started with.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }
}
