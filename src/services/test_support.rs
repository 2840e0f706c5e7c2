//! Fixtures shared by service tests.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::{
    config::AppConfig,
    dao::{
        arena_store::{ArenaStore, memory::MemoryArenaStore},
        models::{CompetitionEntity, GroupEntity, UserEntity},
        storage::{StorageError, StorageResult},
    },
    services::catalog_client::testing::ScriptedCatalog,
    state::{
        AppState, SharedState,
        attempt::{Attempt, AttemptKey, Step},
    },
};

pub fn user(id: &str) -> UserEntity {
    UserEntity {
        id: id.into(),
        firstname: format!("First-{id}"),
        lastname: format!("Last-{id}"),
        groups: vec![GroupEntity {
            id: "g1".into(),
            name: "Blue team".into(),
        }],
    }
}

pub fn competition(id: &str) -> CompetitionEntity {
    CompetitionEntity {
        id: id.into(),
        title: format!("Competition {id}"),
        catalog_address: "http://catalog.test".into(),
        catalog_theme: "space".into(),
    }
}

/// Running state over the embedded store with a scripted catalog.
pub struct TestArena {
    pub state: SharedState,
    pub store: MemoryArenaStore,
    pub catalog: ScriptedCatalog,
}

impl TestArena {
    pub async fn new() -> Self {
        Self::with_catalog(ScriptedCatalog::new("42", "4242")).await
    }

    pub async fn with_catalog(catalog: ScriptedCatalog) -> Self {
        Self::build(AppConfig::default(), catalog).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        Self::build(config, ScriptedCatalog::new("42", "4242")).await
    }

    async fn build(config: AppConfig, catalog: ScriptedCatalog) -> Self {
        let store =
            MemoryArenaStore::with_directory([competition("c1")], [user("u1"), user("u2")]);
        let (state, dispatcher) = AppState::new(config, Arc::new(catalog.clone()));
        tokio::spawn(dispatcher.run());
        state.set_store(Arc::new(store.clone())).await;
        Self {
            state,
            store,
            catalog,
        }
    }

    /// Subscribe a channel-backed spectator to `competition_id`.
    pub async fn spectate(&self, competition_id: &str) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        self.state
            .broadcast()
            .subscribe(competition_id, Arc::new(tx))
            .await;
        rx
    }
}

/// Embedded store that refuses step-2 inserts until [`StepTwoOutage::recover`].
#[derive(Clone)]
pub struct StepTwoOutage {
    inner: MemoryArenaStore,
    down: Arc<AtomicBool>,
    refused: Arc<AtomicUsize>,
}

impl StepTwoOutage {
    pub fn new(inner: MemoryArenaStore) -> Self {
        Self {
            inner,
            down: Arc::new(AtomicBool::new(true)),
            refused: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn recover(&self) {
        self.down.store(false, Ordering::SeqCst);
    }

    /// Step-2 inserts rejected so far.
    pub fn refused(&self) -> usize {
        self.refused.load(Ordering::SeqCst)
    }
}

impl ArenaStore for StepTwoOutage {
    fn find_attempt(&self, key: AttemptKey) -> BoxFuture<'static, StorageResult<Option<Attempt>>> {
        self.inner.find_attempt(key)
    }

    fn insert_attempt_if_absent(
        &self,
        attempt: Attempt,
    ) -> BoxFuture<'static, StorageResult<(Attempt, bool)>> {
        if attempt.key.step == Step::Second && self.down.load(Ordering::SeqCst) {
            self.refused.fetch_add(1, Ordering::SeqCst);
            return Box::pin(async {
                Err(StorageError::unavailable(
                    "insert refused".into(),
                    std::io::Error::other("storage outage"),
                ))
            });
        }
        self.inner.insert_attempt_if_absent(attempt)
    }

    fn update_attempt(
        &self,
        attempt: Attempt,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<Attempt>> {
        self.inner.update_attempt(attempt, expected_version)
    }

    fn has_completed_puzzle_index(
        &self,
        competition_id: String,
        user_id: String,
        puzzle_index: u32,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        self.inner
            .has_completed_puzzle_index(competition_id, user_id, puzzle_index)
    }

    fn list_puzzle_attempts(
        &self,
        competition_id: String,
        user_id: String,
        puzzle_id: String,
        puzzle_index: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<Attempt>>> {
        self.inner
            .list_puzzle_attempts(competition_id, user_id, puzzle_id, puzzle_index)
    }

    fn list_competition_attempts(
        &self,
        competition_id: String,
        user_id: Option<String>,
    ) -> BoxFuture<'static, StorageResult<Vec<Attempt>>> {
        self.inner.list_competition_attempts(competition_id, user_id)
    }

    fn find_competition(
        &self,
        id: String,
    ) -> BoxFuture<'static, StorageResult<Option<CompetitionEntity>>> {
        self.inner.find_competition(id)
    }

    fn find_user(&self, id: String) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        self.inner.find_user(id)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}
