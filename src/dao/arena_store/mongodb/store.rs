use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Document, doc},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    config::MongoConfig,
    connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoAttemptDocument, MongoCompetitionDocument, MongoUserDocument, doc_id, key_filter,
    },
};
use crate::{
    dao::{
        arena_store::{ArenaStore, sort_attempts},
        models::{CompetitionEntity, UserEntity},
        storage::StorageResult,
    },
    state::attempt::{Attempt, AttemptKey},
};

const ATTEMPT_COLLECTION_NAME: &str = "tries";
const COMPETITION_COLLECTION_NAME: &str = "competitions";
const USER_COLLECTION_NAME: &str = "users";
const DUPLICATE_KEY_CODE: i32 = 11000;

/// [`ArenaStore`] persisted in MongoDB.
#[derive(Clone)]
pub struct MongoArenaStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = connection::open(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoArenaStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = connection::open(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.attempts().await;

        // The uniqueness constraint backing create-if-absent.
        let unique_key = IndexModel::builder()
            .keys(doc! {
                "competition_id": 1,
                "user_id": 1,
                "puzzle_id": 1,
                "puzzle_index": 1,
                "step": 1,
            })
            .options(
                IndexOptions::builder()
                    .name(Some("try_key_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();

        collection
            .create_index(unique_key)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ATTEMPT_COLLECTION_NAME,
                index: "competition_id,user_id,puzzle_id,puzzle_index,step",
                source,
            })?;

        let completion = IndexModel::builder()
            .keys(doc! {"competition_id": 1, "user_id": 1, "puzzle_index": 1, "end_time": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("try_completion_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(completion)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ATTEMPT_COLLECTION_NAME,
                index: "competition_id,user_id,puzzle_index,end_time",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn attempts(&self) -> Collection<MongoAttemptDocument> {
        self.database()
            .await
            .collection::<MongoAttemptDocument>(ATTEMPT_COLLECTION_NAME)
    }

    async fn find_attempt(&self, key: &AttemptKey) -> MongoResult<Option<Attempt>> {
        let collection = self.attempts().await;
        let document = collection
            .find_one(key_filter(key))
            .await
            .map_err(|source| MongoDaoError::LoadAttempt {
                key: key.to_string(),
                source,
            })?;

        document.map(Attempt::try_from).transpose()
    }

    async fn insert_attempt_if_absent(&self, attempt: Attempt) -> MongoResult<(Attempt, bool)> {
        let key = attempt.key.clone();
        if let Some(existing) = self.find_attempt(&key).await? {
            return Ok((existing, false));
        }

        let collection = self.attempts().await;
        let document: MongoAttemptDocument = attempt.clone().into();
        match collection.insert_one(&document).await {
            Ok(_) => Ok((attempt, true)),
            Err(err) if is_duplicate_key(&err) => {
                // A concurrent writer inserted the same key between our read and write.
                debug!(key = %key, "duplicate try insert; returning the winning row");
                self.find_attempt(&key)
                    .await?
                    .map(|existing| (existing, false))
                    .ok_or(MongoDaoError::StaleAttempt {
                        key: key.to_string(),
                    })
            }
            Err(source) => Err(MongoDaoError::InsertAttempt {
                key: key.to_string(),
                source,
            }),
        }
    }

    async fn update_attempt(
        &self,
        mut attempt: Attempt,
        expected_version: u64,
    ) -> MongoResult<Attempt> {
        let key = attempt.key.clone();
        attempt.version = expected_version + 1;

        let mut filter = key_filter(&key);
        filter.insert("version", expected_version as i64);

        let collection = self.attempts().await;
        let document: MongoAttemptDocument = attempt.clone().into();
        let result = collection
            .replace_one(filter, &document)
            .await
            .map_err(|source| MongoDaoError::UpdateAttempt {
                key: key.to_string(),
                source,
            })?;

        if result.matched_count == 0 {
            return Err(MongoDaoError::StaleAttempt {
                key: key.to_string(),
            });
        }

        Ok(attempt)
    }

    async fn has_completed_puzzle_index(
        &self,
        competition_id: String,
        user_id: String,
        puzzle_index: u32,
    ) -> MongoResult<bool> {
        let collection = self.attempts().await;
        let count = collection
            .count_documents(doc! {
                "competition_id": &competition_id,
                "user_id": &user_id,
                "puzzle_index": i64::from(puzzle_index),
                "end_time": { "$ne": null },
            })
            .limit(1)
            .await
            .map_err(|source| MongoDaoError::QueryAttempts {
                competition_id,
                source,
            })?;

        Ok(count > 0)
    }

    async fn list_attempts(&self, competition_id: String, filter: Document) -> MongoResult<Vec<Attempt>> {
        let collection = self.attempts().await;
        let documents: Vec<MongoAttemptDocument> = collection
            .find(filter)
            .sort(doc! {"puzzle_index": 1, "step": 1, "start_time": 1})
            .await
            .map_err(|source| MongoDaoError::QueryAttempts {
                competition_id: competition_id.clone(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::QueryAttempts {
                competition_id,
                source,
            })?;

        let mut attempts = documents
            .into_iter()
            .map(Attempt::try_from)
            .collect::<MongoResult<Vec<_>>>()?;
        sort_attempts(&mut attempts);
        Ok(attempts)
    }

    async fn find_competition(&self, id: String) -> MongoResult<Option<CompetitionEntity>> {
        let collection = self
            .database()
            .await
            .collection::<MongoCompetitionDocument>(COMPETITION_COLLECTION_NAME);

        let document = collection
            .find_one(doc_id(&id))
            .await
            .map_err(|source| MongoDaoError::LoadDirectory {
                collection: COMPETITION_COLLECTION_NAME,
                id,
                source,
            })?;

        Ok(document.map(Into::into))
    }

    async fn find_user(&self, id: String) -> MongoResult<Option<UserEntity>> {
        let collection = self
            .database()
            .await
            .collection::<MongoUserDocument>(USER_COLLECTION_NAME);

        let document = collection
            .find_one(doc_id(&id))
            .await
            .map_err(|source| MongoDaoError::LoadDirectory {
                collection: USER_COLLECTION_NAME,
                id,
                source,
            })?;

        Ok(document.map(Into::into))
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

impl ArenaStore for MongoArenaStore {
    fn find_attempt(&self, key: AttemptKey) -> BoxFuture<'static, StorageResult<Option<Attempt>>> {
        let store = self.clone();
        Box::pin(async move { store.find_attempt(&key).await.map_err(Into::into) })
    }

    fn insert_attempt_if_absent(
        &self,
        attempt: Attempt,
    ) -> BoxFuture<'static, StorageResult<(Attempt, bool)>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .insert_attempt_if_absent(attempt)
                .await
                .map_err(Into::into)
        })
    }

    fn update_attempt(
        &self,
        attempt: Attempt,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<Attempt>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_attempt(attempt, expected_version)
                .await
                .map_err(Into::into)
        })
    }

    fn has_completed_puzzle_index(
        &self,
        competition_id: String,
        user_id: String,
        puzzle_index: u32,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .has_completed_puzzle_index(competition_id, user_id, puzzle_index)
                .await
                .map_err(Into::into)
        })
    }

    fn list_puzzle_attempts(
        &self,
        competition_id: String,
        user_id: String,
        puzzle_id: String,
        puzzle_index: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<Attempt>>> {
        let store = self.clone();
        Box::pin(async move {
            let filter = doc! {
                "competition_id": &competition_id,
                "user_id": &user_id,
                "puzzle_id": &puzzle_id,
                "puzzle_index": i64::from(puzzle_index),
            };
            store
                .list_attempts(competition_id, filter)
                .await
                .map_err(Into::into)
        })
    }

    fn list_competition_attempts(
        &self,
        competition_id: String,
        user_id: Option<String>,
    ) -> BoxFuture<'static, StorageResult<Vec<Attempt>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut filter = doc! {"competition_id": &competition_id};
            if let Some(user_id) = user_id {
                filter.insert("user_id", user_id);
            }
            store
                .list_attempts(competition_id, filter)
                .await
                .map_err(Into::into)
        })
    }

    fn find_competition(
        &self,
        id: String,
    ) -> BoxFuture<'static, StorageResult<Option<CompetitionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_competition(id).await.map_err(Into::into) })
    }

    fn find_user(&self, id: String) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_user(id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
