mod config;
mod connection;
mod error;
mod models;
/// Store implementation over the MongoDB driver.
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoArenaStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::StaleAttempt { key } => StorageError::Conflict { key },
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
