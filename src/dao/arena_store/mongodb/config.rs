use std::time::Duration;

use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DB: &str = "puzzle_arena";
const APP_NAME: &str = "puzzle-arena-back";
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for the MongoDB backend.
#[derive(Clone)]
pub struct MongoConfig {
    /// Parsed driver options.
    pub options: ClientOptions,
    /// Database holding the collections.
    pub database_name: String,
}

impl MongoConfig {
    /// Parse `uri`, filling in the application name and a short server
    /// selection timeout when the URI leaves them unset.
    pub async fn from_uri(uri: &str, database: Option<&str>) -> MongoResult<Self> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|source| MongoDaoError::InvalidUri {
                uri: uri.to_owned(),
                source,
            })?;
        options.app_name.get_or_insert_with(|| APP_NAME.to_owned());
        options
            .server_selection_timeout
            .get_or_insert(SERVER_SELECTION_TIMEOUT);

        Ok(Self {
            options,
            database_name: database.unwrap_or(DEFAULT_DB).to_owned(),
        })
    }

    /// Read `MONGO_URI` (required) and `MONGO_DB` (optional).
    pub async fn from_env() -> MongoResult<Self> {
        let Ok(uri) = std::env::var("MONGO_URI") else {
            return Err(MongoDaoError::MissingEnvVar { var: "MONGO_URI" });
        };
        let database = std::env::var("MONGO_DB").ok();
        Self::from_uri(&uri, database.as_deref()).await
    }
}
