use mongodb::error::Error as MongoError;
use thiserror::Error;

/// Result alias for MongoDB operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures raised by the MongoDB backend.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// A required environment variable is unset.
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar {
        /// Variable name.
        var: &'static str,
    },
    /// The connection string could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// Rejected connection string.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The driver rejected the client options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The server never answered while connecting.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Pings tried.
        attempts: u32,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A periodic ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Index creation failed.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection name.
        collection: &'static str,
        /// Index name.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Reading a try failed.
    #[error("failed to load try `{key}`")]
    LoadAttempt {
        /// Try key.
        key: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Inserting a try failed.
    #[error("failed to insert try `{key}`")]
    InsertAttempt {
        /// Try key.
        key: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Replacing a try failed.
    #[error("failed to update try `{key}`")]
    UpdateAttempt {
        /// Try key.
        key: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The try version no longer matches.
    #[error("try `{key}` was modified concurrently")]
    StaleAttempt {
        /// Try key.
        key: String,
    },
    /// A stored try could not be decoded.
    #[error("stored try document `{id}` is malformed: {reason}")]
    MalformedAttempt {
        /// Document identifier.
        id: String,
        /// Decoding failure.
        reason: String,
    },
    /// Listing tries failed.
    #[error("failed to query tries of competition `{competition_id}`")]
    QueryAttempts {
        /// Competition whose tries were listed.
        competition_id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Reading a directory row failed.
    #[error("failed to load {collection} `{id}`")]
    LoadDirectory {
        /// Collection name.
        collection: &'static str,
        /// Document identifier.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
}
