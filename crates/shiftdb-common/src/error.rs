use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("migration error: {0}")]
    Migration(#[from] MigrationError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// The migration failure behind this error, if any.
    pub fn as_migration(&self) -> Option<&MigrationError> {
        match self {
            Error::Migration(e) => Some(e),
            _ => None,
        }
    }

    /// Display text without the `migration error:` prefix for migration
    /// failures, used when one is nested inside another.
    pub fn detail(&self) -> String {
        match self {
            Error::Migration(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}

/// Failures raised by the registry, the history ledger and the runner.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("duplicate migration timestamp {timestamp}: {first} and {second}")]
    DuplicateTimestamp {
        timestamp: i64,
        first: String,
        second: String,
    },

    #[error("migration {timestamp}_{name} is already recorded in the history table")]
    AlreadyRecorded { timestamp: i64, name: String },

    #[error("migration {timestamp}_{name} is not recorded in the history table")]
    NotFound { timestamp: i64, name: String },

    #[error("schema operation failed in migration {migration}: {message}")]
    SchemaOperationFailed { migration: String, message: String },

    #[error("no definition for applied migration {timestamp}_{name}; cannot revert without its down statements")]
    DefinitionMissing { timestamp: i64, name: String },

    #[error("applied {applied} of {total}; stopped at migration {failed_at}: {}", .source.detail())]
    BatchAborted {
        applied: usize,
        total: usize,
        failed_at: String,
        #[source]
        source: Box<Error>,
    },
}
