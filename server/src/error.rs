use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The request was malformed; nothing was persisted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("content is required and must be a non-empty string")]
    MissingContent,
    #[error("ttl_seconds must be a positive number")]
    InvalidTtl,
    #[error("max_views must be a positive integer")]
    InvalidMaxViews,
    #[error("{0}")]
    MalformedRequest(String),
}

/// The persistence layer failed. Callers may retry.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("a paste with id {0:?} already exists")]
    Conflict(String),
    #[error("failed to encode or decode a paste: {0}")]
    Codec(String),
    #[error("storage backend failure: {0}")]
    Backend(String),
    #[error("storage task was cancelled: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(feature = "rocksdb")]
impl From<rocksdb::Error> for StorageError {
    fn from(value: rocksdb::Error) -> Self {
        Self::Backend(value.into_string())
    }
}

#[cfg(feature = "rocksdb")]
impl From<bincode::Error> for StorageError {
    fn from(value: bincode::Error) -> Self {
        Self::Codec(value.to_string())
    }
}
