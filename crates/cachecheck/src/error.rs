use thiserror::Error;

use crate::provider::Provider;

/// Errors raised by the local TTL cache store.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors a provider adapter reports for a single remote check.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(String),
    #[error("provider returned status code {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("missing or rejected credentials")]
    Unauthorized,
    #[error("other error: {0}")]
    Other(String),
}

impl ProviderError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

/// Failure of a worker pool job, delivered in place of its result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("job panicked: {0}")]
    Panicked(String),
}

/// Errors raised by the worker pool itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("worker pool is closed")]
    Closed,
    #[error("max_workers must be greater than zero")]
    InvalidSize,
    #[error("failed to start pool manager: {0}")]
    Spawn(String),
}

/// Why a provider chunk produced no results during a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("check task for {0} aborted: {1}")]
    TaskAborted(Provider, String),
}
