use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by name managers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The (family, name) pair was never minted. Surfaced only by the
    /// `try_acquire`/`try_hold` operations.
    #[error("the name does not exist")]
    NotExist,

    /// The name exists and is currently held. Surfaced only by the
    /// `try_acquire`/`try_hold` operations.
    #[error("the name is in use")]
    InUse,

    /// Durable or transport failure in the backend store.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Malformed connection string or unknown option. Only produced while
    /// constructing a backend.
    #[error("config error: {0}")]
    Config(String),

    /// The keep-alive loop of a hold gave up after retries. Delivered on the
    /// hold's error channel, never returned from an engine call.
    #[error("cannot keep alive {family}:{name}: {reason}")]
    Background {
        family: String,
        name: String,
        reason: String,
    },
}

/// Errors produced by the store contract and its drivers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Retryable transactional conflict. Handled inside the engine's retry
    /// loop and never surfaced to callers.
    #[error("transactional conflict")]
    Conflict,

    /// The store contains data that violates an engine invariant.
    #[error("inconsistent store: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Any other driver-level failure.
    #[error("{0}")]
    Backend(String),
}
