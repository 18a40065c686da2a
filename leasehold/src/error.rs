use thiserror::Error;

/// Prefix Redis-compatible servers use for an unknown script handle.
const NOSCRIPT_PREFIX: &str = "NOSCRIPT";

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Elector must be created inside a Tokio runtime")]
    NoRuntime,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed installing scripts: {0}")]
    ScriptInstall(#[source] StoreError),

    #[error("Trying to run election: {0}")]
    Election(#[source] Box<Error>),

    #[error("Trying to renew lease: {0}")]
    Renewal(#[source] Box<Error>),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a [`Store`](crate::Store) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store no longer knows the procedure referenced by handle.
    #[error("{message}")]
    NoScript { message: String },

    #[error("Store error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Maps a raw error message from the store into the matching variant.
    ///
    /// Some Redis-compatible servers (KVRocks) prefix every error with
    /// `ERR `, so the missing-script marker is checked with and without it.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let trimmed = message.strip_prefix("ERR ").unwrap_or(&message);
        if trimmed.starts_with(NOSCRIPT_PREFIX) {
            Self::NoScript { message }
        } else {
            Self::Backend(message)
        }
    }

    pub fn is_no_script(&self) -> bool {
        matches!(self, Self::NoScript { .. })
    }
}
