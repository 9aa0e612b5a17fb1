//! Error taxonomy shared by every operation of the mapper.

use crate::write::batch_write_item::BatchWriteRequest;

use aws_sdk_dynamodb::error::BuildError;
use serde_json::{Map, Value};

/// Boxed error used for store failures and hook aborts.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Keys or write requests a batch operation could not complete.
#[derive(Clone, Debug, PartialEq)]
pub enum Unprocessed {
    /// Key attribute maps left over by a batch get.
    Keys(Vec<Map<String, Value>>),
    /// Write requests left over by a batch write.
    Writes(Vec<BatchWriteRequest>),
}

impl Unprocessed {
    /// Number of keys or write requests left over.
    pub fn len(&self) -> usize {
        match self {
            Self::Keys(keys) => keys.len(),
            Self::Writes(writes) => writes.len(),
        }
    }

    /// Whether nothing was left over.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Errors raised by the mapper.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed query composition or an item that does not match its schema.
    ///
    /// Always raised before any request reaches the store.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A write's condition expression did not hold.
    #[error("conditional check failed: {0}")]
    ConditionalCheckFailed(String),

    /// A batch operation ran out of attempts with work still pending.
    #[error("batch operation left {} unprocessed after {attempts} attempts", .unprocessed.len())]
    PartialFailure {
        /// What is still pending, so the caller can resume.
        unprocessed: Unprocessed,
        /// How many requests were issued for the failing chunk.
        attempts: u32,
    },

    /// Throttling or capacity errors that may succeed on retry.
    #[error("transient store error: {0}")]
    Transient(#[source] BoxError),

    /// Any other store failure.
    #[error("store error: {0}")]
    Store(#[source] BoxError),

    /// Conversion between JSON values and attribute values failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_dynamo::Error),

    /// A request could not be assembled.
    #[error("request build error: {0}")]
    Build(#[from] BuildError),

    /// Raised by lifecycle hooks to abort an operation.
    #[error("lifecycle hook aborted: {0}")]
    Hook(#[source] BoxError),

    /// No model is registered under the given name.
    #[error("model `{0}` is not defined")]
    ModelNotFound(String),

    /// A model is already registered under the given name.
    #[error("model `{0}` is already defined")]
    ModelExists(String),
}

impl Error {
    /// Build a [`Error::Validation`] from anything printable.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Build a [`Error::Hook`] from any error or message.
    pub fn hook(error: impl Into<BoxError>) -> Self {
        Self::Hook(error.into())
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
