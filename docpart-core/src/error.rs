//! Error types and result types for data access operations.
//!
//! Every fallible operation in this crate returns [`DocumentStoreResult<T>`]. Failures raised
//! by the underlying store are carried unchanged inside
//! [`DocumentStoreError::StoreOperationFailed`] so callers can downcast to the driver's own
//! error type when they need to.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// A boxed error raised by a storage backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Represents all possible errors that can occur when accessing documents.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// An argument was missing or malformed (empty field name, empty index field list,
    /// a zero page number, ...). Surfaced immediately, never retried.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Identifier generation was requested for an id type with no generation strategy.
    #[error("{0} is not a supported id type, the id of the document cannot be set")]
    UnsupportedIdentifierType(String),
    /// The underlying store rejected or failed the operation.
    #[error("Store operation failed: {0}")]
    StoreOperationFailed(#[source] BoxError),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
}

impl DocumentStoreError {
    /// Wraps a backend failure without altering it.
    pub fn store<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        DocumentStoreError::StoreOperationFailed(err.into())
    }

    /// Returns the backend error carried by this error, if it is of type `E`.
    pub fn store_source<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            DocumentStoreError::StoreOperationFailed(source) => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// A specialized `Result` type for data access operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
