use thiserror::Error;

use docpart_core::error::DocumentStoreError;

/// Failures raised by the in-memory store. Surfaced to callers inside
/// [`DocumentStoreError::StoreOperationFailed`].
#[derive(Error, Debug)]
pub enum MemoryStoreError {
    #[error("duplicate key in '{collection}' on index '{index}': {key}")]
    DuplicateKey {
        collection: String,
        index: String,
        key: String,
    },
    #[error("collection '{0}' does not exist")]
    NamespaceNotFound(String),
    #[error("index '{index}' not found on '{collection}'")]
    IndexNotFound { collection: String, index: String },
    #[error("an index named '{0}' already exists with different keys")]
    IndexKeySpecsConflict(String),
    #[error("the _id index cannot be dropped")]
    CannotDropIdIndex,
    #[error("an index needs at least one key")]
    EmptyIndexKeys,
    #[error("the immutable field '_id' cannot be changed")]
    ImmutableId,
    #[error("cannot apply {operation} to the non-{expected} field '{field}'")]
    TypeMismatch {
        operation: &'static str,
        expected: &'static str,
        field: String,
    },
    #[error("{operation} on '{field}' overflows a 64-bit integer")]
    Overflow {
        operation: &'static str,
        field: String,
    },
    #[error("cannot create field '{0}' inside a non-document value")]
    PathConflict(String),
    #[error("a transaction is already in progress on this session")]
    TransactionInProgress,
    #[error("no transaction is in progress on this session")]
    NoTransaction,
}

impl From<MemoryStoreError> for DocumentStoreError {
    fn from(err: MemoryStoreError) -> Self {
        DocumentStoreError::store(err)
    }
}

pub(crate) type MemoryResult<T> = Result<T, MemoryStoreError>;
