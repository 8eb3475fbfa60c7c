//! Storage backend abstraction.
//!
//! [`StoreBackend`] is the handle the data access layer issues every call through: collection
//! level insert, find, count, replace, update, delete, aggregation and index management, plus
//! explicit sessions for callers that scope updates to a transaction. Collections are
//! addressed by their physical name, already resolved from the document type and partition key.
//!
//! Backends translate the descriptors in [`query`](crate::query), [`update`](crate::update),
//! [`aggregate`](crate::aggregate) and [`index`](crate::index) into their native form and
//! report native failures as [`DocumentStoreError::StoreOperationFailed`](crate::error::DocumentStoreError::StoreOperationFailed).
//!
//! # Examples
//!
//! ```ignore
//! use bson::doc;
//! use docpart::{backend::StoreBackend, query::{Filter, Query}};
//!
//! backend.insert_one("customers", doc! { "_id": 1, "name": "Alice" }).await?;
//!
//! let found = backend
//!     .find("customers", Query::builder().filter(Filter::eq("name", "Alice")).build())
//!     .await?;
//! ```

use async_trait::async_trait;
use bson::Document as BsonDocument;
use std::fmt::Debug;

use crate::{
    aggregate::Pipeline,
    error::DocumentStoreResult,
    index::{IndexKeys, IndexOptions},
    query::{Expr, Query},
    update::{Update, UpdateOutcome},
};

/// Abstract interface over a document database.
///
/// Implementations must be safe to share between tasks. Concurrency control, durability and
/// consistency belong to the store; nothing here is retried or rolled back.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// A client session handle, used to scope writes to a transaction.
    type Session: Send;

    /// Inserts a document. The collection is created on first use.
    ///
    /// # Errors
    ///
    /// Fails when a document with the same `_id` (or another unique key) already exists.
    async fn insert_one(&self, collection: &str, document: BsonDocument) -> DocumentStoreResult<()>;

    /// Inserts documents in order, stopping at the first failure.
    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<BsonDocument>,
    ) -> DocumentStoreResult<()>;

    /// Returns the documents selected by `query`: filtered, sorted, skipped, limited and
    /// projected in that order. Without a sort the store's natural order is returned.
    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<Vec<BsonDocument>>;

    /// Counts documents matching `filter`, or every document when `filter` is `None`.
    async fn count(&self, collection: &str, filter: Option<Expr>) -> DocumentStoreResult<u64>;

    /// Replaces the first document matching `filter` with `replacement`.
    async fn replace_one(
        &self,
        collection: &str,
        filter: Expr,
        replacement: BsonDocument,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<UpdateOutcome>;

    /// Applies `update` to the first document matching `filter`.
    async fn update_one(
        &self,
        collection: &str,
        filter: Expr,
        update: Update,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<UpdateOutcome>;

    /// Applies `update` to every document matching `filter`.
    async fn update_many(
        &self,
        collection: &str,
        filter: Expr,
        update: Update,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<UpdateOutcome>;

    /// Deletes the first document matching `filter`, returning the deleted count (0 or 1).
    async fn delete_one(&self, collection: &str, filter: Expr) -> DocumentStoreResult<u64>;

    /// Deletes every document matching `filter`, returning the deleted count.
    async fn delete_many(&self, collection: &str, filter: Expr) -> DocumentStoreResult<u64>;

    /// Runs an aggregation pipeline and returns the output documents.
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Pipeline,
    ) -> DocumentStoreResult<Vec<BsonDocument>>;

    /// Creates an index and returns its name.
    async fn create_index(
        &self,
        collection: &str,
        keys: IndexKeys,
        options: Option<IndexOptions>,
    ) -> DocumentStoreResult<String>;

    /// Lists the names of every index on the collection, including the primary key index.
    async fn list_index_names(&self, collection: &str) -> DocumentStoreResult<Vec<String>>;

    /// Drops an index by name.
    async fn drop_index(&self, collection: &str, name: &str) -> DocumentStoreResult<()>;

    /// Drops a collection with its documents and indexes. Dropping a missing collection succeeds.
    async fn drop_collection(&self, collection: &str) -> DocumentStoreResult<()>;

    /// Lists the names of every collection.
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// Starts a client session.
    async fn start_session(&self) -> DocumentStoreResult<Self::Session>;

    /// Starts a transaction on `session`.
    async fn start_transaction(&self, session: &mut Self::Session) -> DocumentStoreResult<()>;

    /// Commits the transaction running on `session`.
    async fn commit_transaction(&self, session: &mut Self::Session) -> DocumentStoreResult<()>;

    /// Aborts the transaction running on `session`, discarding its writes.
    async fn abort_transaction(&self, session: &mut Self::Session) -> DocumentStoreResult<()>;

    /// Releases the backend's resources.
    async fn shutdown(&self) -> DocumentStoreResult<()> {
        Ok(())
    }
}

/// Constructs a backend, typically connecting to the store.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
