//! The database context: a backend handle plus the collection registry.
//!
//! ```ignore
//! let context = Context::builder(backend)
//!     .register::<Customer>()
//!     .register_as::<Invoice>("billing")
//!     .build();
//!
//! let access = context.data_access();
//! access.add_one(&mut customer).await?;
//! ```

use tracing::debug;

use crate::{
    access::DataAccess,
    backend::StoreBackend,
    document::Document,
    error::DocumentStoreResult,
    registry::{CollectionRegistry, CollectionRegistryBuilder},
};

/// Owns the store backend and resolves document types to physical collections.
///
/// The context holds no mutable state; it can be shared freely between tasks.
#[derive(Debug)]
pub struct Context<B: StoreBackend> {
    backend: B,
    registry: CollectionRegistry,
}

impl<B: StoreBackend> Context<B> {
    /// Creates a context with an empty registry. Every type resolves to its declared
    /// collection or its type name.
    pub fn new(backend: B) -> Self {
        Self::with_registry(backend, CollectionRegistry::new())
    }

    pub fn with_registry(backend: B, registry: CollectionRegistry) -> Self {
        Self { backend, registry }
    }

    pub fn builder(backend: B) -> ContextBuilder<B> {
        ContextBuilder { backend, registry: CollectionRegistry::builder() }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn registry(&self) -> &CollectionRegistry {
        &self.registry
    }

    /// Resolves the collection of `D` for an explicit partition key.
    pub fn collection_name<D: Document>(&self, partition_key: Option<&str>) -> String {
        self.registry.resolve::<D>(partition_key)
    }

    /// Resolves the collection a document instance routes to.
    pub fn collection_name_for<D: Document>(&self, document: &D) -> String {
        self.registry.resolve_for(document)
    }

    /// Returns the data access facade bound to this context.
    pub fn data_access(&self) -> DataAccess<'_, B> {
        DataAccess::new(self)
    }

    /// Drops the collection of `D` for the given partition key.
    ///
    /// # Errors
    ///
    /// Returns the store's error unchanged.
    pub async fn drop_collection<D: Document>(
        &self,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<()> {
        let collection = self.collection_name::<D>(partition_key);
        debug!("drop collection '{}'", collection);

        self.backend
            .drop_collection(&collection)
            .await
    }

    /// Lists every collection in the database.
    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.backend.list_collections().await
    }

    /// Starts a session and opens a transaction on it, for use with the `*_in_session`
    /// update operations.
    pub async fn start_transaction(&self) -> DocumentStoreResult<B::Session> {
        let mut session = self.backend.start_session().await?;
        self.backend
            .start_transaction(&mut session)
            .await?;

        Ok(session)
    }

    pub async fn commit_transaction(&self, session: &mut B::Session) -> DocumentStoreResult<()> {
        self.backend
            .commit_transaction(session)
            .await
    }

    pub async fn abort_transaction(&self, session: &mut B::Session) -> DocumentStoreResult<()> {
        self.backend
            .abort_transaction(session)
            .await
    }

    /// Shuts the backend down, consuming the context.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await
    }
}

/// Builder for [`Context`], registering collection names at startup.
#[derive(Debug)]
pub struct ContextBuilder<B: StoreBackend> {
    backend: B,
    registry: CollectionRegistryBuilder,
}

impl<B: StoreBackend> ContextBuilder<B> {
    /// Registers `D` under its declared collection name, or its type name.
    pub fn register<D: Document>(mut self) -> Self {
        self.registry = self.registry.register::<D>();
        self
    }

    /// Registers `D` under an explicit collection name.
    pub fn register_as<D: Document>(mut self, name: impl Into<String>) -> Self {
        self.registry = self.registry.register_as::<D>(name);
        self
    }

    pub fn build(self) -> Context<B> {
        Context::with_registry(self.backend, self.registry.build())
    }
}
