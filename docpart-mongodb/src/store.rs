use async_trait::async_trait;
use bson::Document;
use futures::TryStreamExt;
use mongodb::{
    Client, ClientSession, Collection as MongoCollection, IndexModel,
    options::{ClientOptions, FindOptions},
};
use tracing::debug;

use docpart_core::{
    aggregate::Pipeline,
    backend::{StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    index::{IndexKeys, IndexOptions},
    query::{Expr, Query},
    update::{Update, UpdateOutcome},
};

use crate::query::{
    MongoQueryTranslator, index_keys_document, index_options, pipeline_documents,
    projection_document, sort_document, update_document,
};

/// A [`StoreBackend`] over a single MongoDB database.
#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: impl Into<String>) -> Self {
        Self {
            client,
            database: database.into(),
        }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    /// The name of the database this store operates on.
    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }

    async fn apply_update(
        &self,
        collection: &str,
        filter: Expr,
        update: Update,
        session: Option<&mut ClientSession>,
        many: bool,
    ) -> DocumentStoreResult<UpdateOutcome> {
        let collection = self.get_collection(collection);
        let filter = MongoQueryTranslator::filter(Some(&filter))?;
        let update = update_document(&update);

        let result = if many {
            let action = collection.update_many(filter, update);
            match session {
                Some(session) => action.session(session).await,
                None => action.await,
            }
        } else {
            let action = collection.update_one(filter, update);
            match session {
                Some(session) => action.session(session).await,
                None => action.await,
            }
        }
        .map_err(DocumentStoreError::store)?;

        Ok(UpdateOutcome::new(result.matched_count, result.modified_count))
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    type Session = ClientSession;

    async fn insert_one(&self, collection: &str, document: Document) -> DocumentStoreResult<()> {
        self.get_collection(collection)
            .insert_one(document)
            .await
            .map_err(DocumentStoreError::store)?;

        Ok(())
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> DocumentStoreResult<()> {
        // The server rejects an empty batch.
        if documents.is_empty() {
            return Ok(());
        }

        self.get_collection(collection)
            .insert_many(documents)
            .await
            .map_err(DocumentStoreError::store)?;

        Ok(())
    }

    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<Vec<Document>> {
        let mut options = FindOptions::default();

        options.sort = sort_document(&query.sort);
        options.skip = query.offset;
        if let Some(limit) = query.limit {
            options.limit = Some(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        if let Some(projection) = &query.projection {
            options.projection = Some(projection_document(projection));
        }

        self.get_collection(collection)
            .find(MongoQueryTranslator::filter(query.filter.as_ref())?)
            .with_options(options)
            .await
            .map_err(DocumentStoreError::store)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(DocumentStoreError::store)
    }

    async fn count(&self, collection: &str, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(MongoQueryTranslator::filter(filter.as_ref())?)
            .await
            .map_err(DocumentStoreError::store)
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: Expr,
        replacement: Document,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<UpdateOutcome> {
        let coll = self.get_collection(collection);
        let action = coll
            .replace_one(MongoQueryTranslator::filter(Some(&filter))?, replacement);

        let result = match session {
            Some(session) => action.session(session).await,
            None => action.await,
        }
        .map_err(DocumentStoreError::store)?;

        Ok(UpdateOutcome::new(result.matched_count, result.modified_count))
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Expr,
        update: Update,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<UpdateOutcome> {
        self.apply_update(collection, filter, update, session, false)
            .await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Expr,
        update: Update,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<UpdateOutcome> {
        self.apply_update(collection, filter, update, session, true)
            .await
    }

    async fn delete_one(&self, collection: &str, filter: Expr) -> DocumentStoreResult<u64> {
        Ok(self
            .get_collection(collection)
            .delete_one(MongoQueryTranslator::filter(Some(&filter))?)
            .await
            .map_err(DocumentStoreError::store)?
            .deleted_count)
    }

    async fn delete_many(&self, collection: &str, filter: Expr) -> DocumentStoreResult<u64> {
        Ok(self
            .get_collection(collection)
            .delete_many(MongoQueryTranslator::filter(Some(&filter))?)
            .await
            .map_err(DocumentStoreError::store)?
            .deleted_count)
    }

    async fn aggregate(&self, collection: &str, pipeline: Pipeline) -> DocumentStoreResult<Vec<Document>> {
        self.get_collection(collection)
            .aggregate(pipeline_documents(&pipeline)?)
            .await
            .map_err(DocumentStoreError::store)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(DocumentStoreError::store)
    }

    async fn create_index(
        &self,
        collection: &str,
        keys: IndexKeys,
        options: Option<IndexOptions>,
    ) -> DocumentStoreResult<String> {
        if keys.is_empty() {
            return Err(DocumentStoreError::InvalidArgument(
                "an index needs at least one key".into(),
            ));
        }

        let model = match options {
            Some(options) => IndexModel::builder()
                .keys(index_keys_document(&keys))
                .options(index_options(options))
                .build(),
            None => IndexModel::builder()
                .keys(index_keys_document(&keys))
                .build(),
        };

        let name = self
            .get_collection(collection)
            .create_index(model)
            .await
            .map_err(DocumentStoreError::store)?
            .index_name;

        debug!("Created index {name} on {collection}");

        Ok(name)
    }

    async fn list_index_names(&self, collection: &str) -> DocumentStoreResult<Vec<String>> {
        self.get_collection(collection)
            .list_index_names()
            .await
            .map_err(DocumentStoreError::store)
    }

    async fn drop_index(&self, collection: &str, name: &str) -> DocumentStoreResult<()> {
        self.get_collection(collection)
            .drop_index(name)
            .await
            .map_err(DocumentStoreError::store)?;

        debug!("Dropped index {name} on {collection}");

        Ok(())
    }

    async fn drop_collection(&self, collection: &str) -> DocumentStoreResult<()> {
        self.get_collection(collection)
            .drop()
            .await
            .map_err(DocumentStoreError::store)
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(DocumentStoreError::store)
    }

    async fn start_session(&self) -> DocumentStoreResult<Self::Session> {
        self.client
            .start_session()
            .await
            .map_err(DocumentStoreError::store)
    }

    async fn start_transaction(&self, session: &mut Self::Session) -> DocumentStoreResult<()> {
        session
            .start_transaction()
            .await
            .map_err(DocumentStoreError::store)
    }

    async fn commit_transaction(&self, session: &mut Self::Session) -> DocumentStoreResult<()> {
        session
            .commit_transaction()
            .await
            .map_err(DocumentStoreError::store)
    }

    async fn abort_transaction(&self, session: &mut Self::Session) -> DocumentStoreResult<()> {
        session
            .abort_transaction()
            .await
            .map_err(DocumentStoreError::store)?;

        debug!("Aborted transaction on {}", self.database);

        Ok(())
    }

    async fn shutdown(&self) -> DocumentStoreResult<()> {
        self.client.clone().shutdown().await;

        Ok(())
    }
}

/// Connects a [`MongoDbStore`] from a connection string.
pub struct MongoDbStoreBuilder {
    dsn: String,
    database: Option<String>,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: Some(database.to_string()),
        }
    }

    /// Takes the database from the connection string's path, e.g. `mongodb://host/orders`.
    pub fn from_uri(dsn: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: None,
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        let database = match self.database.or_else(|| options.default_database.clone()) {
            Some(database) => database,
            None => {
                return Err(DocumentStoreError::Initialization(
                    "no database given and none found in the connection string".into(),
                ));
            }
        };

        let client = Client::with_options(options)
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        debug!("Connected MongoDB store to database {database}");

        Ok(MongoDbStore::new(client, database))
    }
}
