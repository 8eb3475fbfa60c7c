//! In-memory storage implementation.
//!
//! Collections hold their documents in insertion order (the natural order returned by
//! unsorted queries) together with their index definitions. Unique indexes, including the
//! implicit `_id_` index, are enforced on every write.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument, oid::ObjectId};
use mea::rwlock::RwLock;
use tracing::debug;

use docpart_core::{
    aggregate::Pipeline,
    backend::{StoreBackend, StoreBackendBuilder},
    document::{ID_FIELD, get_path},
    error::DocumentStoreResult,
    index::{IndexKeys, IndexKind, IndexOptions},
    query::{Expr, Query},
    update::{Update, UpdateOutcome},
};

use crate::{
    error::{MemoryResult, MemoryStoreError},
    evaluator::{DocumentEvaluator, compare_values, sort_documents},
    mutate::{apply_update, project},
    pipeline,
};

const ID_INDEX: &str = "_id_";

#[derive(Debug, Clone)]
struct IndexEntry {
    name: String,
    keys: IndexKeys,
    unique: bool,
    sparse: bool,
}

impl IndexEntry {
    fn primary() -> Self {
        Self {
            name: ID_INDEX.to_string(),
            keys: IndexKeys::single(ID_FIELD, IndexKind::Ascending),
            unique: true,
            sparse: false,
        }
    }

    /// The key tuple of `document`, or `None` when a sparse index skips it.
    fn key_of(&self, document: &BsonDocument) -> Option<Vec<Bson>> {
        let values: Vec<Option<&Bson>> = self
            .keys
            .keys()
            .iter()
            .map(|(field, _)| get_path(document, field))
            .collect();

        if self.sparse && values.iter().all(Option::is_none) {
            return None;
        }

        Some(
            values
                .into_iter()
                .map(|value| value.cloned().unwrap_or(Bson::Null))
                .collect(),
        )
    }
}

fn same_key(left: &[Bson], right: &[Bson]) -> bool {
    left.iter()
        .zip(right)
        .all(|(a, b)| compare_values(Some(a), Some(b)).is_eq())
}

#[derive(Debug, Clone)]
struct CollectionData {
    documents: Vec<BsonDocument>,
    indexes: Vec<IndexEntry>,
}

impl Default for CollectionData {
    fn default() -> Self {
        Self {
            documents: Vec::new(),
            indexes: vec![IndexEntry::primary()],
        }
    }
}

impl CollectionData {
    /// Checks `candidate` against every unique index, ignoring the document at `skip`.
    fn check_unique(
        &self,
        collection: &str,
        candidate: &BsonDocument,
        skip: Option<usize>,
    ) -> MemoryResult<()> {
        for index in self.indexes.iter().filter(|index| index.unique) {
            let Some(key) = index.key_of(candidate) else {
                continue;
            };

            let clash = self
                .documents
                .iter()
                .enumerate()
                .filter(|(position, _)| Some(*position) != skip)
                .filter_map(|(_, existing)| index.key_of(existing))
                .any(|existing| same_key(&existing, &key));

            if clash {
                return Err(MemoryStoreError::DuplicateKey {
                    collection: collection.to_string(),
                    index: index.name.clone(),
                    key: format!("{key:?}"),
                });
            }
        }

        Ok(())
    }

    fn insert(&mut self, collection: &str, mut document: BsonDocument) -> MemoryResult<()> {
        if !document.contains_key(ID_FIELD) {
            document.insert(ID_FIELD, ObjectId::new());
        }

        self.check_unique(collection, &document, None)?;
        self.documents.push(document);

        Ok(())
    }

    fn positions(&self, filter: Option<&Expr>, first_only: bool) -> DocumentStoreResult<Vec<usize>> {
        let mut positions = Vec::new();

        for (position, document) in self.documents.iter().enumerate() {
            if DocumentEvaluator::matches(document, filter)? {
                positions.push(position);

                if first_only {
                    break;
                }
            }
        }

        Ok(positions)
    }

    /// Applies `update` to the matching documents. The previous version of every modified
    /// document is pushed to `replaced`, including those modified before a failure.
    fn update(
        &mut self,
        collection: &str,
        filter: &Expr,
        update: &Update,
        first_only: bool,
        replaced: &mut Vec<BsonDocument>,
    ) -> DocumentStoreResult<UpdateOutcome> {
        let positions = self.positions(Some(filter), first_only)?;
        let mut modified = 0;

        for &position in &positions {
            let mut candidate = self.documents[position].clone();

            if apply_update(&mut candidate, update)? {
                self.check_unique(collection, &candidate, Some(position))?;
                replaced.push(std::mem::replace(&mut self.documents[position], candidate));
                modified += 1;
            }
        }

        Ok(UpdateOutcome::new(positions.len() as u64, modified))
    }

    fn replace(
        &mut self,
        collection: &str,
        filter: &Expr,
        mut replacement: BsonDocument,
        replaced: &mut Vec<BsonDocument>,
    ) -> DocumentStoreResult<UpdateOutcome> {
        let Some(&position) = self.positions(Some(filter), true)?.first() else {
            return Ok(UpdateOutcome::default());
        };

        let current_id = self.documents[position]
            .get(ID_FIELD)
            .cloned()
            .unwrap_or(Bson::Null);

        match replacement.remove(ID_FIELD) {
            Some(id) if id != current_id => return Err(MemoryStoreError::ImmutableId.into()),
            _ => {}
        }

        let mut stored = BsonDocument::new();
        stored.insert(ID_FIELD, current_id);
        for (key, value) in replacement {
            stored.insert(key, value);
        }

        if stored == self.documents[position] {
            return Ok(UpdateOutcome::new(1, 0));
        }

        self.check_unique(collection, &stored, Some(position))?;
        replaced.push(std::mem::replace(&mut self.documents[position], stored));

        Ok(UpdateOutcome::new(1, 1))
    }

    fn delete(&mut self, filter: &Expr, first_only: bool) -> DocumentStoreResult<u64> {
        let positions = self.positions(Some(filter), first_only)?;

        for &position in positions.iter().rev() {
            self.documents.remove(position);
        }

        Ok(positions.len() as u64)
    }

    /// Puts `previous` back in place of the stored document with the same `_id`.
    fn restore(&mut self, previous: BsonDocument) -> bool {
        let id = previous.get(ID_FIELD).cloned();

        match self
            .documents
            .iter_mut()
            .find(|document| compare_values(document.get(ID_FIELD), id.as_ref()).is_eq())
        {
            Some(current) => {
                *current = previous;
                true
            }
            None => false,
        }
    }
}

type StoreMap = HashMap<String, CollectionData>;

/// Thread-safe in-memory document storage backend.
///
/// Cloning an `InMemoryStore` yields another handle to the same data. All state lives behind
/// a single async read-write lock, so each call observes and produces a consistent snapshot.
///
/// Index options other than `unique`, `sparse` and `name` are accepted and ignored.
///
/// # Example
///
/// ```ignore
/// use bson::doc;
/// use docpart_memory::InMemoryStore;
/// use docpart_core::{backend::StoreBackend, query::Query};
///
/// let store = InMemoryStore::new();
/// store.insert_one("users", doc! { "_id": 1, "name": "Alice" }).await?;
///
/// let users = store.find("users", Query::new()).await?;
/// assert_eq!(users.len(), 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> documents and indexes
    store: Arc<RwLock<StoreMap>>,
}

/// A session on an [`InMemoryStore`].
///
/// While a transaction runs, the session journals the previous version of every document it
/// updates or replaces. Aborting puts those versions back and leaves other callers' writes
/// alone. Session writes are visible to other callers before commit.
#[derive(Debug, Default)]
pub struct MemorySession {
    journal: Option<Vec<(String, BsonDocument)>>,
}

impl MemorySession {
    pub fn in_transaction(&self) -> bool {
        self.journal.is_some()
    }

    fn record(&mut self, collection: &str, replaced: Vec<BsonDocument>) {
        if let Some(journal) = &mut self.journal {
            journal.extend(
                replaced
                    .into_iter()
                    .map(|document| (collection.to_string(), document)),
            );
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder
    }

    async fn update_with(
        &self,
        collection: &str,
        filter: Expr,
        update: Update,
        first_only: bool,
        session: Option<&mut MemorySession>,
    ) -> DocumentStoreResult<UpdateOutcome> {
        let mut store = self.store.write().await;
        let Some(data) = store.get_mut(collection) else {
            return Ok(UpdateOutcome::default());
        };

        let mut replaced = Vec::new();
        let outcome = data.update(collection, &filter, &update, first_only, &mut replaced);

        if let Some(session) = session {
            session.record(collection, replaced);
        }

        outcome
    }

    async fn delete_with(
        &self,
        collection: &str,
        filter: Expr,
        first_only: bool,
    ) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;

        match store.get_mut(collection) {
            Some(data) => data.delete(&filter, first_only),
            None => Ok(0),
        }
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    type Session = MemorySession;

    async fn insert_one(&self, collection: &str, document: BsonDocument) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;

        Ok(store
            .entry(collection.to_string())
            .or_default()
            .insert(collection, document)?)
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<BsonDocument>,
    ) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let data = store
            .entry(collection.to_string())
            .or_default();

        for document in documents {
            data.insert(collection, document)?;
        }

        Ok(())
    }

    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<Vec<BsonDocument>> {
        let store = self.store.read().await;
        let Some(data) = store.get(collection) else {
            return Ok(Vec::new());
        };

        let mut documents: Vec<BsonDocument> = data
            .positions(query.filter.as_ref(), false)?
            .into_iter()
            .map(|position| data.documents[position].clone())
            .collect();

        sort_documents(&mut documents, &query.sort);

        let skip = usize::try_from(query.offset.unwrap_or(0)).unwrap_or(usize::MAX);
        let take = query
            .limit
            .and_then(|limit| usize::try_from(limit).ok())
            .unwrap_or(usize::MAX);

        Ok(documents
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|document| match &query.projection {
                Some(projection) => project(&document, projection),
                None => document,
            })
            .collect())
    }

    async fn count(&self, collection: &str, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        let store = self.store.read().await;

        match store.get(collection) {
            Some(data) => Ok(data.positions(filter.as_ref(), false)?.len() as u64),
            None => Ok(0),
        }
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: Expr,
        replacement: BsonDocument,
        session: Option<&mut MemorySession>,
    ) -> DocumentStoreResult<UpdateOutcome> {
        let mut store = self.store.write().await;
        let Some(data) = store.get_mut(collection) else {
            return Ok(UpdateOutcome::default());
        };

        let mut replaced = Vec::new();
        let outcome = data.replace(collection, &filter, replacement, &mut replaced);

        if let Some(session) = session {
            session.record(collection, replaced);
        }

        outcome
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Expr,
        update: Update,
        session: Option<&mut MemorySession>,
    ) -> DocumentStoreResult<UpdateOutcome> {
        self.update_with(collection, filter, update, true, session)
            .await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Expr,
        update: Update,
        session: Option<&mut MemorySession>,
    ) -> DocumentStoreResult<UpdateOutcome> {
        self.update_with(collection, filter, update, false, session)
            .await
    }

    async fn delete_one(&self, collection: &str, filter: Expr) -> DocumentStoreResult<u64> {
        self.delete_with(collection, filter, true)
            .await
    }

    async fn delete_many(&self, collection: &str, filter: Expr) -> DocumentStoreResult<u64> {
        self.delete_with(collection, filter, false)
            .await
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Pipeline,
    ) -> DocumentStoreResult<Vec<BsonDocument>> {
        let documents = self
            .store
            .read()
            .await
            .get(collection)
            .map(|data| data.documents.clone())
            .unwrap_or_default();

        pipeline::run(documents, &pipeline)
    }

    async fn create_index(
        &self,
        collection: &str,
        keys: IndexKeys,
        options: Option<IndexOptions>,
    ) -> DocumentStoreResult<String> {
        if keys.is_empty() {
            return Err(MemoryStoreError::EmptyIndexKeys.into());
        }

        let options = options.unwrap_or_default();
        let entry = IndexEntry {
            name: options
                .name
                .unwrap_or_else(|| keys.default_name()),
            keys,
            unique: options.unique.unwrap_or(false),
            sparse: options.sparse.unwrap_or(false),
        };

        let mut store = self.store.write().await;
        let data = store
            .entry(collection.to_string())
            .or_default();

        if let Some(existing) = data
            .indexes
            .iter()
            .find(|index| index.name == entry.name)
        {
            if existing.keys != entry.keys {
                return Err(MemoryStoreError::IndexKeySpecsConflict(entry.name).into());
            }

            return Ok(entry.name);
        }

        if entry.unique {
            let mut seen: Vec<Vec<Bson>> = Vec::new();

            for key in data.documents.iter().filter_map(|document| entry.key_of(document)) {
                if seen.iter().any(|other| same_key(other, &key)) {
                    return Err(MemoryStoreError::DuplicateKey {
                        collection: collection.to_string(),
                        index: entry.name.clone(),
                        key: format!("{key:?}"),
                    }
                    .into());
                }

                seen.push(key);
            }
        }

        let name = entry.name.clone();
        data.indexes.push(entry);

        debug!("Created index {name} on {collection}");

        Ok(name)
    }

    async fn list_index_names(&self, collection: &str) -> DocumentStoreResult<Vec<String>> {
        let store = self.store.read().await;

        match store.get(collection) {
            Some(data) => Ok(data
                .indexes
                .iter()
                .map(|index| index.name.clone())
                .collect()),
            None => Err(MemoryStoreError::NamespaceNotFound(collection.to_string()).into()),
        }
    }

    async fn drop_index(&self, collection: &str, name: &str) -> DocumentStoreResult<()> {
        if name == ID_INDEX {
            return Err(MemoryStoreError::CannotDropIdIndex.into());
        }

        let mut store = self.store.write().await;
        let Some(data) = store.get_mut(collection) else {
            return Err(MemoryStoreError::NamespaceNotFound(collection.to_string()).into());
        };

        let before = data.indexes.len();
        data.indexes
            .retain(|index| index.name != name);

        if data.indexes.len() == before {
            return Err(MemoryStoreError::IndexNotFound {
                collection: collection.to_string(),
                index: name.to_string(),
            }
            .into());
        }

        Ok(())
    }

    async fn drop_collection(&self, collection: &str) -> DocumentStoreResult<()> {
        self.store
            .write()
            .await
            .remove(collection);

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        let mut names: Vec<String> = self
            .store
            .read()
            .await
            .keys()
            .cloned()
            .collect();
        names.sort();

        Ok(names)
    }

    async fn start_session(&self) -> DocumentStoreResult<MemorySession> {
        Ok(MemorySession::default())
    }

    async fn start_transaction(&self, session: &mut MemorySession) -> DocumentStoreResult<()> {
        if session.in_transaction() {
            return Err(MemoryStoreError::TransactionInProgress.into());
        }

        session.journal = Some(Vec::new());

        Ok(())
    }

    async fn commit_transaction(&self, session: &mut MemorySession) -> DocumentStoreResult<()> {
        match session.journal.take() {
            Some(_) => Ok(()),
            None => Err(MemoryStoreError::NoTransaction.into()),
        }
    }

    async fn abort_transaction(&self, session: &mut MemorySession) -> DocumentStoreResult<()> {
        let journal = session
            .journal
            .take()
            .ok_or(MemoryStoreError::NoTransaction)?;

        let mut store = self.store.write().await;
        let mut restored = 0;

        for (collection, previous) in journal.into_iter().rev() {
            let Some(data) = store.get_mut(&collection) else {
                continue;
            };

            if data.restore(previous) {
                restored += 1;
            }
        }

        debug!("Transaction aborted, {restored} documents restored");

        Ok(())
    }
}

/// Builder for [`InMemoryStore`]. Takes no configuration.
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docpart_core::{
        error::DocumentStoreError,
        query::{Filter, SortSpec},
    };

    fn memory_error(err: &DocumentStoreError) -> &MemoryStoreError {
        err.store_source::<MemoryStoreError>()
            .expect("memory store error")
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = InMemoryStore::new();
        store.insert_one("c", doc! { "_id": 1 }).await.unwrap();

        let err = store
            .insert_one("c", doc! { "_id": 1 })
            .await
            .unwrap_err();

        assert!(matches!(memory_error(&err), MemoryStoreError::DuplicateKey { index, .. } if index == "_id_"));
    }

    #[tokio::test]
    async fn insert_many_stops_at_first_failure() {
        let store = InMemoryStore::new();
        let result = store
            .insert_many("c", vec![doc! { "_id": 1 }, doc! { "_id": 1 }, doc! { "_id": 2 }])
            .await;

        assert!(result.is_err());
        assert_eq!(store.count("c", None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn find_applies_sort_window_and_projection() {
        let store = InMemoryStore::new();
        store
            .insert_many(
                "c",
                (1..=5)
                    .map(|n| doc! { "_id": n, "n": 10 - n, "extra": true })
                    .collect(),
            )
            .await
            .unwrap();

        let query = Query::builder()
            .filter(Filter::gt("_id", 1))
            .sort(SortSpec::new().asc("n"))
            .offset(1)
            .limit(2)
            .projection(docpart_core::query::Projection::include(["n"]))
            .build();

        let found = store.find("c", query).await.unwrap();

        assert_eq!(found, vec![doc! { "_id": 4, "n": 6 }, doc! { "_id": 3, "n": 7 }]);
    }

    #[tokio::test]
    async fn unique_indexes_are_enforced() {
        let store = InMemoryStore::new();
        store.insert_one("c", doc! { "_id": 1, "email": "a@x" }).await.unwrap();

        let name = store
            .create_index(
                "c",
                IndexKeys::single("email", IndexKind::Ascending),
                Some(IndexOptions::new().unique(true)),
            )
            .await
            .unwrap();
        assert_eq!(name, "email_1");

        assert!(store.insert_one("c", doc! { "_id": 2, "email": "a@x" }).await.is_err());

        store.insert_one("c", doc! { "_id": 3, "email": "b@x" }).await.unwrap();
        let err = store
            .update_one("c", Filter::id(3), Update::field("email", "a@x"), None)
            .await
            .unwrap_err();
        assert!(matches!(memory_error(&err), MemoryStoreError::DuplicateKey { .. }));

        store.drop_index("c", "email_1").await.unwrap();
        assert_eq!(store.list_index_names("c").await.unwrap(), ["_id_"]);
    }

    #[tokio::test]
    async fn replace_keeps_the_id() {
        let store = InMemoryStore::new();
        store.insert_one("c", doc! { "_id": 1, "a": 1 }).await.unwrap();

        let outcome = store
            .replace_one("c", Filter::id(1), doc! { "a": 2 }, None)
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::new(1, 1));

        let unchanged = store
            .replace_one("c", Filter::id(1), doc! { "_id": 1, "a": 2 }, None)
            .await
            .unwrap();
        assert_eq!(unchanged, UpdateOutcome::new(1, 0));

        assert!(store
            .replace_one("c", Filter::id(1), doc! { "_id": 9, "a": 3 }, None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn aborted_transactions_restore_session_writes() {
        let store = InMemoryStore::new();
        store.insert_one("c", doc! { "_id": 1, "a": 1 }).await.unwrap();

        let mut session = store.start_session().await.unwrap();
        store.start_transaction(&mut session).await.unwrap();
        store
            .update_one("c", Filter::id(1), Update::field("a", 2), Some(&mut session))
            .await
            .unwrap();
        store.abort_transaction(&mut session).await.unwrap();

        let found = store.find("c", Query::new()).await.unwrap();
        assert_eq!(found, vec![doc! { "_id": 1, "a": 1 }]);
        assert!(store.commit_transaction(&mut session).await.is_err());
    }

    #[tokio::test]
    async fn aborting_keeps_writes_made_outside_the_session() {
        let store = InMemoryStore::new();
        store
            .insert_many("c", vec![doc! { "_id": 1, "a": 1 }, doc! { "_id": 2, "a": 1 }])
            .await
            .unwrap();

        let mut session = store.start_session().await.unwrap();
        store.start_transaction(&mut session).await.unwrap();
        store
            .update_many("c", Filter::id(1), Update::new().inc("a", 1), Some(&mut session))
            .await
            .unwrap();
        store
            .replace_one("c", Filter::id(1), doc! { "a": 10 }, Some(&mut session))
            .await
            .unwrap();

        store
            .update_one("c", Filter::id(2), Update::field("a", 5), None)
            .await
            .unwrap();
        store.insert_one("other", doc! { "_id": 3 }).await.unwrap();

        store.abort_transaction(&mut session).await.unwrap();

        let found = store
            .find("c", Query::builder().sort(SortSpec::new().asc("_id")).build())
            .await
            .unwrap();
        assert_eq!(found, vec![doc! { "_id": 1, "a": 1 }, doc! { "_id": 2, "a": 5 }]);
        assert_eq!(store.count("other", None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn ids_beyond_double_precision_stay_distinct() {
        let store = InMemoryStore::new();
        let base = 1_i64 << 53;

        store.insert_one("c", doc! { "_id": base, "n": 0 }).await.unwrap();
        store.insert_one("c", doc! { "_id": base + 1, "n": 1 }).await.unwrap();

        let found = store
            .find("c", Query::builder().filter(Filter::id(base + 1)).build())
            .await
            .unwrap();
        assert_eq!(found, vec![doc! { "_id": base + 1, "n": 1 }]);
    }

    #[tokio::test]
    async fn invalid_filters_fail_reads_and_writes() {
        let store = InMemoryStore::new();
        store.insert_one("c", doc! { "_id": 1, "code": "AB" }).await.unwrap();

        let filter = Filter::starts_with("code", 1);

        assert!(matches!(
            store.find("c", Query::builder().filter(filter.clone()).build()).await,
            Err(DocumentStoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.count("c", Some(filter.clone())).await,
            Err(DocumentStoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.delete_many("c", filter).await,
            Err(DocumentStoreError::InvalidArgument(_))
        ));
        assert_eq!(store.count("c", None).await.unwrap(), 1);
    }
}
