use tracing::debug;

use super::{DataAccess, require_field};
use crate::{
    backend::StoreBackend,
    document::Document,
    error::{DocumentStoreError, DocumentStoreResult},
    index::{IndexKeys, IndexKind, IndexOptions},
};

impl<B: StoreBackend> DataAccess<'_, B> {
    /// Creates a text index on `field` and returns its name.
    pub async fn create_text_index<D: Document>(
        &self,
        field: &str,
        options: Option<IndexOptions>,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<String> {
        self.create_single_index::<D>(field, IndexKind::Text, options, partition_key)
            .await
    }

    /// Creates an ascending index on `field` and returns its name.
    pub async fn create_ascending_index<D: Document>(
        &self,
        field: &str,
        options: Option<IndexOptions>,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<String> {
        self.create_single_index::<D>(field, IndexKind::Ascending, options, partition_key)
            .await
    }

    /// Creates a descending index on `field` and returns its name.
    pub async fn create_descending_index<D: Document>(
        &self,
        field: &str,
        options: Option<IndexOptions>,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<String> {
        self.create_single_index::<D>(field, IndexKind::Descending, options, partition_key)
            .await
    }

    /// Creates a hashed index on `field` and returns its name.
    pub async fn create_hashed_index<D: Document>(
        &self,
        field: &str,
        options: Option<IndexOptions>,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<String> {
        self.create_single_index::<D>(field, IndexKind::Hashed, options, partition_key)
            .await
    }

    /// Creates one text index spanning all `fields` and returns its name.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidArgument`] when `fields` is empty or holds an
    /// empty name.
    pub async fn create_combined_text_index<D, I, S>(
        &self,
        fields: I,
        options: Option<IndexOptions>,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<String>
    where
        D: Document,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys = IndexKeys::text(fields);
        if keys.is_empty() {
            return Err(DocumentStoreError::InvalidArgument(
                "a combined text index needs at least one field".to_string(),
            ));
        }

        for (field, _) in keys.keys() {
            require_field(field)?;
        }

        self.create_index::<D>(keys, options, partition_key)
            .await
    }

    async fn create_single_index<D: Document>(
        &self,
        field: &str,
        kind: IndexKind,
        options: Option<IndexOptions>,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<String> {
        require_field(field)?;

        self.create_index::<D>(IndexKeys::single(field, kind), options, partition_key)
            .await
    }

    /// Creates an index from explicit keys and returns its name.
    pub async fn create_index<D: Document>(
        &self,
        keys: IndexKeys,
        options: Option<IndexOptions>,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<String> {
        let collection = self.collection::<D>(partition_key);
        debug!("create index {} on '{}'", keys.default_name(), collection);

        self.backend()
            .create_index(&collection, keys, options)
            .await
    }

    /// Lists the index names of the collection of `D`.
    pub async fn get_index_names<D: Document>(
        &self,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<Vec<String>> {
        let collection = self.collection::<D>(partition_key);

        self.backend()
            .list_index_names(&collection)
            .await
    }

    /// Drops an index by name.
    pub async fn drop_index<D: Document>(
        &self,
        name: &str,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<()> {
        let collection = self.collection::<D>(partition_key);
        debug!("drop index '{}' on '{}'", name, collection);

        self.backend()
            .drop_index(&collection, name)
            .await
    }

    /// Drops the collection of `D` for the given partition key.
    pub async fn drop_collection<D: Document>(
        &self,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<()> {
        self.context()
            .drop_collection::<D>(partition_key)
            .await
    }
}
