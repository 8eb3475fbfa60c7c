use tracing::{debug, warn};

use super::{DataAccess, group_by_partition};
use crate::{
    backend::StoreBackend,
    document::{Document, DocumentExt},
    error::DocumentStoreResult,
};

impl<B: StoreBackend> DataAccess<'_, B> {
    /// Inserts a document into the collection it routes to, assigning an identifier first if
    /// none is set.
    ///
    /// # Errors
    ///
    /// - [`UnsupportedIdentifierType`](crate::error::DocumentStoreError::UnsupportedIdentifierType)
    ///   if the id is unset and its type cannot be generated.
    /// - The store's error when the insert fails.
    pub async fn add_one<D: Document>(&self, document: &mut D) -> DocumentStoreResult<()> {
        document.prepare_insert()?;

        let collection = self.collection_for(document);
        debug!("add_one into '{}'", collection);

        self.backend()
            .insert_one(&collection, document.to_document()?)
            .await
    }

    /// Inserts documents, one insert call per partition.
    ///
    /// Identifiers are assigned to every document before anything is written, so an
    /// unsupported identifier type fails the whole call up front. An empty slice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the first store error. Partitions inserted before the failing one remain
    /// committed; later partitions are not attempted.
    pub async fn add_many<D: Document>(&self, documents: &mut [D]) -> DocumentStoreResult<()> {
        if documents.is_empty() {
            return Ok(());
        }

        for document in documents.iter_mut() {
            document.prepare_insert()?;
        }

        let groups = group_by_partition(documents.iter());
        let total = groups.len();

        for (committed, (partition, members)) in groups.into_iter().enumerate() {
            let collection = self.collection::<D>(partition);
            debug!("add_many: {} documents into '{}'", members.len(), collection);

            let batch = members
                .into_iter()
                .map(|document| document.to_document())
                .collect::<DocumentStoreResult<Vec<_>>>()?;

            if let Err(err) = self
                .backend()
                .insert_many(&collection, batch)
                .await
            {
                warn!(
                    "add_many aborted at '{}' after {} of {} partitions: {}",
                    collection, committed, total, err
                );
                return Err(err);
            }
        }

        Ok(())
    }
}
