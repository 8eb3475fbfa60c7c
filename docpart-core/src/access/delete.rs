use tracing::{debug, warn};

use super::{DataAccess, group_by_partition};
use crate::{
    backend::StoreBackend,
    document::Document,
    error::DocumentStoreResult,
    query::{Expr, Filter},
};

impl<B: StoreBackend> DataAccess<'_, B> {
    /// Deletes the stored copy of `document`, matched by id. Returns the deleted count.
    pub async fn delete_one<D: Document>(&self, document: &D) -> DocumentStoreResult<u64> {
        let collection = self.collection_for(document);
        debug!("delete one from '{}'", collection);

        self.backend()
            .delete_one(&collection, Filter::id(document.id().clone()))
            .await
    }

    /// Deletes the first document matching `filter`.
    pub async fn delete_one_where<D: Document>(
        &self,
        filter: Expr,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<u64> {
        let collection = self.collection::<D>(partition_key);
        debug!("delete one from '{}'", collection);

        self.backend()
            .delete_one(&collection, filter)
            .await
    }

    /// Deletes every document matching `filter`.
    pub async fn delete_many_where<D: Document>(
        &self,
        filter: Expr,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<u64> {
        let collection = self.collection::<D>(partition_key);
        debug!("delete many from '{}'", collection);

        self.backend()
            .delete_many(&collection, filter)
            .await
    }

    /// Deletes the stored copies of `documents`, one call per partition, and returns the sum
    /// of the per-partition deleted counts.
    ///
    /// # Errors
    ///
    /// Returns the first store error. Partitions processed before it stay deleted.
    pub async fn delete_many<D: Document>(&self, documents: &[D]) -> DocumentStoreResult<u64> {
        let groups = group_by_partition(documents);
        let total = groups.len();
        let mut deleted = 0;

        for (committed, (partition, members)) in groups.into_iter().enumerate() {
            let collection = self.collection::<D>(partition);
            debug!("delete_many: {} documents from '{}'", members.len(), collection);

            let filter = Filter::ids(
                members
                    .into_iter()
                    .map(|document| document.id().clone()),
            );

            match self
                .backend()
                .delete_many(&collection, filter)
                .await
            {
                Ok(count) => deleted += count,
                Err(err) => {
                    warn!(
                        "delete_many aborted at '{}' after {} of {} partitions ({} deleted): {}",
                        collection, committed, total, deleted, err
                    );
                    return Err(err);
                }
            }
        }

        Ok(deleted)
    }
}
