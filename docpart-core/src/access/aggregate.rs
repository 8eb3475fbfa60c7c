use bson::Bson;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{DataAccess, decode_all, require_field};
use crate::{
    aggregate::{Accumulator, Group, Pipeline},
    backend::StoreBackend,
    document::{Document, value_from_bson},
    error::DocumentStoreResult,
    query::Expr,
};

const SUM_FIELD: &str = "total";

impl<B: StoreBackend> DataAccess<'_, B> {
    /// Sums a numeric field over the documents matching `filter`.
    ///
    /// An empty match yields zero. The result type follows the stored values: integer fields
    /// sum to an integer unless `V` asks for a float.
    pub async fn sum_by<D: Document, V: DeserializeOwned>(
        &self,
        filter: Option<Expr>,
        field: &str,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<V> {
        require_field(field)?;

        let pipeline = Pipeline::new()
            .matching_opt(filter)
            .group(Group::all().accumulate(SUM_FIELD, Accumulator::Sum(field.to_string())));

        let total = self
            .run_pipeline::<D>(pipeline, partition_key)
            .await?
            .into_iter()
            .next()
            .and_then(|mut document| document.remove(SUM_FIELD))
            .unwrap_or(Bson::Int32(0));

        value_from_bson(total)
    }

    /// Groups the documents matching `filter` and decodes each group as `P`.
    ///
    /// Each output document carries the group key under `_id` and one field per accumulator.
    pub async fn group_by<D: Document, P: DeserializeOwned>(
        &self,
        filter: Option<Expr>,
        group: Group,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<Vec<P>> {
        let pipeline = Pipeline::new()
            .matching_opt(filter)
            .group(group);

        self.aggregate::<D, P>(pipeline, partition_key)
            .await
    }

    /// Runs an arbitrary pipeline against the collection of `D`.
    pub async fn aggregate<D: Document, P: DeserializeOwned>(
        &self,
        pipeline: Pipeline,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<Vec<P>> {
        decode_all(
            self.run_pipeline::<D>(pipeline, partition_key)
                .await?,
        )
    }

    async fn run_pipeline<D: Document>(
        &self,
        pipeline: Pipeline,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<Vec<bson::Document>> {
        let collection = self.collection::<D>(partition_key);
        debug!("aggregate {} stages in '{}'", pipeline.stages().len(), collection);

        self.backend()
            .aggregate(&collection, pipeline)
            .await
    }
}
