use serde::de::DeserializeOwned;
use tracing::debug;

use super::{DataAccess, decode_all, require_field};
use crate::{
    backend::StoreBackend,
    document::{Document, DocumentExt, get_path, value_from_bson},
    error::{DocumentStoreError, DocumentStoreResult},
    page::{Page, PaginationParams, Window},
    query::{Expr, Filter, Projection, Query, SortDirection, SortSpec},
};

impl<B: StoreBackend> DataAccess<'_, B> {
    /// Runs a query and decodes every returned document.
    pub async fn find<D: Document>(
        &self,
        query: Query,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<Vec<D>> {
        let collection = self.collection::<D>(partition_key);
        debug!("find in '{}'", collection);

        self.backend()
            .find(&collection, query)
            .await?
            .into_iter()
            .map(D::from_document)
            .collect()
    }

    async fn find_first<D: Document>(
        &self,
        query: Query,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<Option<D>> {
        let query = Query { limit: Some(1), ..query };

        Ok(self
            .find::<D>(query, partition_key)
            .await?
            .into_iter()
            .next())
    }

    /// Fetches a document by identifier.
    pub async fn get_by_id<D: Document>(
        &self,
        id: &D::Id,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<Option<D>> {
        self.get_one(Filter::id(id.clone()), partition_key)
            .await
    }

    /// Returns the first document matching `filter`, in the store's natural order.
    pub async fn get_one<D: Document>(
        &self,
        filter: Expr,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<Option<D>> {
        self.find_first(Query::builder().filter(filter).build(), partition_key)
            .await
    }

    /// Returns every document matching `filter`.
    pub async fn get_all<D: Document>(
        &self,
        filter: Expr,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<Vec<D>> {
        self.find(Query::builder().filter(filter).build(), partition_key)
            .await
    }

    /// Returns `true` if at least one document matches `filter`.
    pub async fn any<D: Document>(
        &self,
        filter: Expr,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<bool> {
        Ok(self.count::<D>(filter, partition_key).await? > 0)
    }

    pub async fn count<D: Document>(
        &self,
        filter: Expr,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<u64> {
        let collection = self.collection::<D>(partition_key);
        debug!("count in '{}'", collection);

        self.backend()
            .count(&collection, Some(filter))
            .await
    }

    /// Returns the matching document with the smallest value of `field`.
    pub async fn get_by_min<D: Document>(
        &self,
        filter: Expr,
        field: &str,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<Option<D>> {
        self.get_by_extreme(filter, field, SortDirection::Asc, partition_key)
            .await
    }

    /// Returns the matching document with the largest value of `field`.
    pub async fn get_by_max<D: Document>(
        &self,
        filter: Expr,
        field: &str,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<Option<D>> {
        self.get_by_extreme(filter, field, SortDirection::Desc, partition_key)
            .await
    }

    /// Returns the smallest value of `field` among matching documents.
    ///
    /// `None` when nothing matches or the selected document lacks the field.
    pub async fn get_min_value<D: Document, V: DeserializeOwned>(
        &self,
        filter: Expr,
        field: &str,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<Option<V>> {
        self.get_extreme_value::<D, V>(filter, field, SortDirection::Asc, partition_key)
            .await
    }

    /// Returns the largest value of `field` among matching documents.
    pub async fn get_max_value<D: Document, V: DeserializeOwned>(
        &self,
        filter: Expr,
        field: &str,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<Option<V>> {
        self.get_extreme_value::<D, V>(filter, field, SortDirection::Desc, partition_key)
            .await
    }

    async fn get_by_extreme<D: Document>(
        &self,
        filter: Expr,
        field: &str,
        direction: SortDirection,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<Option<D>> {
        require_field(field)?;

        let query = Query::builder()
            .filter(filter)
            .sort_by(field, direction)
            .build();

        self.find_first(query, partition_key)
            .await
    }

    async fn get_extreme_value<D: Document, V: DeserializeOwned>(
        &self,
        filter: Expr,
        field: &str,
        direction: SortDirection,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<Option<V>> {
        require_field(field)?;

        let collection = self.collection::<D>(partition_key);
        debug!("extreme value of '{}' in '{}'", field, collection);

        let query = Query::builder()
            .filter(filter)
            .sort_by(field, direction)
            .limit(1)
            .projection(Projection::include([field]))
            .build();

        let found = self
            .backend()
            .find(&collection, query)
            .await?;

        found
            .first()
            .and_then(|document| get_path(document, field))
            .cloned()
            .map(value_from_bson::<V>)
            .transpose()
    }

    /// Returns the first matching document, reduced to `projection` and decoded as `P`.
    pub async fn project_one<D: Document, P: DeserializeOwned>(
        &self,
        filter: Expr,
        projection: Projection,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<Option<P>> {
        let query = Query::builder()
            .filter(filter)
            .projection(projection)
            .limit(1)
            .build();

        Ok(self
            .project::<D, P>(query, partition_key)
            .await?
            .into_iter()
            .next())
    }

    /// Returns every matching document, reduced to `projection` and decoded as `P`.
    pub async fn project_many<D: Document, P: DeserializeOwned>(
        &self,
        filter: Expr,
        projection: Projection,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<Vec<P>> {
        let query = Query::builder()
            .filter(filter)
            .projection(projection)
            .build();

        self.project::<D, P>(query, partition_key)
            .await
    }

    async fn project<D: Document, P: DeserializeOwned>(
        &self,
        query: Query,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<Vec<P>> {
        let collection = self.collection::<D>(partition_key);
        debug!("project in '{}'", collection);

        decode_all(
            self.backend()
                .find(&collection, query)
                .await?,
        )
    }

    /// Sorts matching documents by a single field, then applies the skip/take `window`.
    ///
    /// Ties are returned in the store's natural order; sort on a unique field when pages must
    /// not overlap.
    pub async fn get_sorted_paginated<D: Document>(
        &self,
        filter: Expr,
        sort_field: &str,
        ascending: bool,
        window: Window,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<Vec<D>> {
        require_field(sort_field)?;

        self.get_sorted_paginated_by(filter, SortSpec::by(sort_field, ascending), window, partition_key)
            .await
    }

    /// Sorts matching documents by an explicit multi-field specification, then applies the
    /// skip/take `window`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument`](crate::error::DocumentStoreError::InvalidArgument) when
    /// `window.take` is zero.
    pub async fn get_sorted_paginated_by<D: Document>(
        &self,
        filter: Expr,
        sort: SortSpec,
        window: Window,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<Vec<D>> {
        // Stores disagree on what a zero limit means.
        if window.take == 0 {
            return Err(DocumentStoreError::InvalidArgument(
                "a window must take at least one document".to_string(),
            ));
        }

        let query = Query::builder()
            .filter(filter)
            .sort(sort)
            .offset(window.skip)
            .limit(window.take)
            .build();

        self.find(query, partition_key)
            .await
    }

    /// Returns a 1-indexed page of sorted matching documents with the total match count.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument`](crate::error::DocumentStoreError::InvalidArgument) for page 0
    /// or an empty page size.
    pub async fn get_page<D: Document>(
        &self,
        filter: Expr,
        sort: SortSpec,
        params: PaginationParams,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<Page<D>> {
        let window = params.window()?;
        let count = self
            .count::<D>(filter.clone(), partition_key)
            .await?;
        let items = self
            .get_sorted_paginated_by(filter, sort, window, partition_key)
            .await?;

        Ok(params.page(items, count))
    }
}
