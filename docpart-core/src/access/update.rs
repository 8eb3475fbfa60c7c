use bson::ser::serialize_to_bson;
use serde::Serialize;
use tracing::debug;

use super::{DataAccess, require_field};
use crate::{
    backend::StoreBackend,
    document::{Document, DocumentExt},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Filter},
    update::{Update, UpdateOutcome},
};

fn field_update<V: Serialize>(field: &str, value: &V) -> DocumentStoreResult<Update> {
    require_field(field)?;

    Ok(Update::field(field, serialize_to_bson(value)?))
}

fn require_changes(update: &Update) -> DocumentStoreResult<()> {
    if update.is_empty() {
        return Err(DocumentStoreError::InvalidArgument(
            "an update needs at least one operation".into(),
        ));
    }

    Ok(())
}

impl<B: StoreBackend> DataAccess<'_, B> {
    async fn replace_by_id<D: Document>(
        &self,
        document: &D,
        session: Option<&mut B::Session>,
    ) -> DocumentStoreResult<bool> {
        let collection = self.collection_for(document);
        debug!("replace one in '{}'", collection);

        let outcome = self
            .backend()
            .replace_one(
                &collection,
                Filter::id(document.id().clone()),
                document.to_document()?,
                session,
            )
            .await?;

        Ok(outcome.modified == 1)
    }

    async fn apply_one(
        &self,
        collection: String,
        filter: Expr,
        update: Update,
        session: Option<&mut B::Session>,
    ) -> DocumentStoreResult<bool> {
        require_changes(&update)?;
        debug!("update one in '{}'", collection);

        let outcome = self
            .backend()
            .update_one(&collection, filter, update, session)
            .await?;

        Ok(outcome.modified == 1)
    }

    async fn apply_many(
        &self,
        collection: String,
        filter: Expr,
        update: Update,
        session: Option<&mut B::Session>,
    ) -> DocumentStoreResult<u64> {
        require_changes(&update)?;
        debug!("update many in '{}'", collection);

        let UpdateOutcome { modified, .. } = self
            .backend()
            .update_many(&collection, filter, update, session)
            .await?;

        Ok(modified)
    }

    /// Replaces the stored copy of `document` (matched by id) with the given value.
    ///
    /// Returns `true` if exactly one document was modified. Replacing a document with an
    /// identical copy modifies nothing.
    pub async fn update_one<D: Document>(&self, document: &D) -> DocumentStoreResult<bool> {
        self.replace_by_id(document, None)
            .await
    }

    /// Applies `update` to the stored copy of `document`.
    pub async fn update_one_with<D: Document>(
        &self,
        document: &D,
        update: Update,
    ) -> DocumentStoreResult<bool> {
        self.apply_one(
            self.collection_for(document),
            Filter::id(document.id().clone()),
            update,
            None,
        )
        .await
    }

    /// Sets a single field on the stored copy of `document`. Other fields are left untouched.
    pub async fn update_field<D: Document, V: Serialize>(
        &self,
        document: &D,
        field: &str,
        value: V,
    ) -> DocumentStoreResult<bool> {
        self.update_one_with(document, field_update(field, &value)?)
            .await
    }

    /// Applies `update` to the first document matching `filter`.
    pub async fn update_one_where<D: Document>(
        &self,
        filter: Expr,
        update: Update,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<bool> {
        self.apply_one(self.collection::<D>(partition_key), filter, update, None)
            .await
    }

    /// Sets a single field on the first document matching `filter`.
    pub async fn update_field_where<D: Document, V: Serialize>(
        &self,
        filter: Expr,
        field: &str,
        value: V,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<bool> {
        self.update_one_where::<D>(filter, field_update(field, &value)?, partition_key)
            .await
    }

    /// Applies `update` to every document matching `filter`, returning the modified count.
    pub async fn update_many<D: Document>(
        &self,
        filter: Expr,
        update: Update,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<u64> {
        self.apply_many(self.collection::<D>(partition_key), filter, update, None)
            .await
    }

    /// Sets a single field on every document matching `filter`, returning the modified count.
    pub async fn update_many_field<D: Document, V: Serialize>(
        &self,
        filter: Expr,
        field: &str,
        value: V,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<u64> {
        self.update_many::<D>(filter, field_update(field, &value)?, partition_key)
            .await
    }

    /// [`update_one`](Self::update_one) inside `session`.
    pub async fn update_one_in_session<D: Document>(
        &self,
        session: &mut B::Session,
        document: &D,
    ) -> DocumentStoreResult<bool> {
        self.replace_by_id(document, Some(session))
            .await
    }

    /// [`update_one_with`](Self::update_one_with) inside `session`.
    pub async fn update_one_with_in_session<D: Document>(
        &self,
        session: &mut B::Session,
        document: &D,
        update: Update,
    ) -> DocumentStoreResult<bool> {
        self.apply_one(
            self.collection_for(document),
            Filter::id(document.id().clone()),
            update,
            Some(session),
        )
        .await
    }

    /// [`update_field`](Self::update_field) inside `session`.
    pub async fn update_field_in_session<D: Document, V: Serialize>(
        &self,
        session: &mut B::Session,
        document: &D,
        field: &str,
        value: V,
    ) -> DocumentStoreResult<bool> {
        let update = field_update(field, &value)?;

        self.update_one_with_in_session(session, document, update)
            .await
    }

    /// [`update_one_where`](Self::update_one_where) inside `session`.
    pub async fn update_one_where_in_session<D: Document>(
        &self,
        session: &mut B::Session,
        filter: Expr,
        update: Update,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<bool> {
        self.apply_one(self.collection::<D>(partition_key), filter, update, Some(session))
            .await
    }

    /// [`update_field_where`](Self::update_field_where) inside `session`.
    pub async fn update_field_where_in_session<D: Document, V: Serialize>(
        &self,
        session: &mut B::Session,
        filter: Expr,
        field: &str,
        value: V,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<bool> {
        let update = field_update(field, &value)?;

        self.update_one_where_in_session::<D>(session, filter, update, partition_key)
            .await
    }

    /// [`update_many`](Self::update_many) inside `session`.
    pub async fn update_many_in_session<D: Document>(
        &self,
        session: &mut B::Session,
        filter: Expr,
        update: Update,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<u64> {
        self.apply_many(self.collection::<D>(partition_key), filter, update, Some(session))
            .await
    }

    /// [`update_many_field`](Self::update_many_field) inside `session`.
    pub async fn update_many_field_in_session<D: Document, V: Serialize>(
        &self,
        session: &mut B::Session,
        filter: Expr,
        field: &str,
        value: V,
        partition_key: Option<&str>,
    ) -> DocumentStoreResult<u64> {
        let update = field_update(field, &value)?;

        self.update_many_in_session::<D>(session, filter, update, partition_key)
            .await
    }
}
