//! The data access facade.
//!
//! [`DataAccess`] exposes generic operations over any [`Document`] type. Each call resolves the
//! physical collection (from an explicit partition key, or from the document instance for
//! partitioned types), builds a descriptor and forwards it to the [`StoreBackend`] in a single
//! round trip. Results come back unmodified; store failures propagate unchanged.
//!
//! Operations are split by concern:
//!
//! - `create`: `add_one`, `add_many`
//! - `read`: lookups, counts, min/max, projections and sorted pagination
//! - `aggregate`: `sum_by`, `group_by`, raw pipelines
//! - `update`: replace and update by document or filter, optionally inside a session
//! - `delete`: delete by document or filter
//! - `index`: index creation, listing and removal
//!
//! Operations taking a document list (`add_many`, `delete_many`) split it by partition key and
//! issue one call per partition, sequentially, in first-appearance order. They are not atomic:
//! the first failing partition aborts the rest, and partitions already written stay written.

mod aggregate;
mod create;
mod delete;
mod index;
mod read;
mod update;

use serde::de::DeserializeOwned;

use crate::{
    backend::StoreBackend,
    context::Context,
    document::{Document, value_from_bson},
    error::{DocumentStoreError, DocumentStoreResult},
};

/// Generic data access operations bound to a [`Context`].
///
/// Cheap to create; obtain one with [`Context::data_access`].
#[derive(Debug)]
pub struct DataAccess<'a, B: StoreBackend> {
    context: &'a Context<B>,
}

impl<B: StoreBackend> Clone for DataAccess<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: StoreBackend> Copy for DataAccess<'_, B> {}

impl<'a, B: StoreBackend> DataAccess<'a, B> {
    pub fn new(context: &'a Context<B>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &'a Context<B> {
        self.context
    }

    fn backend(&self) -> &'a B {
        self.context.backend()
    }

    fn collection<D: Document>(&self, partition_key: Option<&str>) -> String {
        self.context.collection_name::<D>(partition_key)
    }

    fn collection_for<D: Document>(&self, document: &D) -> String {
        self.context.collection_name_for(document)
    }
}

/// The partition key a document routes on, normalized so that an empty key means none.
fn partition_of<D: Document>(document: &D) -> Option<&str> {
    if !D::PARTITIONED {
        return None;
    }

    document
        .partition_key()
        .filter(|key| !key.is_empty())
}

/// Splits documents by partition key, keeping groups in first-appearance order and documents in
/// input order within each group.
fn group_by_partition<'d, D: Document>(
    documents: impl IntoIterator<Item = &'d D>,
) -> Vec<(Option<&'d str>, Vec<&'d D>)> {
    let mut groups: Vec<(Option<&'d str>, Vec<&'d D>)> = Vec::new();

    for document in documents {
        let key = partition_of(document);

        match groups
            .iter_mut()
            .find(|(group_key, _)| *group_key == key)
        {
            Some((_, members)) => members.push(document),
            None => groups.push((key, vec![document])),
        }
    }

    groups
}

fn require_field(field: &str) -> DocumentStoreResult<()> {
    if field.trim().is_empty() {
        return Err(DocumentStoreError::InvalidArgument(
            "field name must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn decode_all<T: DeserializeOwned>(
    documents: Vec<bson::Document>,
) -> DocumentStoreResult<Vec<T>> {
    documents
        .into_iter()
        .map(|document| value_from_bson(bson::Bson::Document(document)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::Uuid;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Shipment {
        #[serde(rename = "_id")]
        id: Uuid,
        version: i32,
        region: String,
    }

    impl Document for Shipment {
        type Id = Uuid;

        const PARTITIONED: bool = true;

        fn id(&self) -> &Uuid {
            &self.id
        }

        fn set_id(&mut self, id: Uuid) {
            self.id = id;
        }

        fn version(&self) -> i32 {
            self.version
        }

        fn partition_key(&self) -> Option<&str> {
            Some(&self.region)
        }
    }

    fn shipment(region: &str) -> Shipment {
        Shipment { id: Uuid::new(), version: 1, region: region.to_string() }
    }

    #[test]
    fn groups_keep_first_appearance_order() {
        let documents = vec![shipment("eu"), shipment("us"), shipment("eu"), shipment("")];
        let groups = group_by_partition(&documents);

        let keys: Vec<Option<&str>> = groups
            .iter()
            .map(|(key, _)| *key)
            .collect();
        assert_eq!(keys, [Some("eu"), Some("us"), None]);
        assert_eq!(groups[0].1.len(), 2);
        assert!(std::ptr::eq(groups[0].1[1], &documents[2]));
    }

    #[test]
    fn empty_field_names_are_rejected() {
        assert!(require_field("total").is_ok());
        assert!(matches!(require_field(" "), Err(DocumentStoreError::InvalidArgument(_))));
    }
}
