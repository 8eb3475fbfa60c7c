//! Core traits for document representation and serialization.
//!
//! A type becomes storable by implementing [`Document`], usually through
//! `#[derive(Document)]` from the facade crate. The trait carries the identifier, the schema
//! version, the optional declared collection name and the optional partition key capability.

use bson::{
    Bson, Document as BsonDocument, Uuid,
    de::{deserialize_from_bson, deserialize_from_document},
    oid::ObjectId,
    ser::serialize_to_document,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, from_value, to_value};
use std::fmt::Debug;

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Name of the primary key field in stored documents.
///
/// Document types should serialize their identifier under this name
/// (`#[serde(rename = "_id")]`).
pub const ID_FIELD: &str = "_id";

/// An identifier type usable as a document primary key.
///
/// `generate` provides the strategy used when a document is inserted without an id.
/// Types without a strategy keep the default implementation, which fails with
/// [`DocumentStoreError::UnsupportedIdentifierType`].
pub trait DocumentId: Clone + Debug + Into<Bson> + Send + Sync + 'static {
    /// Returns `true` when the identifier holds its "not yet assigned" value.
    fn is_unset(&self) -> bool;

    /// Generates a fresh, globally unique identifier.
    fn generate() -> DocumentStoreResult<Self> {
        Err(DocumentStoreError::UnsupportedIdentifierType(
            std::any::type_name::<Self>().to_string(),
        ))
    }
}

impl DocumentId for Uuid {
    fn is_unset(&self) -> bool {
        self.bytes() == [0u8; 16]
    }

    fn generate() -> DocumentStoreResult<Self> {
        Ok(Uuid::new())
    }
}

impl DocumentId for String {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }

    fn generate() -> DocumentStoreResult<Self> {
        Ok(uuid::Uuid::new_v4().to_string())
    }
}

impl DocumentId for ObjectId {
    fn is_unset(&self) -> bool {
        self.bytes() == [0u8; 12]
    }

    fn generate() -> DocumentStoreResult<Self> {
        Ok(ObjectId::new())
    }
}

// Integer keys are caller-assigned.
impl DocumentId for i32 {
    fn is_unset(&self) -> bool {
        *self == 0
    }
}

impl DocumentId for i64 {
    fn is_unset(&self) -> bool {
        *self == 0
    }
}

/// Core trait that all documents handled by the data access layer must implement.
///
/// # Example
///
/// ```ignore
/// use docpart::prelude::*;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize, Document)]
/// #[document(collection = "orders", partition_key = "tenant")]
/// pub struct Order {
///     #[serde(rename = "_id")]
///     pub id: bson::Uuid,
///     pub version: i32,
///     pub tenant: String,
///     pub number: i64,
/// }
/// ```
pub trait Document: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// The identifier type of this document.
    type Id: DocumentId;

    /// Whether instances of this type carry a partition key.
    const PARTITIONED: bool = false;

    /// Returns a reference to this document's unique identifier.
    fn id(&self) -> &Self::Id;

    /// Replaces this document's identifier.
    fn set_id(&mut self, id: Self::Id);

    /// Returns the schema version of this document. Never modified by the data access layer.
    fn version(&self) -> i32;

    /// The unqualified name of the type, used as the default collection name.
    fn type_name() -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// A statically declared collection name overriding the type name.
    fn declared_collection() -> Option<&'static str> {
        None
    }

    /// The partition key of this instance, for partitioned document types.
    fn partition_key(&self) -> Option<&str> {
        None
    }
}

/// Strips the module path and generic arguments from a fully qualified type name.
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let base = full
        .split('<')
        .next()
        .unwrap_or(full);

    base.rsplit("::")
        .next()
        .unwrap_or(base)
}

/// Extension trait providing serialization utilities for documents.
///
/// This trait is automatically implemented for all types that implement [`Document`].
pub trait DocumentExt: Document {
    /// Converts this document to a BSON document for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the type does not serialize to a map.
    fn to_document(&self) -> DocumentStoreResult<BsonDocument>;

    /// Creates a document from a stored BSON document.
    fn from_document(document: BsonDocument) -> DocumentStoreResult<Self>;

    /// Converts this document to a JSON value.
    fn to_json(&self) -> DocumentStoreResult<Value>;

    /// Creates a document from a JSON value.
    fn from_json(value: Value) -> DocumentStoreResult<Self>;

    /// Assigns a freshly generated identifier if none is set yet.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnsupportedIdentifierType`] when the id is unset and
    /// its type has no generation strategy.
    fn prepare_insert(&mut self) -> DocumentStoreResult<()>;
}

impl<D: Document> DocumentExt for D {
    fn to_document(&self) -> DocumentStoreResult<BsonDocument> {
        Ok(serialize_to_document(self)?)
    }

    fn from_document(document: BsonDocument) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_document(document)?)
    }

    fn to_json(&self) -> DocumentStoreResult<Value> {
        Ok(to_value(self)?)
    }

    fn from_json(value: Value) -> DocumentStoreResult<Self> {
        Ok(from_value(value)?)
    }

    fn prepare_insert(&mut self) -> DocumentStoreResult<()> {
        if self.id().is_unset() {
            self.set_id(D::Id::generate()?);
        }

        Ok(())
    }
}

/// Deserializes a single BSON value into `T`.
pub fn value_from_bson<T>(value: Bson) -> DocumentStoreResult<T>
where
    T: for<'de> Deserialize<'de>,
{
    Ok(deserialize_from_bson(value)?)
}

/// Looks up a dotted field path (`"address.city"`) in a stored document.
pub fn get_path<'d>(document: &'d BsonDocument, path: &str) -> Option<&'d Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn dotted_paths_reach_nested_values() {
        let document = doc! { "a": { "b": [10, { "c": "x" }] } };

        assert_eq!(get_path(&document, "a.b.0"), Some(&Bson::Int32(10)));
        assert_eq!(get_path(&document, "a.b.1.c"), Some(&Bson::String("x".into())));
        assert_eq!(get_path(&document, "a.z"), None);
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Counter {
        #[serde(rename = "_id")]
        id: i64,
        version: i32,
    }

    impl Document for Counter {
        type Id = i64;

        fn id(&self) -> &i64 {
            &self.id
        }

        fn set_id(&mut self, id: i64) {
            self.id = id;
        }

        fn version(&self) -> i32 {
            self.version
        }
    }

    #[test]
    fn short_type_name_strips_path_and_generics() {
        assert_eq!(short_type_name("app::models::Order"), "Order");
        assert_eq!(short_type_name("app::Wrapper<app::Inner>"), "Wrapper");
        assert_eq!(short_type_name("Plain"), "Plain");
        assert_eq!(Counter::type_name(), "Counter");
    }

    #[test]
    fn generated_ids_are_set() {
        assert!(!Uuid::generate().unwrap().is_unset());
        assert!(!String::generate().unwrap().is_unset());
        assert!(!ObjectId::generate().unwrap().is_unset());
        assert!(Uuid::from_bytes([0u8; 16]).is_unset());
    }

    #[test]
    fn integer_ids_cannot_be_generated() {
        let mut counter = Counter { id: 0, version: 1 };

        match counter.prepare_insert() {
            Err(DocumentStoreError::UnsupportedIdentifierType(name)) => assert_eq!(name, "i64"),
            other => panic!("unexpected result: {other:?}"),
        }

        let mut counter = Counter { id: 7, version: 1 };
        counter.prepare_insert().unwrap();
        assert_eq!(counter.id, 7);
    }

    #[test]
    fn documents_serialize_with_primary_key() {
        let document = Counter { id: 3, version: 2 }
            .to_document()
            .unwrap();

        assert_eq!(document.get_i64(ID_FIELD).unwrap(), 3);
        assert_eq!(document.get_i32("version").unwrap(), 2);
    }
}
