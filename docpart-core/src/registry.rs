//! Collection name registration and resolution.
//!
//! The physical collection of a document type is derived from a base name and an optional
//! partition key:
//!
//! 1. the name registered for the type in a [`CollectionRegistry`], if any;
//! 2. otherwise the type's declared collection ([`Document::declared_collection`]);
//! 3. otherwise the type's own name ([`Document::type_name`]).
//!
//! A non-empty partition key is prepended with a `-` delimiter. The key is not escaped, so a
//! key containing `-` can produce the same name as a different (base, key) pair.

use std::{
    any::TypeId,
    collections::HashMap,
};

use crate::document::Document;

/// Delimiter placed between a partition key and the base collection name.
pub const PARTITION_DELIMITER: char = '-';

/// Computes the physical collection name for a base name and an optional partition key.
///
/// # Example
///
/// ```ignore
/// assert_eq!(resolve_collection_name("orders", None), "orders");
/// assert_eq!(resolve_collection_name("orders", Some("")), "orders");
/// assert_eq!(resolve_collection_name("orders", Some("acme")), "acme-orders");
/// ```
pub fn resolve_collection_name(base: &str, partition_key: Option<&str>) -> String {
    match partition_key {
        Some(key) if !key.is_empty() => format!("{key}{PARTITION_DELIMITER}{base}"),
        _ => base.to_string(),
    }
}

/// An immutable table associating document types with collection names.
///
/// Built once at startup with [`CollectionRegistry::builder`]; unregistered types fall back to
/// their declared collection or type name.
#[derive(Debug, Clone, Default)]
pub struct CollectionRegistry {
    names: HashMap<TypeId, String>,
}

impl CollectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for registering document types.
    pub fn builder() -> CollectionRegistryBuilder {
        CollectionRegistryBuilder::default()
    }

    /// Returns the name registered for `D`, if any.
    pub fn registered_name<D: Document>(&self) -> Option<&str> {
        self.names
            .get(&TypeId::of::<D>())
            .map(String::as_str)
    }

    /// Returns the unpartitioned collection name for `D`.
    pub fn base_name<D: Document>(&self) -> &str {
        self.registered_name::<D>()
            .or_else(|| D::declared_collection())
            .unwrap_or_else(|| D::type_name())
    }

    /// Resolves the physical collection name for `D` and an explicit partition key.
    pub fn resolve<D: Document>(&self, partition_key: Option<&str>) -> String {
        resolve_collection_name(self.base_name::<D>(), partition_key)
    }

    /// Resolves the physical collection name for a document instance, routing on its
    /// partition key when the type is partitioned.
    pub fn resolve_for<D: Document>(&self, document: &D) -> String {
        self.resolve::<D>(if D::PARTITIONED { document.partition_key() } else { None })
    }

    /// Returns the number of registered types.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if no type has been registered.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Builder for [`CollectionRegistry`].
#[derive(Debug, Default)]
pub struct CollectionRegistryBuilder {
    names: HashMap<TypeId, String>,
}

impl CollectionRegistryBuilder {
    /// Registers `D` under its declared collection name, or its type name.
    pub fn register<D: Document>(self) -> Self {
        let name = D::declared_collection().unwrap_or_else(D::type_name);

        self.register_as::<D>(name)
    }

    /// Registers `D` under an explicit collection name, replacing any earlier registration.
    pub fn register_as<D: Document>(mut self, name: impl Into<String>) -> Self {
        self.names.insert(TypeId::of::<D>(), name.into());
        self
    }

    /// Builds the registry.
    pub fn build(self) -> CollectionRegistry {
        CollectionRegistry { names: self.names }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::Uuid;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Customer {
        #[serde(rename = "_id")]
        id: Uuid,
        version: i32,
    }

    impl Document for Customer {
        type Id = Uuid;

        fn id(&self) -> &Uuid {
            &self.id
        }

        fn set_id(&mut self, id: Uuid) {
            self.id = id;
        }

        fn version(&self) -> i32 {
            self.version
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Invoice {
        #[serde(rename = "_id")]
        id: Uuid,
        version: i32,
        tenant: String,
    }

    impl Document for Invoice {
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

        fn declared_collection() -> Option<&'static str> {
            Some("invoices")
        }

        fn partition_key(&self) -> Option<&str> {
            Some(&self.tenant)
        }
    }

    #[test]
    fn unpartitioned_name_is_type_name() {
        let registry = CollectionRegistry::new();

        assert_eq!(registry.resolve::<Customer>(None), "Customer");
        assert_eq!(registry.resolve::<Customer>(Some("")), "Customer");
    }

    #[test]
    fn declared_name_overrides_type_name() {
        let registry = CollectionRegistry::new();

        assert_eq!(registry.resolve::<Invoice>(None), "invoices");
    }

    #[test]
    fn registered_name_overrides_declared_name() {
        let registry = CollectionRegistry::builder()
            .register::<Customer>()
            .register_as::<Invoice>("billing")
            .build();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.resolve::<Customer>(None), "Customer");
        assert_eq!(registry.resolve::<Invoice>(None), "billing");
    }

    #[test]
    fn partition_key_is_prefixed() {
        let registry = CollectionRegistry::new();

        assert_eq!(registry.resolve::<Customer>(Some("acme")), "acme-Customer");
        assert_eq!(registry.resolve::<Invoice>(Some("acme")), "acme-invoices");
    }

    #[test]
    fn delimiter_in_partition_key_is_not_escaped() {
        // "a-b" + "c" and "a" + "b-c" land in the same collection.
        assert_eq!(resolve_collection_name("c", Some("a-b")), "a-b-c");
        assert_eq!(resolve_collection_name("b-c", Some("a")), "a-b-c");
    }

    #[test]
    fn instances_route_on_their_partition_key() {
        let registry = CollectionRegistry::new();
        let invoice = Invoice { id: Uuid::new(), version: 1, tenant: "globex".into() };
        let customer = Customer { id: Uuid::new(), version: 1 };

        assert_eq!(registry.resolve_for(&invoice), "globex-invoices");
        assert_eq!(registry.resolve_for(&customer), "Customer");
    }
}
