//! Partition-aware data access over document databases.
//!
//! `docpart` resolves a document type plus an optional partition key to a physical collection
//! (`{partition}-{base}`) and exposes typed CRUD, query, aggregation, pagination and index
//! helpers on top of any [`StoreBackend`](backend::StoreBackend).
//!
//! # Quick Start
//!
//! ```ignore
//! use docpart::{prelude::*, memory::InMemoryStore};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Document)]
//! #[document(collection = "shipments", partition_key = "carrier")]
//! pub struct Shipment {
//!     #[serde(rename = "_id")]
//!     pub id: bson::Uuid,
//!     pub version: i32,
//!     pub carrier: String,
//!     pub weight: i64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let context = Context::new(InMemoryStore::builder().build().await?);
//!     let access = context.data_access();
//!
//!     let mut shipment = Shipment {
//!         id: bson::Uuid::from_bytes([0; 16]),
//!         version: 1,
//!         carrier: "acme".into(),
//!         weight: 12,
//!     };
//!
//!     // Stored in "acme-shipments"; the id is generated on insert.
//!     access.add_one(&mut shipment).await?;
//!
//!     let heavy = access
//!         .find::<Shipment>(
//!             Query::builder().filter(Filter::gt("weight", 10)).build(),
//!             Some("acme"),
//!         )
//!         .await?;
//!
//!     println!("{heavy:?}");
//!
//!     context.shutdown().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - in-process store for tests and local development
//! - [`mongodb`] - MongoDB through the official driver (requires the `mongodb` feature)

#[allow(unused_extern_crates)]
extern crate self as docpart;

pub mod prelude;

pub use docpart_core::{
    access, aggregate, backend, context, document, error, index, page, query, registry, update,
};
pub use docpart_macros::Document;

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend.
pub mod memory {
    pub use docpart_memory::{InMemoryStore, InMemoryStoreBuilder, MemorySession, MemoryStoreError};
}

/// MongoDB storage backend.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docpart_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
