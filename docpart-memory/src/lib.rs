//! In-memory document storage backend for docpart.
//!
//! [`InMemoryStore`] implements the full `StoreBackend` surface (filters over dotted paths,
//! multi-field sorts, projections, update operators, aggregation pipelines, unique indexes
//! and journaled transactions) without an external database. It backs the test suite and
//! local development.
//!
//! # Quick Start
//!
//! ```ignore
//! use docpart::prelude::*;
//! use docpart_memory::InMemoryStore;
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let context = Context::new(InMemoryStore::builder().build().await?);
//!     let access = context.data_access();
//!
//!     let mut user = User { id: bson::Uuid::from_bytes([0; 16]), version: 1, name: "Alice".into() };
//!     access.add_one(&mut user).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docpart_memory;

pub mod error;
pub mod evaluator;
pub mod store;

mod mutate;
mod pipeline;

pub use error::MemoryStoreError;
pub use store::{InMemoryStore, InMemoryStoreBuilder, MemorySession};
