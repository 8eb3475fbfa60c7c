//! MongoDB backend for docpart.
//!
//! [`MongoDbStore`] implements `StoreBackend` on the official async driver. Filters, sorts,
//! projections, updates, pipelines and index specifications are translated into their
//! MongoDB documents; sessions and transactions map onto driver `ClientSession`s.
//!
//! Enable it through the facade crate's `mongodb` feature:
//!
//! ```toml
//! [dependencies]
//! docpart = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use docpart::{backend::StoreBackendBuilder, context::Context, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder("mongodb://localhost:27017", "shipping")
//!         .build()
//!         .await?;
//!     let context = Context::new(store);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docpart_mongodb;

pub mod query;
pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
