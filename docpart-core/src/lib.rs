//! Partition-aware data access over document databases.
//!
//! This crate is the core of the docpart project and provides:
//!
//! - **Document contract** ([`document`]) - identifier, schema version, declared collection and
//!   partition key capability
//! - **Collection resolution** ([`registry`]) - type to collection name table and the
//!   `{partitionKey}-{baseName}` resolver
//! - **Descriptors** ([`query`], [`update`], [`aggregate`], [`index`]) - serializable filters,
//!   sorts, projections, updates, pipelines and index specifications
//! - **Store backend abstraction** ([`backend`]) - the driver surface backends implement
//! - **Context** ([`context`]) - owns the backend and the registry
//! - **Data access facade** ([`access`]) - generic CRUD, aggregation, pagination and index operations
//! - **Pagination** ([`page`]) and **errors** ([`error`])
//!
//! # Example
//!
//! ```ignore
//! use docpart::prelude::*;
//!
//! let context = Context::builder(InMemoryStore::new()).register::<Order>().build();
//! let access = context.data_access();
//!
//! let mut order = Order::new("acme", 42);
//! access.add_one(&mut order).await?;
//!
//! let stored: Option<Order> = access.get_by_id(order.id(), Some("acme")).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docpart_core;

pub mod access;
pub mod aggregate;
pub mod backend;
pub mod context;
pub mod document;
pub mod error;
pub mod index;
pub mod page;
pub mod query;
pub mod registry;
pub mod update;
