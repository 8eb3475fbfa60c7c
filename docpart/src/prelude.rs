//! Commonly used types, traits and the `Document` derive.
//!
//! ```ignore
//! use docpart::prelude::*;
//! ```

pub use docpart_core::{
    access::DataAccess,
    aggregate::{Accumulator, Group, GroupKey, Pipeline, Stage},
    backend::{StoreBackend, StoreBackendBuilder},
    context::{Context, ContextBuilder},
    document::{Document, DocumentExt, DocumentId},
    error::{DocumentStoreError, DocumentStoreResult},
    index::{IndexKeys, IndexKind, IndexOptions},
    page::{Page, PaginationParams, Window},
    query::{Expr, FieldOp, Filter, Projection, Query, QueryBuilder, SortDirection, SortSpec},
    registry::{CollectionRegistry, resolve_collection_name},
    update::{Update, UpdateOp, UpdateOutcome},
};
pub use docpart_macros::Document;
