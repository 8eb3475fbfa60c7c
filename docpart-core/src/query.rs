//! Serializable query descriptors.
//!
//! Filters, sorts and projections are plain data handed to a [`StoreBackend`](crate::backend::StoreBackend),
//! which translates them into its native form (a MongoDB filter document, an in-memory
//! predicate, ...). Field names may be dotted paths addressing nested values (`"address.city"`).
//!
//! ```ignore
//! use docpart::query::{Filter, Query, SortSpec};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("status", "open").and(Filter::gte("total", 100)))
//!     .sort(SortSpec::new().desc("total").asc("_id"))
//!     .offset(20)
//!     .limit(10)
//!     .build();
//! ```

use bson::Bson;

use crate::{document::ID_FIELD, error::DocumentStoreError};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest value first.
    Asc,
    /// Largest value first.
    Desc,
}

impl SortDirection {
    /// Maps an `ascending` toggle to a direction.
    pub fn from_ascending(ascending: bool) -> Self {
        if ascending { SortDirection::Asc } else { SortDirection::Desc }
    }
}

/// A single sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// An ordered, multi-field sort specification. Earlier keys take precedence.
///
/// Ties left after the last key are returned in the store's natural order; append a unique
/// field (such as `_id`) when a stable order matters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortSpec {
    keys: Vec<Sort>,
}

impl SortSpec {
    /// Creates an empty sort specification.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a single-field specification from an `ascending` toggle.
    pub fn by(field: impl Into<String>, ascending: bool) -> Self {
        Self::new().then(field, SortDirection::from_ascending(ascending))
    }

    /// Appends a sort key.
    pub fn then(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.keys.push(Sort { field: field.into(), direction });
        self
    }

    /// Appends an ascending sort key.
    pub fn asc(self, field: impl Into<String>) -> Self {
        self.then(field, SortDirection::Asc)
    }

    /// Appends a descending sort key.
    pub fn desc(self, field: impl Into<String>) -> Self {
        self.then(field, SortDirection::Desc)
    }

    /// Returns the sort keys in precedence order.
    pub fn keys(&self) -> &[Sort] {
        &self.keys
    }

    /// Returns `true` if no sort key is set.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Selects which fields of a matching document are returned.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Return only these fields (and the primary key).
    Include(Vec<String>),
    /// Return everything except these fields.
    Exclude(Vec<String>),
}

impl Projection {
    /// Creates an inclusion projection.
    pub fn include<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Projection::Include(fields.into_iter().map(Into::into).collect())
    }

    /// Creates an exclusion projection.
    pub fn exclude<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Projection::Exclude(fields.into_iter().map(Into::into).collect())
    }

    /// Returns the projected field names.
    pub fn fields(&self) -> &[String] {
        match self {
            Projection::Include(fields) | Projection::Exclude(fields) => fields,
        }
    }
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    /// Equal to.
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// String contains the substring, or array contains the element.
    Contains,
    /// Negation of [`FieldOp::Contains`].
    NotContains,
    /// String starts with value.
    StartsWith,
    /// String ends with value.
    EndsWith,
    /// Field value is one of the values (or an array field shares one of them).
    AnyOf,
    /// Negation of [`FieldOp::AnyOf`].
    NoneOf,
}

/// A filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// All sub-expressions must match. An empty list matches every document.
    And(Vec<Expr>),
    /// At least one sub-expression must match.
    Or(Vec<Expr>),
    /// Inverts the sub-expression.
    Not(Box<Expr>),
    /// Field presence check.
    Exists(String, bool),
    /// Field comparison.
    Field {
        /// The (possibly dotted) field path.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The operand.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Negates this expression.
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Returns `true` if this expression matches every document.
    pub fn is_match_all(&self) -> bool {
        matches!(self, Expr::And(list) if list.is_empty())
    }
}

/// Constructors for filter expressions.
///
/// ```ignore
/// let expr = Filter::eq("name", "Alice").and(Filter::gt("age", 18));
/// ```
pub struct Filter;

impl Filter {
    /// Matches every document.
    pub fn all() -> Expr {
        Expr::And(Vec::new())
    }

    /// Matches the document with the given primary key.
    pub fn id(id: impl Into<Bson>) -> Expr {
        Self::eq(ID_FIELD, id)
    }

    /// Matches documents whose primary key is one of `ids`.
    pub fn ids<I, V>(ids: I) -> Expr
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        Self::any_of(ID_FIELD, Bson::Array(ids.into_iter().map(Into::into).collect()))
    }

    /// `field == value`
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    /// `field != value`
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    /// `field > value`
    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    /// `field >= value`
    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    /// `field < value`
    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    /// `field <= value`
    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    /// String field starts with `value`.
    pub fn starts_with(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::StartsWith, value.into())
    }

    /// String field ends with `value`.
    pub fn ends_with(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::EndsWith, value.into())
    }

    /// String field contains `value`, or array field contains the element `value`.
    pub fn contains(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Contains, value.into())
    }

    /// Negation of [`Filter::contains`].
    pub fn not_contains(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::NotContains, value.into())
    }

    /// Field is present.
    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    /// Field is absent.
    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    /// All expressions match.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    /// Any expression matches.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }

    /// Field value is one of the values in the `value` array.
    pub fn any_of(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::AnyOf, value.into())
    }

    /// Field value is none of the values in the `value` array.
    pub fn none_of(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::NoneOf, value.into())
    }
}

/// A find request: filter, then sort, then skip `offset`, then take `limit`, then project.
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Filter expression; `None` matches every document.
    pub filter: Option<Expr>,
    /// Sort keys applied before pagination.
    pub sort: SortSpec,
    /// Number of documents to skip.
    pub offset: Option<u64>,
    /// Maximum number of documents to return.
    pub limit: Option<u64>,
    /// Fields to return.
    pub projection: Option<Projection>,
}

impl Query {
    /// Creates an empty query matching every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query builder.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

/// Fluent builder for [`Query`].
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Sets the filter expression.
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: u64) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Sets the number of documents to skip.
    pub fn offset(mut self, offset: u64) -> Self {
        self.query.offset = Some(offset);
        self
    }

    /// Replaces the sort specification.
    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.query.sort = sort;
        self
    }

    /// Appends a single sort key.
    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort = self.query.sort.then(field, direction);
        self
    }

    /// Sets the projection.
    pub fn projection(mut self, projection: Projection) -> Self {
        self.query.projection = Some(projection);
        self
    }

    /// Builds the query.
    pub fn build(self) -> Query {
        self.query
    }
}

/// Walks a filter expression, producing a backend-specific representation.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_flattens_into_existing_list() {
        let expr = Filter::eq("a", 1)
            .and(Filter::eq("b", 2))
            .and(Filter::eq("c", 3));

        match expr {
            Expr::And(list) => assert_eq!(list.len(), 3),
            other => panic!("unexpected expression: {other:?}"),
        }
    }

    #[test]
    fn match_all_is_empty_conjunction() {
        assert!(Filter::all().is_match_all());
        assert!(!Filter::eq("a", 1).is_match_all());
    }

    #[test]
    fn sort_spec_preserves_key_order() {
        let spec = SortSpec::new().desc("total").asc(ID_FIELD);

        assert_eq!(spec.keys()[0].field, "total");
        assert_eq!(spec.keys()[0].direction, SortDirection::Desc);
        assert_eq!(spec.keys()[1].field, "_id");
        assert_eq!(SortSpec::by("n", false).keys()[0].direction, SortDirection::Desc);
    }

    #[test]
    fn builder_sets_window() {
        let query = Query::builder()
            .filter(Filter::id(5))
            .sort_by("n", SortDirection::Asc)
            .offset(2)
            .limit(2)
            .projection(Projection::include(["n"]))
            .build();

        assert_eq!(query.offset, Some(2));
        assert_eq!(query.limit, Some(2));
        assert_eq!(query.sort.keys().len(), 1);
        assert_eq!(query.projection.unwrap().fields(), ["n".to_string()]);
    }
}
