//! Filter evaluation and value ordering for in-memory documents.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, Document as BsonDocument, datetime::DateTime, oid::ObjectId};

use docpart_core::{
    document::get_path,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor, SortDirection, SortSpec},
};

/// Comparable view of a BSON value. Integers stay exact; they widen to `f64` only when
/// compared with a double.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Bytes(&'a [u8]),
    ObjectId(ObjectId),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Int(i64::from(*value)),
            Bson::Int64(value) => Comparable::Int(*value),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Binary(binary) => Comparable::Bytes(&binary.bytes),
            Bson::ObjectId(oid) => Comparable::ObjectId(*oid),
            Bson::Array(items) => Comparable::Array(
                items
                    .iter()
                    .map(Comparable::from)
                    .collect(),
            ),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            _ => Comparable::Null,
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Int(a), Comparable::Int(b)) => a == b,
            (Comparable::Int(a), Comparable::Number(b)) => (*a as f64) == *b,
            (Comparable::Number(a), Comparable::Int(b)) => *a == (*b as f64),
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Bytes(a), Comparable::Bytes(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Int(a), Comparable::Int(b)) => a.partial_cmp(b),
            (Comparable::Int(a), Comparable::Number(b)) => (*a as f64).partial_cmp(b),
            (Comparable::Number(a), Comparable::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::Bytes(a), Comparable::Bytes(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.bytes().partial_cmp(&b.bytes()),
            _ => None,
        }
    }
}

// Cross-type ordering: missing/null < numbers < strings < documents < arrays < binary
// < object ids < booleans < dates < everything else.
fn type_rank(value: Option<&Bson>) -> u8 {
    match value {
        None | Some(Bson::Null) | Some(Bson::Undefined) => 1,
        Some(Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_)) => 2,
        Some(Bson::String(_) | Bson::Symbol(_)) => 3,
        Some(Bson::Document(_)) => 4,
        Some(Bson::Array(_)) => 5,
        Some(Bson::Binary(_)) => 6,
        Some(Bson::ObjectId(_)) => 7,
        Some(Bson::Boolean(_)) => 8,
        Some(Bson::DateTime(_)) => 9,
        Some(_) => 10,
    }
}

/// Total order over optional BSON values, used for sorting, min/max and key comparison.
pub(crate) fn compare_values(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    let rank = type_rank(left).cmp(&type_rank(right));
    if rank != Ordering::Equal {
        return rank;
    }

    match (left, right) {
        (Some(Bson::Array(a)), Some(Bson::Array(b))) => a
            .iter()
            .zip(b)
            .map(|(x, y)| compare_values(Some(x), Some(y)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        (Some(Bson::Document(a)), Some(Bson::Document(b))) => a
            .iter()
            .zip(b)
            .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| compare_values(Some(va), Some(vb))))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        (Some(a), Some(b)) => Comparable::from(a)
            .partial_cmp(&Comparable::from(b))
            .unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

/// Stable sort by every key of `sort`, in precedence order.
pub(crate) fn sort_documents(documents: &mut [BsonDocument], sort: &SortSpec) {
    if sort.is_empty() {
        return;
    }

    documents.sort_by(|a, b| {
        sort.keys()
            .iter()
            .map(|key| {
                let ordering = compare_values(get_path(a, &key.field), get_path(b, &key.field));

                match key.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a BsonDocument,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a BsonDocument) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    /// Returns `true` when `document` matches `filter`; a missing filter matches everything.
    pub fn matches(document: &BsonDocument, filter: Option<&Expr>) -> DocumentStoreResult<bool> {
        match filter {
            Some(expr) => DocumentEvaluator::new(document).evaluate(expr),
            None => Ok(true),
        }
    }
}

fn equals(field_value: &Bson, value: &Bson) -> bool {
    let left = Comparable::from(field_value);
    let right = Comparable::from(value);

    if left == right {
        return true;
    }

    // A scalar operand matches any element of an array field.
    match (&left, &right) {
        (Comparable::Array(items), scalar) if !matches!(scalar, Comparable::Array(_)) => {
            items.iter().any(|item| item == scalar)
        }
        _ => false,
    }
}

// Strings match as substrings (of the value or of any array element), arrays require every
// listed element to be present, anything else falls back to equality.
fn contains(field_value: &Bson, value: &Bson) -> bool {
    match value {
        Bson::String(needle) => match field_value {
            Bson::String(haystack) => haystack.contains(needle.as_str()),
            Bson::Array(items) => items
                .iter()
                .any(|item| matches!(item, Bson::String(haystack) if haystack.contains(needle.as_str()))),
            _ => false,
        },
        Bson::Array(needles) => match field_value {
            Bson::Array(_) => needles.iter().all(|needle| equals(field_value, needle)),
            _ => false,
        },
        other => equals(field_value, other),
    }
}

fn any_of(field_value: &Bson, values: &Bson) -> bool {
    match values {
        Bson::Array(candidates) => candidates
            .iter()
            .any(|candidate| equals(field_value, candidate)),
        single => equals(field_value, single),
    }
}

impl QueryVisitor for DocumentEvaluator<'_> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(get_path(self.document, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        if let (FieldOp::StartsWith | FieldOp::EndsWith, false) = (op, matches!(value, Bson::String(_))) {
            let operator = match op {
                FieldOp::StartsWith => "starts_with",
                _ => "ends_with",
            };

            return Err(DocumentStoreError::InvalidArgument(format!(
                "{operator} on '{field}' requires a string value"
            )));
        }

        let Some(field_value) = get_path(self.document, field) else {
            // Missing fields compare like null.
            return Ok(match op {
                FieldOp::Eq => matches!(value, Bson::Null),
                FieldOp::Ne => !matches!(value, Bson::Null),
                FieldOp::NotContains | FieldOp::NoneOf => true,
                _ => false,
            });
        };

        Ok(match op {
            FieldOp::Eq => equals(field_value, value),
            FieldOp::Ne => !equals(field_value, value),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                match Comparable::from(field_value).partial_cmp(&Comparable::from(value)) {
                    Some(ordering) => match op {
                        FieldOp::Gt => ordering.is_gt(),
                        FieldOp::Gte => ordering.is_ge(),
                        FieldOp::Lt => ordering.is_lt(),
                        _ => ordering.is_le(),
                    },
                    None => false,
                }
            }
            FieldOp::Contains => contains(field_value, value),
            FieldOp::NotContains => !contains(field_value, value),
            FieldOp::StartsWith => match (field_value, value) {
                (Bson::String(left), Bson::String(right)) => left.starts_with(right.as_str()),
                _ => false,
            },
            FieldOp::EndsWith => match (field_value, value) {
                (Bson::String(left), Bson::String(right)) => left.ends_with(right.as_str()),
                _ => false,
            },
            FieldOp::AnyOf => any_of(field_value, value),
            FieldOp::NoneOf => !any_of(field_value, value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docpart_core::query::Filter;

    fn eval(document: &BsonDocument, expr: Expr) -> bool {
        DocumentEvaluator::new(document)
            .evaluate(&expr)
            .unwrap()
    }

    #[test]
    fn numbers_compare_across_widths() {
        let document = doc! { "n": 5_i64, "x": 2.5 };

        assert!(eval(&document, Filter::eq("n", 5)));
        assert!(eval(&document, Filter::gt("x", 2)));
        assert!(!eval(&document, Filter::lt("n", 5)));
    }

    #[test]
    fn large_integers_compare_exactly() {
        let base = 1_i64 << 53;
        let document = doc! { "n": base + 1 };

        assert!(eval(&document, Filter::eq("n", base + 1)));
        assert!(!eval(&document, Filter::eq("n", base)));
        assert!(eval(&document, Filter::gt("n", base)));
        assert_eq!(
            compare_values(Some(&Bson::Int64(base)), Some(&Bson::Int64(base + 1))),
            Ordering::Less
        );
        assert_eq!(
            compare_values(Some(&Bson::Int32(2)), Some(&Bson::Double(2.0))),
            Ordering::Equal
        );
    }

    #[test]
    fn nested_paths_and_arrays() {
        let document = doc! { "address": { "city": "Oslo" }, "tags": ["a", "b"] };

        assert!(eval(&document, Filter::eq("address.city", "Oslo")));
        assert!(eval(&document, Filter::eq("tags", "b")));
        assert!(eval(&document, Filter::contains("tags", "a")));
        assert!(eval(&document, Filter::any_of("tags", vec!["z", "a"])));
        assert!(eval(&document, Filter::none_of("tags", vec!["z"])));
    }

    #[test]
    fn contains_matches_substrings_and_element_sets() {
        let document = doc! { "title": "Rust in Action", "tags": ["rust", "systems"], "n": 3 };

        assert!(eval(&document, Filter::contains("title", "in A")));
        assert!(eval(&document, Filter::contains("tags", "sys")));
        assert!(eval(&document, Filter::contains("tags", vec!["systems", "rust"])));
        assert!(!eval(&document, Filter::contains("tags", vec!["rust", "web"])));
        assert!(eval(&document, Filter::contains("n", 3)));
        assert!(eval(&document, Filter::not_contains("title", "Go")));
    }

    #[test]
    fn prefix_operators_require_string_operands() {
        let document = doc! { "code": "AB-12" };

        assert!(eval(&document, Filter::starts_with("code", "AB")));
        assert!(eval(&document, Filter::ends_with("code", "12")));

        for expr in [Filter::starts_with("code", 1), Filter::ends_with("missing", 12)] {
            assert!(matches!(
                DocumentEvaluator::matches(&document, Some(&expr)),
                Err(DocumentStoreError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn missing_fields_behave_like_null() {
        let document = doc! { "a": 1 };

        assert!(eval(&document, Filter::eq("b", Bson::Null)));
        assert!(eval(&document, Filter::ne("b", 1)));
        assert!(!eval(&document, Filter::gt("b", 0)));
        assert!(eval(&document, Filter::not_exists("b")));
    }

    #[test]
    fn empty_conjunction_matches() {
        assert!(eval(&doc! {}, Filter::all()));
        assert!(!eval(&doc! { "a": 1 }, Filter::eq("a", 1).not()));
    }

    #[test]
    fn sort_orders_by_type_then_value() {
        let mut documents = vec![
            doc! { "k": "b" },
            doc! { "k": 2 },
            doc! {},
            doc! { "k": 1.5 },
            doc! { "k": "a" },
        ];

        sort_documents(&mut documents, &SortSpec::new().asc("k"));

        let keys: Vec<Option<&Bson>> = documents
            .iter()
            .map(|document| document.get("k"))
            .collect();
        assert_eq!(
            keys,
            [
                None,
                Some(&Bson::Double(1.5)),
                Some(&Bson::Int32(2)),
                Some(&Bson::String("a".into())),
                Some(&Bson::String("b".into())),
            ]
        );
    }
}
