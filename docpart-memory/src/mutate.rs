//! Update and projection application on stored documents.

use bson::{Bson, Document as BsonDocument};

use docpart_core::{
    document::ID_FIELD,
    query::Projection,
    update::{Update, UpdateOp},
};

use crate::error::{MemoryResult, MemoryStoreError};

/// Adds two numeric values with integer widening: `i32 + i32` stays `i32` unless it
/// overflows, any `i64` widens to `i64`, any `f64` yields `f64`.
///
/// Returns `None` for non-numeric operands and for an `i64` result that overflows.
pub(crate) fn add_numbers(left: &Bson, right: &Bson) -> Option<Bson> {
    match (left, right) {
        (Bson::Int32(a), Bson::Int32(b)) => Some(
            a.checked_add(*b)
                .map(Bson::Int32)
                .unwrap_or(Bson::Int64(*a as i64 + *b as i64)),
        ),
        (Bson::Int32(a), Bson::Int64(b)) => (*a as i64).checked_add(*b).map(Bson::Int64),
        (Bson::Int64(a), Bson::Int32(b)) => a.checked_add(*b as i64).map(Bson::Int64),
        (Bson::Int64(a), Bson::Int64(b)) => a.checked_add(*b).map(Bson::Int64),
        (a, b) => Some(Bson::Double(as_f64(a)? + as_f64(b)?)),
    }
}

/// Like [`add_numbers`], but an `i64` overflow continues as a `Double` the way `$sum` does.
pub(crate) fn sum_numbers(left: &Bson, right: &Bson) -> Option<Bson> {
    add_numbers(left, right).or_else(|| Some(Bson::Double(as_f64(left)? + as_f64(right)?)))
}

pub(crate) fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

/// Walks to the parent document of `path`, creating intermediate documents when `create` is set.
fn parent_mut<'d>(
    document: &'d mut BsonDocument,
    path: &str,
    create: bool,
) -> MemoryResult<Option<(&'d mut BsonDocument, String)>> {
    let mut segments: Vec<&str> = path.split('.').collect();
    let leaf = segments
        .pop()
        .unwrap_or(path)
        .to_string();

    let mut current = document;
    for segment in segments {
        if create && !current.contains_key(segment) {
            current.insert(segment, BsonDocument::new());
        }

        current = match current.get_mut(segment) {
            Some(Bson::Document(inner)) => inner,
            Some(_) if create => return Err(MemoryStoreError::PathConflict(path.to_string())),
            _ => return Ok(None),
        };
    }

    Ok(Some((current, leaf)))
}

fn apply_op(document: &mut BsonDocument, op: UpdateOp) -> MemoryResult<()> {
    if op.field() == ID_FIELD && !matches!(op, UpdateOp::Set(..)) {
        return Err(MemoryStoreError::ImmutableId);
    }

    match op {
        UpdateOp::Set(field, value) => {
            if field == ID_FIELD && document.get(ID_FIELD) != Some(&value) {
                return Err(MemoryStoreError::ImmutableId);
            }

            if let Some((parent, leaf)) = parent_mut(document, &field, true)? {
                parent.insert(leaf, value);
            }
        }
        UpdateOp::Unset(field) => {
            if let Some((parent, leaf)) = parent_mut(document, &field, false)? {
                parent.remove(&leaf);
            }
        }
        UpdateOp::Inc(field, amount) => {
            if as_f64(&amount).is_none() {
                return Err(MemoryStoreError::TypeMismatch {
                    operation: "$inc",
                    expected: "numeric",
                    field,
                });
            }

            if let Some((parent, leaf)) = parent_mut(document, &field, true)? {
                let current = parent
                    .get(&leaf)
                    .cloned()
                    .unwrap_or(Bson::Int32(0));
                if as_f64(&current).is_none() {
                    return Err(MemoryStoreError::TypeMismatch {
                        operation: "$inc",
                        expected: "numeric",
                        field,
                    });
                }
                let sum = add_numbers(&current, &amount).ok_or_else(|| MemoryStoreError::Overflow {
                    operation: "$inc",
                    field: field.clone(),
                })?;

                parent.insert(leaf, sum);
            }
        }
        UpdateOp::Push(field, value) => {
            if let Some((parent, leaf)) = parent_mut(document, &field, true)? {
                match parent.get_mut(&leaf) {
                    Some(Bson::Array(items)) => items.push(value),
                    Some(_) => {
                        return Err(MemoryStoreError::TypeMismatch {
                            operation: "$push",
                            expected: "array",
                            field,
                        });
                    }
                    None => {
                        parent.insert(leaf, Bson::Array(vec![value]));
                    }
                }
            }
        }
    }

    Ok(())
}

/// Applies every operation of `update` in order. Returns `true` if the document changed.
///
/// On error the document is left untouched.
pub(crate) fn apply_update(document: &mut BsonDocument, update: &Update) -> MemoryResult<bool> {
    let mut updated = document.clone();

    for op in update.ops() {
        apply_op(&mut updated, op.clone())?;
    }

    if updated == *document {
        return Ok(false);
    }

    *document = updated;
    Ok(true)
}

fn copy_path(source: &BsonDocument, target: &mut BsonDocument, path: &str) {
    match path.split_once('.') {
        None => {
            if let Some(value) = source.get(path) {
                target.insert(path, value.clone());
            }
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = source.get(head) {
                let mut nested = match target.remove(head) {
                    Some(Bson::Document(existing)) => existing,
                    _ => BsonDocument::new(),
                };

                copy_path(inner, &mut nested, rest);
                if !nested.is_empty() {
                    target.insert(head, nested);
                }
            }
        }
    }
}

fn remove_path(document: &mut BsonDocument, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}

/// Reduces a document to a projection. Inclusion keeps `_id` unless it is excluded explicitly.
pub(crate) fn project(document: &BsonDocument, projection: &Projection) -> BsonDocument {
    match projection {
        Projection::Include(fields) => {
            let mut projected = BsonDocument::new();

            if let Some(id) = document.get(ID_FIELD) {
                projected.insert(ID_FIELD, id.clone());
            }

            for field in fields {
                copy_path(document, &mut projected, field);
            }

            projected
        }
        Projection::Exclude(fields) => {
            let mut projected = document.clone();

            for field in fields {
                remove_path(&mut projected, field);
            }

            projected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn set_creates_nested_documents() {
        let mut document = doc! { "_id": 1 };

        assert!(apply_update(&mut document, &Update::field("address.city", "Oslo")).unwrap());
        assert_eq!(document, doc! { "_id": 1, "address": { "city": "Oslo" } });
        assert!(!apply_update(&mut document, &Update::field("address.city", "Oslo")).unwrap());
    }

    #[test]
    fn inc_widens_and_push_appends() {
        let mut document = doc! { "_id": 1, "n": i32::MAX, "tags": ["a"] };
        let update = Update::new()
            .inc("n", 1)
            .inc("fresh", 2.5)
            .push("tags", "b")
            .push("log", 1)
            .unset("missing.path");

        apply_update(&mut document, &update).unwrap();

        assert_eq!(document.get("n"), Some(&Bson::Int64(i32::MAX as i64 + 1)));
        assert_eq!(document.get("fresh"), Some(&Bson::Double(2.5)));
        assert_eq!(document.get_array("tags").unwrap().len(), 2);
        assert_eq!(document.get_array("log").unwrap(), &vec![Bson::Int32(1)]);
    }

    #[test]
    fn failed_updates_leave_the_document_alone() {
        let mut document = doc! { "_id": 1, "name": "x" };
        let update = Update::new()
            .set("a", 1)
            .inc("name", 1);

        assert!(matches!(
            apply_update(&mut document, &update),
            Err(MemoryStoreError::TypeMismatch { .. })
        ));
        assert_eq!(document, doc! { "_id": 1, "name": "x" });
        assert!(matches!(
            apply_update(&mut document, &Update::field("_id", 2)),
            Err(MemoryStoreError::ImmutableId)
        ));
    }

    #[test]
    fn inc_rejects_integer_overflow() {
        let mut document = doc! { "_id": 1, "n": i64::MAX };

        assert!(matches!(
            apply_update(&mut document, &Update::new().inc("n", 1)),
            Err(MemoryStoreError::Overflow { operation: "$inc", .. })
        ));
        assert_eq!(document.get("n"), Some(&Bson::Int64(i64::MAX)));
    }

    #[test]
    fn sums_continue_as_doubles_past_i64() {
        assert_eq!(add_numbers(&Bson::Int64(i64::MAX), &Bson::Int32(1)), None);
        assert_eq!(
            sum_numbers(&Bson::Int64(i64::MAX), &Bson::Int64(1)),
            Some(Bson::Double(i64::MAX as f64 + 1.0))
        );
        assert_eq!(sum_numbers(&Bson::Int32(2), &Bson::Int64(3)), Some(Bson::Int64(5)));
        assert_eq!(sum_numbers(&Bson::String("x".into()), &Bson::Int32(1)), None);
    }

    #[test]
    fn projections_keep_id_on_inclusion() {
        let document = doc! { "_id": 7, "a": 1, "b": { "c": 2, "d": 3 } };

        assert_eq!(
            project(&document, &Projection::include(["b.c"])),
            doc! { "_id": 7, "b": { "c": 2 } }
        );
        assert_eq!(
            project(&document, &Projection::exclude(["a", "b.d"])),
            doc! { "_id": 7, "b": { "c": 2 } }
        );
    }
}
