//! Translation of docpart descriptors into MongoDB documents.
//!
//! Filters go through [`MongoQueryTranslator`]; sorts, projections, updates, pipelines and index
//! specifications have plain conversion functions.

use bson::{Bson, Document, doc};
use mongodb::options::{
    IndexOptions as MongoIndexOptions, IndexVersion, Sphere2DIndexVersion, TextIndexVersion,
};

use docpart_core::{
    aggregate::{Accumulator, GroupKey, Pipeline, Stage},
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    index::{IndexKeys, IndexKind, IndexOptions},
    query::{Expr, FieldOp, Projection, QueryVisitor, SortDirection, SortSpec},
    update::{Update, UpdateOp},
};

/// Escapes regex metacharacters so a value matches literally.
fn escape_regex(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());

    for c in value.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    escaped
}

fn regex(pattern: String) -> Document {
    doc! { "$regex": pattern }
}

/// Translates filter expressions into MongoDB query documents.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// Translates an optional filter; `None` matches every document.
    pub fn filter(expr: Option<&Expr>) -> DocumentStoreResult<Document> {
        match expr {
            Some(expr) => MongoQueryTranslator.visit_expr(expr),
            None => Ok(doc! {}),
        }
    }

    fn contains(value: &Bson) -> Document {
        match value {
            Bson::String(s) => regex(escape_regex(s)),
            Bson::Array(items) => doc! { "$all": items.clone() },
            other => doc! { "$eq": other.clone() },
        }
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Ok(doc! {});
        }

        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            // Every stored document has a primary key, so this matches nothing.
            return Ok(doc! { ID_FIELD: { "$exists": false } });
        }

        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        // `$not` is only valid as a field operator.
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let string_operand = |operator: &str| match value {
            Bson::String(s) => Ok(s.as_str()),
            _ => Err(DocumentStoreError::InvalidArgument(format!(
                "{operator} on '{field}' requires a string value"
            ))),
        };
        let as_list = || match value {
            Bson::Array(items) => items.clone(),
            single => vec![single.clone()],
        };

        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::Contains => Self::contains(value),
                FieldOp::NotContains => doc! { "$not": Self::contains(value) },
                FieldOp::StartsWith => regex(format!("^{}", escape_regex(string_operand("starts_with")?))),
                FieldOp::EndsWith => regex(format!("{}$", escape_regex(string_operand("ends_with")?))),
                FieldOp::AnyOf => doc! { "$in": as_list() },
                FieldOp::NoneOf => doc! { "$nin": as_list() },
            }
        })
    }
}

pub(crate) fn sort_document(sort: &SortSpec) -> Option<Document> {
    if sort.is_empty() {
        return None;
    }

    Some(
        sort.keys()
            .iter()
            .map(|key| {
                let direction = match key.direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                };

                (key.field.clone(), Bson::Int32(direction))
            })
            .collect(),
    )
}

pub(crate) fn projection_document(projection: &Projection) -> Document {
    let flag = match projection {
        Projection::Include(_) => 1,
        Projection::Exclude(_) => 0,
    };

    projection
        .fields()
        .iter()
        .map(|field| (field.clone(), Bson::Int32(flag)))
        .collect()
}

fn add_amounts(left: &Bson, right: &Bson) -> Bson {
    match (left, right) {
        (Bson::Int32(a), Bson::Int32(b)) => a
            .checked_add(*b)
            .map(Bson::Int32)
            .unwrap_or(Bson::Int64(*a as i64 + *b as i64)),
        (Bson::Int32(a), Bson::Int64(b)) => checked_or_double(*a as i64, *b),
        (Bson::Int64(a), Bson::Int32(b)) => checked_or_double(*a, *b as i64),
        (Bson::Int64(a), Bson::Int64(b)) => checked_or_double(*a, *b),
        (a, b) => Bson::Double(as_f64(a) + as_f64(b)),
    }
}

fn checked_or_double(a: i64, b: i64) -> Bson {
    a.checked_add(b)
        .map(Bson::Int64)
        .unwrap_or(Bson::Double(a as f64 + b as f64))
}

fn as_f64(value: &Bson) -> f64 {
    match value {
        Bson::Int32(n) => *n as f64,
        Bson::Int64(n) => *n as f64,
        Bson::Double(n) => *n,
        _ => 0.0,
    }
}

/// Builds an update document grouped by operator. Repeated `Inc`s on one field are added
/// together; repeated `Push`es become a single `$each`.
pub(crate) fn update_document(update: &Update) -> Document {
    let mut set = Document::new();
    let mut unset = Document::new();
    let mut inc = Document::new();
    let mut push: Vec<(String, Vec<Bson>)> = Vec::new();

    for op in update.ops() {
        match op {
            UpdateOp::Set(field, value) => {
                set.insert(field.clone(), value.clone());
            }
            UpdateOp::Unset(field) => {
                unset.insert(field.clone(), "");
            }
            UpdateOp::Inc(field, amount) => {
                let total = match inc.get(field) {
                    Some(previous) => add_amounts(previous, amount),
                    None => amount.clone(),
                };
                inc.insert(field.clone(), total);
            }
            UpdateOp::Push(field, value) => match push
                .iter_mut()
                .find(|(existing, _)| existing == field)
            {
                Some((_, values)) => values.push(value.clone()),
                None => push.push((field.clone(), vec![value.clone()])),
            },
        }
    }

    let mut document = Document::new();
    for (operator, fields) in [("$set", set), ("$unset", unset), ("$inc", inc)] {
        if !fields.is_empty() {
            document.insert(operator, fields);
        }
    }

    if !push.is_empty() {
        document.insert(
            "$push",
            push.into_iter()
                .map(|(field, mut values)| {
                    let value = if values.len() == 1 {
                        values.remove(0)
                    } else {
                        Bson::Document(doc! { "$each": values })
                    };

                    (field, value)
                })
                .collect::<Document>(),
        );
    }

    document
}

fn field_ref(field: &str) -> Bson {
    Bson::String(format!("${field}"))
}

fn accumulator_document(accumulator: &Accumulator) -> Document {
    match accumulator {
        Accumulator::Sum(field) => doc! { "$sum": field_ref(field) },
        Accumulator::Avg(field) => doc! { "$avg": field_ref(field) },
        Accumulator::Min(field) => doc! { "$min": field_ref(field) },
        Accumulator::Max(field) => doc! { "$max": field_ref(field) },
        Accumulator::Count => doc! { "$sum": 1 },
        Accumulator::First(field) => doc! { "$first": field_ref(field) },
        Accumulator::Last(field) => doc! { "$last": field_ref(field) },
        Accumulator::Push(field) => doc! { "$push": field_ref(field) },
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Translates a pipeline into MongoDB stage documents.
pub(crate) fn pipeline_documents(pipeline: &Pipeline) -> DocumentStoreResult<Vec<Document>> {
    let mut stages = Vec::with_capacity(pipeline.stages().len());

    for stage in pipeline.stages() {
        let document = match stage {
            Stage::Match(filter) => doc! { "$match": MongoQueryTranslator.visit_expr(filter)? },
            Stage::Group(group) => {
                let key = match &group.key {
                    GroupKey::Null => Bson::Null,
                    GroupKey::Field(field) => field_ref(field),
                    GroupKey::Fields(fields) => Bson::Document(
                        fields
                            .iter()
                            .map(|(alias, field)| (alias.clone(), field_ref(field)))
                            .collect(),
                    ),
                };

                let mut spec = doc! { "_id": key };
                for (name, accumulator) in &group.accumulators {
                    spec.insert(name.clone(), accumulator_document(accumulator));
                }

                doc! { "$group": spec }
            }
            Stage::Sort(sort) => match sort_document(sort) {
                Some(sort) => doc! { "$sort": sort },
                None => continue,
            },
            Stage::Project(projection) => doc! { "$project": projection_document(projection) },
            Stage::Skip(skip) => doc! { "$skip": to_i64(*skip) },
            Stage::Limit(limit) => doc! { "$limit": to_i64(*limit) },
        };

        stages.push(document);
    }

    Ok(stages)
}

pub(crate) fn index_keys_document(keys: &IndexKeys) -> Document {
    keys.keys()
        .iter()
        .map(|(field, kind)| {
            let value = match kind {
                IndexKind::Ascending => Bson::Int32(1),
                IndexKind::Descending => Bson::Int32(-1),
                IndexKind::Hashed => Bson::String("hashed".to_string()),
                IndexKind::Text => Bson::String("text".to_string()),
            };

            (field.clone(), value)
        })
        .collect()
}

/// Maps index options onto the driver's options. Unset values stay unset.
pub(crate) fn index_options(options: IndexOptions) -> MongoIndexOptions {
    let mut native = MongoIndexOptions::default();

    native.unique = options.unique;
    native.sparse = options.sparse;
    native.expire_after = options.expire_after;
    native.name = options.name;
    native.min = options.min;
    native.max = options.max;
    native.bits = options.bits;
    native.default_language = options.default_language;
    native.language_override = options.language_override;
    native.background = options.background;
    native.version = options.version.map(|version| match version {
        0 => IndexVersion::V0,
        1 => IndexVersion::V1,
        2 => IndexVersion::V2,
        other => IndexVersion::Custom(other),
    });
    native.text_index_version = options
        .text_index_version
        .map(|version| match version {
            1 => TextIndexVersion::V1,
            2 => TextIndexVersion::V2,
            3 => TextIndexVersion::V3,
            other => TextIndexVersion::Custom(other),
        });
    native.sphere_2d_index_version = options
        .sphere_index_version
        .map(|version| match version {
            2 => Sphere2DIndexVersion::V2,
            3 => Sphere2DIndexVersion::V3,
            other => Sphere2DIndexVersion::Custom(other),
        });

    native
}

#[cfg(test)]
mod tests {
    use super::*;
    use docpart_core::{
        aggregate::Group,
        query::Filter,
    };

    fn translate(expr: Expr) -> Document {
        MongoQueryTranslator.visit_expr(&expr).unwrap()
    }

    #[test]
    fn empty_conjunction_matches_everything() {
        assert_eq!(translate(Filter::all()), doc! {});
        assert_eq!(MongoQueryTranslator::filter(None).unwrap(), doc! {});
    }

    #[test]
    fn negation_uses_nor() {
        assert_eq!(
            translate(Filter::eq("a", 1).not()),
            doc! { "$nor": [{ "a": { "$eq": 1 } }] }
        );
    }

    #[test]
    fn string_operators_match_literally() {
        assert_eq!(
            translate(Filter::starts_with("name", "a.b")),
            doc! { "name": { "$regex": "^a\\.b" } }
        );
        assert_eq!(
            translate(Filter::contains("tags", "x")),
            doc! { "tags": { "$regex": "x" } }
        );
        assert!(
            MongoQueryTranslator
                .visit_expr(&Filter::ends_with("n", 3))
                .is_err()
        );
    }

    #[test]
    fn updates_group_by_operator() {
        let update = Update::new()
            .set("a", 1)
            .inc("n", 1)
            .inc("n", 2)
            .push("tags", "x")
            .push("tags", "y")
            .unset("old");

        assert_eq!(
            update_document(&update),
            doc! {
                "$set": { "a": 1 },
                "$unset": { "old": "" },
                "$inc": { "n": 3 },
                "$push": { "tags": { "$each": ["x", "y"] } },
            }
        );
    }

    #[test]
    fn merged_increments_widen_instead_of_overflowing() {
        let update = Update::new()
            .inc("n", i64::MAX)
            .inc("n", 1_i64);

        assert_eq!(
            update_document(&update),
            doc! { "$inc": { "n": i64::MAX as f64 + 1.0 } }
        );
    }

    #[test]
    fn pipelines_reference_fields_with_dollar() {
        let pipeline = Pipeline::new()
            .matching(Filter::gt("amount", 0))
            .group(
                Group::by_field("region")
                    .accumulate("total", Accumulator::Sum("amount".into()))
                    .accumulate("count", Accumulator::Count),
            )
            .sort(SortSpec::new())
            .limit(5);

        assert_eq!(
            pipeline_documents(&pipeline).unwrap(),
            vec![
                doc! { "$match": { "amount": { "$gt": 0 } } },
                doc! { "$group": { "_id": "$region", "total": { "$sum": "$amount" }, "count": { "$sum": 1 } } },
                doc! { "$limit": 5_i64 },
            ]
        );
    }

    #[test]
    fn index_keys_keep_order() {
        let keys = IndexKeys::single("sku", IndexKind::Hashed).key("name", IndexKind::Descending);

        assert_eq!(index_keys_document(&keys), doc! { "sku": "hashed", "name": -1 });
        assert_eq!(
            sort_document(&SortSpec::new().desc("n").asc("_id")),
            Some(doc! { "n": -1, "_id": 1 })
        );
    }
}
