//! Aggregation pipeline execution over in-memory documents.

use bson::{Bson, Document as BsonDocument};

use docpart_core::{
    aggregate::{Accumulator, GROUP_KEY_FIELD, Group, GroupKey, Pipeline, Stage},
    document::get_path,
    error::DocumentStoreResult,
};

use crate::{
    evaluator::{DocumentEvaluator, compare_values, sort_documents},
    mutate::{as_f64, project, sum_numbers},
};

/// Runs `pipeline` over `documents` in stage order.
pub(crate) fn run(
    mut documents: Vec<BsonDocument>,
    pipeline: &Pipeline,
) -> DocumentStoreResult<Vec<BsonDocument>> {
    for stage in pipeline.stages() {
        documents = match stage {
            Stage::Match(filter) => {
                let mut kept = Vec::with_capacity(documents.len());
                for document in documents {
                    if DocumentEvaluator::matches(&document, Some(filter))? {
                        kept.push(document);
                    }
                }

                kept
            }
            Stage::Group(group) => group_documents(&documents, group),
            Stage::Sort(sort) => {
                sort_documents(&mut documents, sort);
                documents
            }
            Stage::Project(projection) => documents
                .iter()
                .map(|document| project(document, projection))
                .collect(),
            Stage::Skip(skip) => documents
                .into_iter()
                .skip(usize::try_from(*skip).unwrap_or(usize::MAX))
                .collect(),
            Stage::Limit(limit) => documents
                .into_iter()
                .take(usize::try_from(*limit).unwrap_or(usize::MAX))
                .collect(),
        };
    }

    Ok(documents)
}

fn group_key(document: &BsonDocument, key: &GroupKey) -> Bson {
    let value_of = |field: &str| {
        get_path(document, field)
            .cloned()
            .unwrap_or(Bson::Null)
    };

    match key {
        GroupKey::Null => Bson::Null,
        GroupKey::Field(field) => value_of(field),
        GroupKey::Fields(fields) => Bson::Document(
            fields
                .iter()
                .map(|(alias, field)| (alias.clone(), value_of(field)))
                .collect(),
        ),
    }
}

/// Buckets documents by key, keeping buckets in first-appearance order.
fn group_documents(documents: &[BsonDocument], group: &Group) -> Vec<BsonDocument> {
    let mut buckets: Vec<(Bson, Vec<&BsonDocument>)> = Vec::new();

    for document in documents {
        let key = group_key(document, &group.key);

        match buckets
            .iter_mut()
            .find(|(existing, _)| compare_values(Some(existing), Some(&key)).is_eq())
        {
            Some((_, members)) => members.push(document),
            None => buckets.push((key, vec![document])),
        }
    }

    buckets
        .into_iter()
        .map(|(key, members)| {
            let mut output = BsonDocument::new();
            output.insert(GROUP_KEY_FIELD, key);

            for (name, accumulator) in &group.accumulators {
                output.insert(name.clone(), accumulate(&members, accumulator));
            }

            output
        })
        .collect()
}

fn accumulate(members: &[&BsonDocument], accumulator: &Accumulator) -> Bson {
    let values = |field: &str| {
        members
            .iter()
            .filter_map(|document| get_path(document, field))
            .cloned()
            .collect::<Vec<Bson>>()
    };

    match accumulator {
        Accumulator::Sum(field) => values(field)
            .iter()
            .filter(|value| as_f64(value).is_some())
            .fold(Bson::Int32(0), |total, value| {
                sum_numbers(&total, value).unwrap_or(total)
            }),
        Accumulator::Avg(field) => {
            let numbers: Vec<f64> = values(field)
                .iter()
                .filter_map(as_f64)
                .collect();

            if numbers.is_empty() {
                Bson::Null
            } else {
                Bson::Double(numbers.iter().sum::<f64>() / numbers.len() as f64)
            }
        }
        Accumulator::Min(field) => extreme(values(field), true),
        Accumulator::Max(field) => extreme(values(field), false),
        Accumulator::Count => i32::try_from(members.len())
            .map(Bson::Int32)
            .unwrap_or(Bson::Int64(members.len() as i64)),
        Accumulator::First(field) => members
            .first()
            .and_then(|document| get_path(document, field))
            .cloned()
            .unwrap_or(Bson::Null),
        Accumulator::Last(field) => members
            .last()
            .and_then(|document| get_path(document, field))
            .cloned()
            .unwrap_or(Bson::Null),
        Accumulator::Push(field) => Bson::Array(values(field)),
    }
}

// Nulls are ignored; an empty or all-null group yields null.
fn extreme(values: Vec<Bson>, smallest: bool) -> Bson {
    values
        .into_iter()
        .filter(|value| !matches!(value, Bson::Null))
        .reduce(|best, value| {
            let ordering = compare_values(Some(&value), Some(&best));

            if (smallest && ordering.is_lt()) || (!smallest && ordering.is_gt()) {
                value
            } else {
                best
            }
        })
        .unwrap_or(Bson::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docpart_core::query::{Filter, SortSpec};

    fn sales() -> Vec<BsonDocument> {
        vec![
            doc! { "_id": 1, "region": "north", "amount": 10 },
            doc! { "_id": 2, "region": "south", "amount": 5 },
            doc! { "_id": 3, "region": "north", "amount": 2.5 },
            doc! { "_id": 4, "region": "east" },
        ]
    }

    #[test]
    fn groups_accumulate_in_input_order() {
        let pipeline = Pipeline::new().group(
            Group::by_field("region")
                .accumulate("total", Accumulator::Sum("amount".into()))
                .accumulate("count", Accumulator::Count)
                .accumulate("ids", Accumulator::Push("_id".into()))
                .accumulate("avg", Accumulator::Avg("amount".into())),
        );

        let output = run(sales(), &pipeline).unwrap();

        assert_eq!(output.len(), 3);
        assert_eq!(
            output[0],
            doc! { "_id": "north", "total": 12.5, "count": 2, "ids": [1, 3], "avg": 6.25 }
        );
        assert_eq!(output[2].get("total"), Some(&Bson::Int32(0)));
        assert_eq!(output[2].get("avg"), Some(&Bson::Null));
    }

    #[test]
    fn match_sort_skip_limit() {
        let pipeline = Pipeline::new()
            .matching(Filter::exists("amount"))
            .sort(SortSpec::new().desc("amount"))
            .skip(1)
            .limit(1);

        let output = run(sales(), &pipeline).unwrap();

        assert_eq!(output, vec![doc! { "_id": 2, "region": "south", "amount": 5 }]);
    }

    #[test]
    fn min_and_max_skip_missing_values() {
        let pipeline = Pipeline::new().group(
            Group::all()
                .accumulate("min", Accumulator::Min("amount".into()))
                .accumulate("max", Accumulator::Max("amount".into())),
        );

        let output = run(sales(), &pipeline).unwrap();

        assert_eq!(output, vec![doc! { "_id": Bson::Null, "min": 2.5, "max": 10 }]);
    }

    #[test]
    fn integer_sums_past_i64_continue_as_doubles() {
        let documents = vec![
            doc! { "_id": 1, "reading": i64::MAX },
            doc! { "_id": 2, "reading": 1_i64 },
        ];
        let pipeline = Pipeline::new().group(Group::all().accumulate("total", Accumulator::Sum("reading".into())));

        let output = run(documents, &pipeline).unwrap();

        assert_eq!(output[0].get("total"), Some(&Bson::Double(i64::MAX as f64 + 1.0)));
    }

    #[test]
    fn invalid_match_filters_fail_the_pipeline() {
        let pipeline = Pipeline::new().matching(Filter::starts_with("region", 1));

        assert!(run(sales(), &pipeline).is_err());
    }
}
