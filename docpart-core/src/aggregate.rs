//! Aggregation pipeline descriptors.
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s. Field references inside accumulators and
//! group keys are plain (possibly dotted) field paths, without any `$` prefix.
//!
//! ```ignore
//! let pipeline = Pipeline::new()
//!     .matching(Filter::eq("status", "open"))
//!     .group(Group::by_field("region").accumulate("total", Accumulator::Sum("amount".into())))
//!     .sort(SortSpec::new().desc("total"));
//! ```

use crate::query::{Expr, Projection, SortSpec};

/// Name of the output field holding the group key.
pub const GROUP_KEY_FIELD: &str = "_id";

/// How documents are bucketed by a [`Group`] stage.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupKey {
    /// Every document lands in a single group keyed `null`.
    Null,
    /// Group by the value of one field.
    Field(String),
    /// Group by several fields; the key is a document `{ alias: value, ... }`.
    Fields(Vec<(String, String)>),
}

/// Computes one output field per group.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    /// Sum of a numeric field. Non-numeric values are ignored.
    Sum(String),
    /// Average of a numeric field, `null` when no numeric value was seen.
    Avg(String),
    /// Smallest value of a field.
    Min(String),
    /// Largest value of a field.
    Max(String),
    /// Number of documents in the group.
    Count,
    /// Field value of the first document in the group.
    First(String),
    /// Field value of the last document in the group.
    Last(String),
    /// All values of a field, in input order.
    Push(String),
}

/// A `$group` style stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub key: GroupKey,
    pub accumulators: Vec<(String, Accumulator)>,
}

impl Group {
    pub fn new(key: GroupKey) -> Self {
        Self { key, accumulators: Vec::new() }
    }

    /// Groups every input document together.
    pub fn all() -> Self {
        Self::new(GroupKey::Null)
    }

    pub fn by_field(field: impl Into<String>) -> Self {
        Self::new(GroupKey::Field(field.into()))
    }

    /// Groups by several fields, each output under the same name as its field path
    /// with dots replaced by underscores.
    pub fn by_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(GroupKey::Fields(
            fields
                .into_iter()
                .map(|field| {
                    let field = field.into();
                    (field.replace('.', "_"), field)
                })
                .collect(),
        ))
    }

    /// Adds an output field computed by `accumulator`.
    pub fn accumulate(mut self, output: impl Into<String>, accumulator: Accumulator) -> Self {
        self.accumulators.push((output.into(), accumulator));
        self
    }
}

/// A pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Expr),
    Group(Group),
    Sort(SortSpec),
    Project(Projection),
    Skip(u64),
    Limit(u64),
}

/// An ordered aggregation pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Appends a match stage unless `filter` is absent or matches everything.
    pub fn matching_opt(self, filter: Option<Expr>) -> Self {
        match filter {
            Some(filter) if !filter.is_match_all() => self.matching(filter),
            _ => self,
        }
    }

    pub fn matching(self, filter: Expr) -> Self {
        self.stage(Stage::Match(filter))
    }

    pub fn group(self, group: Group) -> Self {
        self.stage(Stage::Group(group))
    }

    pub fn sort(self, sort: SortSpec) -> Self {
        self.stage(Stage::Sort(sort))
    }

    pub fn project(self, projection: Projection) -> Self {
        self.stage(Stage::Project(projection))
    }

    pub fn skip(self, skip: u64) -> Self {
        self.stage(Stage::Skip(skip))
    }

    pub fn limit(self, limit: u64) -> Self {
        self.stage(Stage::Limit(limit))
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Filter;

    #[test]
    fn match_all_filters_are_skipped() {
        let pipeline = Pipeline::new()
            .matching_opt(None)
            .matching_opt(Some(Filter::all()))
            .matching_opt(Some(Filter::eq("a", 1)));

        assert_eq!(pipeline.stages().len(), 1);
    }

    #[test]
    fn multi_field_keys_are_aliased() {
        let group = Group::by_fields(["region", "address.city"]);

        assert_eq!(
            group.key,
            GroupKey::Fields(vec![
                ("region".to_string(), "region".to_string()),
                ("address_city".to_string(), "address.city".to_string()),
            ])
        );
    }
}
