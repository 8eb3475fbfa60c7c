//! Update descriptors.
//!
//! An [`Update`] is an ordered list of field operations applied to every matched document.
//!
//! ```ignore
//! let update = Update::new()
//!     .set("status", "shipped")
//!     .inc("revision", 1)
//!     .push("history", "shipped");
//! ```

use bson::Bson;

/// A single field modification.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    /// Sets the field, creating intermediate documents for dotted paths.
    Set(String, Bson),
    /// Removes the field.
    Unset(String),
    /// Adds a number to the field; a missing field is treated as zero.
    Inc(String, Bson),
    /// Appends a value to an array field; a missing field becomes a one-element array.
    Push(String, Bson),
}

impl UpdateOp {
    /// Returns the field path this operation targets.
    pub fn field(&self) -> &str {
        match self {
            UpdateOp::Set(field, _)
            | UpdateOp::Unset(field)
            | UpdateOp::Inc(field, _)
            | UpdateOp::Push(field, _) => field,
        }
    }
}

/// An ordered list of [`UpdateOp`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    ops: Vec<UpdateOp>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for an update setting a single field.
    pub fn field(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::new().set(field, value)
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.ops.push(UpdateOp::Set(field.into(), value.into()));
        self
    }

    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.ops.push(UpdateOp::Unset(field.into()));
        self
    }

    pub fn inc(mut self, field: impl Into<String>, amount: impl Into<Bson>) -> Self {
        self.ops.push(UpdateOp::Inc(field.into(), amount.into()));
        self
    }

    pub fn push(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.ops.push(UpdateOp::Push(field.into(), value.into()));
        self
    }

    pub fn ops(&self) -> &[UpdateOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl IntoIterator for Update {
    type Item = UpdateOp;
    type IntoIter = std::vec::IntoIter<UpdateOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

/// Counts reported by a replace or update call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Documents matched by the filter.
    pub matched: u64,
    /// Documents actually changed.
    pub modified: u64,
}

impl UpdateOutcome {
    pub fn new(matched: u64, modified: u64) -> Self {
        Self { matched, modified }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_keep_insertion_order() {
        let update = Update::new()
            .set("a", 1)
            .unset("b")
            .inc("c", 2)
            .push("d", "x");

        let fields: Vec<&str> = update
            .ops()
            .iter()
            .map(UpdateOp::field)
            .collect();

        assert_eq!(fields, ["a", "b", "c", "d"]);
        assert!(Update::new().is_empty());
    }
}
