//! Index descriptors.
//!
//! [`IndexKeys`] lists the indexed fields in order; [`IndexOptions`] carries the optional
//! settings a store applies when building the index. Options left as `None` are not sent.

use std::time::Duration;

/// How a single field participates in an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Ascending,
    Descending,
    Hashed,
    Text,
}

impl IndexKind {
    /// Suffix used in generated index names (`field_1`, `field_-1`, `field_hashed`, `field_text`).
    pub fn name_suffix(&self) -> &'static str {
        match self {
            IndexKind::Ascending => "1",
            IndexKind::Descending => "-1",
            IndexKind::Hashed => "hashed",
            IndexKind::Text => "text",
        }
    }
}

/// Ordered index key specification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexKeys {
    keys: Vec<(String, IndexKind)>,
}

impl IndexKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, kind: IndexKind) -> Self {
        Self::new().key(field, kind)
    }

    /// A text index spanning every given field.
    pub fn text<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        fields
            .into_iter()
            .fold(Self::new(), |keys, field| keys.key(field, IndexKind::Text))
    }

    pub fn key(mut self, field: impl Into<String>, kind: IndexKind) -> Self {
        self.keys.push((field.into(), kind));
        self
    }

    pub fn keys(&self) -> &[(String, IndexKind)] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The name a store assigns when none is given, e.g. `name_1_age_-1`.
    pub fn default_name(&self) -> String {
        self.keys
            .iter()
            .map(|(field, kind)| format!("{field}_{}", kind.name_suffix()))
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// Optional index settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexOptions {
    /// Reject documents with a duplicate key.
    pub unique: Option<bool>,
    /// Skip documents that lack the indexed field.
    pub sparse: Option<bool>,
    /// Expire documents this long after the indexed date.
    pub expire_after: Option<Duration>,
    /// Index name; generated from the keys when absent.
    pub name: Option<String>,
    /// Lower bound for 2d index coordinates.
    pub min: Option<f64>,
    /// Upper bound for 2d index coordinates.
    pub max: Option<f64>,
    /// Geohash precision for 2d indexes.
    pub bits: Option<u32>,
    pub default_language: Option<String>,
    pub language_override: Option<String>,
    /// Build without blocking other operations (ignored by recent servers).
    pub background: Option<bool>,
    pub version: Option<u32>,
    pub text_index_version: Option<u32>,
    pub sphere_index_version: Option<u32>,
}

impl IndexOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = Some(unique);
        self
    }

    pub fn sparse(mut self, sparse: bool) -> Self {
        self.sparse = Some(sparse);
        self
    }

    pub fn expire_after(mut self, ttl: Duration) -> Self {
        self.expire_after = Some(ttl);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn bounds(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn bits(mut self, bits: u32) -> Self {
        self.bits = Some(bits);
        self
    }

    pub fn default_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = Some(language.into());
        self
    }

    pub fn language_override(mut self, field: impl Into<String>) -> Self {
        self.language_override = Some(field.into());
        self
    }

    pub fn background(mut self, background: bool) -> Self {
        self.background = Some(background);
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    pub fn text_index_version(mut self, version: u32) -> Self {
        self.text_index_version = Some(version);
        self
    }

    pub fn sphere_index_version(mut self, version: u32) -> Self {
        self.sphere_index_version = Some(version);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_names_follow_key_order() {
        let keys = IndexKeys::single("name", IndexKind::Ascending).key("age", IndexKind::Descending);

        assert_eq!(keys.default_name(), "name_1_age_-1");
        assert_eq!(IndexKeys::text(["title", "body"]).default_name(), "title_text_body_text");
        assert_eq!(IndexKeys::single("sku", IndexKind::Hashed).default_name(), "sku_hashed");
    }
}
