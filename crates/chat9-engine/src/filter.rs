//! Retrieval filters derived from requested document ids.
//!
//! Filters are plain data: the HTTP layer derives them with
//! [`generate_filters`] and hands them to a [`ChatEngineProvider`], which
//! either translates them for its vector store or applies
//! [`MetadataFilters::matches`] to an in-memory node list.
//!
//! [`ChatEngineProvider`]: crate::ChatEngineProvider

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::node::Metadata;

/// Metadata key holding the source document id of a node.
pub const DOCUMENT_ID_KEY: &str = "doc_id";

/// A single `key in values` criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataFilter {
    key: String,
    values: Vec<String>,
}

impl MetadataFilter {
    /// Creates a criterion matching nodes whose `key` is one of `values`.
    pub fn one_of(key: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            key: key.into(),
            values,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Returns true if the metadata satisfies this criterion.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match metadata.get(&self.key) {
            Some(Value::String(value)) => self.values.iter().any(|v| v == value),
            Some(Value::Null) | None => false,
            Some(other) => {
                let value = other.to_string();
                self.values.iter().any(|v| *v == value)
            }
        }
    }
}

impl fmt::Display for MetadataFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in [{}]", self.key, self.values.join(", "))
    }
}

/// Conjunction of metadata criteria. Empty means no restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetadataFilters {
    filters: Vec<MetadataFilter>,
}

impl MetadataFilters {
    /// Returns filters that impose no restriction.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// Adds a criterion.
    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Returns true if no criterion is set.
    pub fn is_unrestricted(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn filters(&self) -> &[MetadataFilter] {
        &self.filters
    }

    /// Returns true if the metadata satisfies every criterion.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.filters.iter().all(|filter| filter.matches(metadata))
    }
}

impl fmt::Display for MetadataFilters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.filters.is_empty() {
            return f.write_str("no restriction");
        }

        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                f.write_str(" and ")?;
            }
            write!(f, "{filter}")?;
        }

        Ok(())
    }
}

/// Derives retrieval filters from the requested document ids.
///
/// An empty list yields [`MetadataFilters::unrestricted`]. Otherwise
/// retrieval is restricted to nodes whose [`DOCUMENT_ID_KEY`] is one of the
/// ids, deduplicated in order of first occurrence.
pub fn generate_filters(document_ids: &[String]) -> MetadataFilters {
    let mut ids: Vec<String> = Vec::with_capacity(document_ids.len());
    for id in document_ids {
        if !ids.contains(id) {
            ids.push(id.clone());
        }
    }

    if ids.is_empty() {
        return MetadataFilters::unrestricted();
    }

    MetadataFilters::unrestricted().with_filter(MetadataFilter::one_of(DOCUMENT_ID_KEY, ids))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn metadata(value: Value) -> Metadata {
        match value {
            Value::Object(map) => map,
            _ => Metadata::new(),
        }
    }

    #[test]
    fn empty_ids_are_unrestricted() {
        let filters = generate_filters(&[]);
        assert!(filters.is_unrestricted());
        assert_eq!(filters.to_string(), "no restriction");
        assert!(filters.matches(&Metadata::new()));
    }

    #[test]
    fn duplicates_collapse_in_order() {
        let ids = ["b", "a", "b", "c", "a"].map(String::from);
        let filters = generate_filters(&ids);

        assert_eq!(filters.filters().len(), 1);
        assert_eq!(filters.filters()[0].key(), DOCUMENT_ID_KEY);
        assert_eq!(filters.filters()[0].values(), ["b", "a", "c"]);
        assert_eq!(filters.to_string(), "doc_id in [b, a, c]");
    }

    #[test]
    fn restricted_filters_match_by_document_id() {
        let filters = generate_filters(&["doc-1".to_owned()]);

        assert!(filters.matches(&metadata(json!({"doc_id": "doc-1"}))));
        assert!(!filters.matches(&metadata(json!({"doc_id": "doc-2"}))));
        assert!(!filters.matches(&metadata(json!({"file_name": "a.pdf"}))));
    }

    #[test]
    fn numeric_metadata_is_compared_as_text() {
        let filters = generate_filters(&["42".to_owned()]);
        assert!(filters.matches(&metadata(json!({"doc_id": 42}))));
    }

    proptest! {
        #[test]
        fn derivation_is_total(ids in prop::collection::vec(".{0,12}", 0..24)) {
            let filters = generate_filters(&ids);
            prop_assert_eq!(filters.is_unrestricted(), ids.is_empty());
        }

        #[test]
        fn derivation_is_deterministic(ids in prop::collection::vec("[a-c]{1,2}", 0..16)) {
            prop_assert_eq!(generate_filters(&ids), generate_filters(&ids));
        }

        #[test]
        fn every_requested_id_matches(ids in prop::collection::vec("[a-z0-9]{1,8}", 1..16)) {
            let filters = generate_filters(&ids);
            for id in &ids {
                let node = metadata(json!({ "doc_id": id }));
                prop_assert!(filters.matches(&node));
            }
        }
    }
}
