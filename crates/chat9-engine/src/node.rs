//! Retrieved nodes cited by chat responses.

#[cfg(feature = "schema")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form node metadata (file name, document id, pipeline id, ...).
pub type Metadata = serde_json::Map<String, Value>;

/// A unit of retrieved content together with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct NodeWithScore {
    /// Node identifier.
    id: String,
    /// Similarity score, when the retriever reports one.
    score: Option<f64>,
    /// Text excerpt.
    text: String,
    /// Source metadata.
    #[serde(default)]
    metadata: Metadata,
}

impl NodeWithScore {
    /// Creates a node without score or metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            score: None,
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    /// Sets the similarity score.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Inserts a single metadata entry.
    pub fn with_metadata_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn score(&self) -> Option<f64> {
        self.score
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Returns a metadata value if it is a string.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}
