use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Category -> retained `(tag, frequency)` pairs.
pub type CategoryTags = BTreeMap<String, Vec<(String, u32)>>;

/// A document ready to be committed to the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    /// Original source file location; unique within the index.
    pub path: String,
    /// Normalized, space-padded full text.
    pub content: String,
    /// Frequency-weighted tag multiset: a tag found `n` times appears `n` times.
    pub tags: Vec<String>,
    pub categories: CategoryTags,
}

impl Document {
    /// The comma-delimited value stored in the `tags` index field.
    pub fn tags_field(&self) -> String {
        self.tags.join(",")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub path: String,
    pub occurrences: BTreeMap<String, usize>,
    pub categories: CategoryTags,
    pub score: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AddSummary {
    /// Documents newly extracted and registered in the ledger.
    pub extracted: usize,
    /// Documents committed to the index by this run.
    pub indexed: usize,
}
