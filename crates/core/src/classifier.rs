//! Keyword -> tag -> category inference over normalized content.

use crate::error::{EngineError, Result};
use crate::models::CategoryTags;
use crate::vocabulary::Vocabulary;
use aho_corasick::{AhoCorasick, MatchKind};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Characters that may surround a keyword occurrence for it to count.
pub const BOUNDARY_CHARS: &[u8] = b"[](){}.,;:/~'\" \t\r";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    /// Frequency-weighted tag multiset, in vocabulary order.
    pub tags: Vec<String>,
    pub categories: CategoryTags,
}

pub struct Classifier {
    vocabulary: Arc<Vocabulary>,
    matcher: AhoCorasick,
    keywords: Vec<String>,
    /// Tags fed by each keyword, indexed like `keywords`.
    keyword_tags: Vec<Vec<String>>,
}

impl Classifier {
    pub fn new(vocabulary: Arc<Vocabulary>) -> Result<Self> {
        let mut keywords: Vec<String> = Vec::new();
        let mut keyword_tags: Vec<Vec<String>> = Vec::new();
        let mut positions: BTreeMap<String, usize> = BTreeMap::new();
        for (tag, kws) in vocabulary.tag_keywords() {
            for kw in kws {
                let idx = *positions.entry(kw.clone()).or_insert_with(|| {
                    keywords.push(kw.clone());
                    keyword_tags.push(Vec::new());
                    keywords.len() - 1
                });
                keyword_tags[idx].push(tag.clone());
            }
        }
        let matcher = AhoCorasick::builder()
            .match_kind(MatchKind::Standard)
            .build(&keywords)
            .map_err(|e| EngineError::Classification(format!("keyword matcher: {e}")))?;
        Ok(Self {
            vocabulary,
            matcher,
            keywords,
            keyword_tags,
        })
    }

    /// Counts valid occurrences of every keyword in `content`.
    ///
    /// Occurrences of one keyword never overlap each other; occurrences of
    /// different keywords may (`rio` and `rio doce` both count in
    /// ` rio doce `). Only keywords with a positive count are returned.
    pub fn keyword_frequencies(&self, content: &str) -> BTreeMap<&str, u32> {
        self.keyword_counts(content)
            .into_iter()
            .enumerate()
            .filter(|(_, c)| *c > 0)
            .map(|(id, c)| (self.keywords[id].as_str(), c))
            .collect()
    }

    fn keyword_counts(&self, content: &str) -> Vec<u32> {
        let mut counts = vec![0u32; self.keywords.len()];
        let mut next_start = vec![0usize; self.keywords.len()];
        for m in self.matcher.find_overlapping_iter(content) {
            let id = m.pattern().as_usize();
            if m.start() < next_start[id] {
                continue;
            }
            next_start[id] = m.end();
            if has_boundaries(content.as_bytes(), m.start(), m.end()) {
                counts[id] += 1;
            }
        }
        counts
    }

    pub fn classify(&self, content: &str) -> Classification {
        let counts = self.keyword_counts(content);
        let mut tag_occurrences: BTreeMap<String, u32> = BTreeMap::new();
        let mut tags = Vec::new();
        for (id, &freq) in counts.iter().enumerate() {
            if freq == 0 {
                continue;
            }
            for tag in &self.keyword_tags[id] {
                *tag_occurrences.entry(tag.clone()).or_insert(0) += freq;
                tags.extend(std::iter::repeat(tag.clone()).take(freq as usize));
            }
        }

        Classification {
            tags,
            categories: filter_categories(&self.vocabulary, &tag_occurrences),
        }
    }
}

/// Groups tags by category and keeps those reaching the category's
/// retention threshold. Categories with no occurrences get no entry.
pub fn filter_categories(
    vocabulary: &Vocabulary,
    tag_occurrences: &BTreeMap<String, u32>,
) -> CategoryTags {
    let mut grouped: CategoryTags = BTreeMap::new();
    for (tag, &freq) in tag_occurrences {
        if freq == 0 {
            continue;
        }
        if let Some(category) = vocabulary.category_of(tag) {
            grouped
                .entry(category.to_string())
                .or_default()
                .push((tag.clone(), freq));
        }
    }
    for (category, tags) in grouped.iter_mut() {
        let total: u32 = tags.iter().map(|(_, f)| f).sum();
        let tau = vocabulary.threshold(category);
        tags.retain(|(_, f)| f64::from(*f) / f64::from(total) >= tau);
    }
    grouped
}

fn has_boundaries(content: &[u8], start: usize, end: usize) -> bool {
    start > 0
        && end < content.len()
        && BOUNDARY_CHARS.contains(&content[start - 1])
        && BOUNDARY_CHARS.contains(&content[end])
}
