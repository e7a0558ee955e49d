//! Controlled vocabulary: keyword -> tag -> category, plus per-category
//! retention thresholds. Loaded once and shared read-only.

use crate::config::VocabularyConfig;
use crate::error::{EngineError, Result};
use crate::normalize::normalize;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct Vocabulary {
    tag_keywords: BTreeMap<String, Vec<String>>,
    tag_category: BTreeMap<String, String>,
    thresholds: BTreeMap<String, f64>,
}

impl Vocabulary {
    /// Builds a vocabulary, normalizing keywords and checking that every
    /// tag has a category.
    pub fn new(
        tag_keywords: BTreeMap<String, Vec<String>>,
        tag_category: BTreeMap<String, String>,
        thresholds: BTreeMap<String, f64>,
    ) -> Result<Self> {
        let mut normalized: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (tag, keywords) in tag_keywords {
            if !tag_category.contains_key(&tag) {
                return Err(EngineError::Classification(format!(
                    "tag '{tag}' has no category"
                )));
            }
            let entry = normalized.entry(tag.clone()).or_default();
            for kw in keywords {
                let kw = normalize(&kw);
                if kw.is_empty() {
                    return Err(EngineError::Classification(format!(
                        "tag '{tag}' lists an empty keyword"
                    )));
                }
                if !entry.contains(&kw) {
                    entry.push(kw);
                }
            }
        }
        for (category, tau) in &thresholds {
            if !(0.0..=1.0).contains(tau) {
                return Err(EngineError::Classification(format!(
                    "threshold for category '{category}' must be within [0, 1], got {tau}"
                )));
            }
        }
        Ok(Self {
            tag_keywords: normalized,
            tag_category,
            thresholds,
        })
    }

    /// Loads every keyword source under `keywords_dir` matching
    /// `keywords_glob` and the tag-to-category file.
    pub fn load(cfg: &VocabularyConfig) -> Result<Self> {
        let sources = keyword_sources(Path::new(&cfg.keywords_dir), &cfg.keywords_glob)?;
        let mut tag_keywords: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for source in &sources {
            let parsed: BTreeMap<String, Vec<String>> = read_json(source)?;
            debug!(source = %source.display(), tags = parsed.len(), "loaded keyword source");
            // Sources merge by union; a tag listed twice keeps both keyword lists.
            for (tag, keywords) in parsed {
                tag_keywords.entry(tag).or_default().extend(keywords);
            }
        }
        let tag_category: BTreeMap<String, String> = read_json(Path::new(&cfg.tags))?;
        let vocabulary = Self::new(tag_keywords, tag_category, cfg.thresholds.clone())?;
        info!(
            sources = sources.len(),
            tags = vocabulary.tag_keywords.len(),
            keywords = vocabulary.keyword_count(),
            "vocabulary loaded"
        );
        Ok(vocabulary)
    }

    pub fn category_of(&self, tag: &str) -> Option<&str> {
        self.tag_category.get(tag).map(String::as_str)
    }

    /// Retention threshold τ of `category`; 0 keeps every tag.
    pub fn threshold(&self, category: &str) -> f64 {
        self.thresholds.get(category).copied().unwrap_or(0.0)
    }

    pub fn tag_keywords(&self) -> &BTreeMap<String, Vec<String>> {
        &self.tag_keywords
    }

    fn keyword_count(&self) -> usize {
        self.tag_keywords.values().map(Vec::len).sum()
    }
}

fn keyword_sources(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(EngineError::Classification(format!(
            "keyword directory {} does not exist",
            dir.display()
        )));
    }
    let matcher = build_globset(pattern)?;
    let mut sources = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        if matcher.is_match(relative) {
            sources.push(entry.path().to_path_buf());
        }
    }
    Ok(sources)
}

fn build_globset(pattern: &str) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in pattern.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let glob = Glob::new(pat)
            .map_err(|e| EngineError::Config(format!("bad keyword glob '{pat}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| EngineError::Config(format!("bad keyword glob '{pattern}': {e}")))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).map_err(|e| {
        EngineError::Classification(format!("cannot read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&raw)
        .map_err(|e| EngineError::Classification(format!("malformed {}: {e}", path.display())))
}
