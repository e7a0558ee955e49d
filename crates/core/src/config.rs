use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub index: IndexConfig,
    pub vocabulary: VocabularyConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub path: String,
    /// Staging buffer cap for the index writer, in megabytes.
    #[serde(default = "default_writer_heap_mb")]
    pub writer_heap_mb: usize,
    #[serde(default)]
    pub writer_threads: Option<usize>,
    /// Stop-word language of the `content` field analyzer.
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyConfig {
    /// Directory holding the `tag -> [keyword]` source files.
    pub keywords_dir: String,
    #[serde(default = "default_keywords_glob")]
    pub keywords_glob: String,
    /// The `tag -> category` file.
    pub tags: String,
    /// Category retention thresholds; unlisted categories keep every tag.
    #[serde(default = "default_thresholds")]
    pub thresholds: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_documents_dir")]
    pub documents_dir: String,
    /// Extractions with this many words or fewer are treated as failed.
    #[serde(default = "default_min_words")]
    pub min_words: usize,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            documents_dir: default_documents_dir(),
            min_words: default_min_words(),
            exclude: Vec::new(),
        }
    }
}

impl IndexConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            writer_heap_mb: default_writer_heap_mb(),
            writer_threads: None,
            language: default_language(),
        }
    }
}

fn default_writer_heap_mb() -> usize {
    256
}

fn default_language() -> String {
    "portuguese".to_string()
}

fn default_keywords_glob() -> String {
    "*.json".to_string()
}

pub fn default_thresholds() -> BTreeMap<String, f64> {
    BTreeMap::from([("subject".to_string(), 0.15), ("scale".to_string(), 0.15)])
}

fn default_documents_dir() -> String {
    "docs".to_string()
}

fn default_min_words() -> usize {
    1000
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}
