use crate::error::{EngineError, Result};
use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING,
};
use tantivy::tokenizer::{Language, LowerCaser, RegexTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

pub const CONTENT_TOKENIZER: &str = "corpus_content";
pub const TAGS_TOKENIZER: &str = "corpus_tags";

const WORD_PATTERN: &str = r"\w+(\.?\w+)*";
const TAG_PATTERN: &str = r"[^,]+";

#[derive(Debug, Clone, Copy)]
pub struct CorpusFields {
    pub title: Field,
    pub path: Field,
    pub content: Field,
    pub tags: Field,
    pub categories: Field,
}

impl CorpusFields {
    pub fn from_schema(schema: &Schema) -> Result<Self> {
        let field = |name: &str| {
            schema.get_field(name).map_err(|_| {
                EngineError::Config(format!("{name} field missing in index schema"))
            })
        };
        Ok(Self {
            title: field("title")?,
            path: field("path")?,
            content: field("content")?,
            tags: field("tags")?,
            categories: field("categories")?,
        })
    }
}

/// title: stored exact string; path: stored unique key; content: analyzed,
/// positional, stored; tags: comma-delimited, lower-cased, not stored;
/// categories: stored JSON blob, not indexed.
pub fn build_schema() -> Schema {
    let mut builder = Schema::builder();
    builder.add_text_field("title", STRING | STORED);
    builder.add_text_field("path", STRING | STORED);

    let content_indexing = TextFieldIndexing::default()
        .set_tokenizer(CONTENT_TOKENIZER)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    builder.add_text_field(
        "content",
        TextOptions::default()
            .set_indexing_options(content_indexing)
            .set_stored(),
    );

    let tags_indexing = TextFieldIndexing::default()
        .set_tokenizer(TAGS_TOKENIZER)
        .set_index_option(IndexRecordOption::WithFreqs);
    builder.add_text_field(
        "tags",
        TextOptions::default().set_indexing_options(tags_indexing),
    );

    builder.add_text_field("categories", STORED);
    builder.build()
}

/// Registers the analyzers referenced by the schema. Must run every time an
/// index is opened, before any reader or writer is used.
pub fn register_tokenizers(index: &Index, language: &str) -> Result<()> {
    let language = parse_language(language)
        .ok_or_else(|| EngineError::Config(format!("unsupported index language '{language}'")))?;
    let stop_words = StopWordFilter::new(language)
        .ok_or_else(|| EngineError::Config(format!("no stop words for {language:?}")))?;
    let words = RegexTokenizer::new(WORD_PATTERN).map_err(EngineError::IndexWrite)?;
    let content = TextAnalyzer::builder(words)
        .filter(LowerCaser)
        .filter(stop_words)
        .build();
    index.tokenizers().register(CONTENT_TOKENIZER, content);

    let tags = RegexTokenizer::new(TAG_PATTERN).map_err(EngineError::IndexWrite)?;
    let tags = TextAnalyzer::builder(tags).filter(LowerCaser).build();
    index.tokenizers().register(TAGS_TOKENIZER, tags);
    Ok(())
}

fn parse_language(name: &str) -> Option<Language> {
    let language = match name.to_lowercase().as_str() {
        "portuguese" | "por" | "pt" => Language::Portuguese,
        "english" | "eng" | "en" => Language::English,
        "spanish" | "spa" | "es" => Language::Spanish,
        "french" | "fra" | "fr" => Language::French,
        "german" | "deu" | "de" => Language::German,
        "italian" | "ita" | "it" => Language::Italian,
        "dutch" | "nld" | "nl" => Language::Dutch,
        _ => return None,
    };
    Some(language)
}
