//! Corpus engine: normalization, vocabulary classification, full-text
//! indexing and two-stage search over extracted documents.

pub mod classifier;
pub mod config;
pub mod error;
pub mod extractor;
pub mod indexer;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod query;
pub mod schema;
pub mod search;
pub mod vocabulary;

pub use error::{EngineError, Result};
pub use models::{AddSummary, Document, SearchHit, SearchResponse};
pub use pipeline::Engine;
pub use query::{SearchMode, SearchRequest};
