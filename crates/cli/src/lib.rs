//! Command-line surface of the corpus engine.

use clap::{Args, Parser, Subcommand, ValueEnum};
use corpus_core::{SearchMode, SearchRequest};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "corpus", version, about = "Index, tag and query a document corpus")]
pub struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reset the index and re-index every extracted document
    Create {
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
    /// Extract new documents from a folder and index everything pending
    Add {
        /// Folder (or single file) to ingest before indexing
        #[arg(long)]
        folder: Option<PathBuf>,
        /// Allow OCR for documents without a usable text layer
        #[arg(long, default_value_t = false)]
        ocr: bool,
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
    /// Query the index; prints the JSON response
    #[command(subcommand)]
    Search(SearchCommand),
    /// Print the ledger row of a document as JSON
    Show { name: String },
}

#[derive(Subcommand, Debug)]
pub enum SearchCommand {
    /// Documents containing every term (comma-separated)
    Term {
        #[arg(value_delimiter = ',', num_args = 1..)]
        terms: Vec<String>,
    },
    /// Documents carrying an exact tag
    Tag { tag: String },
    /// AND / OR / NOT combination
    Advanced(AdvancedArgs),
    /// Raw JSON request, e.g. '{"AND": ["rio"], "OR": [], "NOT": []}'
    Json {
        request: String,
        #[arg(long, value_enum, default_value_t = ModeArg::Advanced)]
        mode: ModeArg,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    Term,
    Tag,
    Advanced,
}

impl From<ModeArg> for SearchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Term => SearchMode::Term,
            ModeArg::Tag => SearchMode::Tag,
            ModeArg::Advanced => SearchMode::Advanced,
        }
    }
}

#[derive(Args, Debug)]
pub struct AdvancedArgs {
    #[arg(long = "and", value_delimiter = ',', num_args = 1.., default_values_t = Vec::<String>::new())]
    pub and: Vec<String>,
    #[arg(long = "or", value_delimiter = ',', num_args = 1.., default_values_t = Vec::<String>::new())]
    pub or: Vec<String>,
    #[arg(long = "not", value_delimiter = ',', num_args = 1.., default_values_t = Vec::<String>::new())]
    pub not: Vec<String>,
}

impl SearchCommand {
    pub fn to_request(&self) -> corpus_core::Result<(SearchRequest, SearchMode)> {
        let request = match self {
            SearchCommand::Term { terms } => (SearchRequest::terms(terms.clone()), SearchMode::Term),
            SearchCommand::Tag { tag } => (SearchRequest::tag(tag.clone()), SearchMode::Tag),
            SearchCommand::Advanced(args) => (
                SearchRequest::advanced(args.and.clone(), args.or.clone(), args.not.clone()),
                SearchMode::Advanced,
            ),
            SearchCommand::Json { request, mode } => {
                (SearchRequest::from_json(request)?, (*mode).into())
            }
        };
        Ok(request)
    }
}
