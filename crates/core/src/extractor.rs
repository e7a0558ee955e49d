//! Text extraction collaborator and folder ingestion.
//!
//! Ingestion turns source files into `.txt` files under the documents
//! directory and registers them in the ledger with `indexed = 0`; indexing
//! picks them up from there.

use crate::config::ExtractionConfig;
use crate::error::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::{Ledger, LedgerEntry};
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("unsupported input: {0}")]
    Unsupported(String),
    #[error("pdf parsing failed: {0}")]
    Pdf(String),
    #[error("only {words} words extracted")]
    InsufficientText { words: usize },
    #[error("only {words} words extracted and no OCR backend is available")]
    OcrUnavailable { words: usize },
}

/// Produces the plain text of one source file. No retries: a failure is
/// final for that file in the current run.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path, allow_ocr: bool) -> std::result::Result<String, ExtractError>;
}

/// Reads files that already are text.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path, _allow_ocr: bool) -> std::result::Result<String, ExtractError> {
        let bytes = fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Reads the text layer of PDF files. A text layer of `min_words` words or
/// fewer is treated as a scanned document that would need OCR.
#[derive(Debug, Clone, Copy)]
pub struct PdfTextExtractor {
    pub min_words: usize,
}

impl PdfTextExtractor {
    pub fn new(min_words: usize) -> Self {
        Self { min_words }
    }
}

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, path: &Path, allow_ocr: bool) -> std::result::Result<String, ExtractError> {
        let text = pdf_text(path)?;
        let words = text.split_whitespace().count();
        if words > self.min_words {
            Ok(text)
        } else if allow_ocr {
            Err(ExtractError::OcrUnavailable { words })
        } else {
            Err(ExtractError::InsufficientText { words })
        }
    }
}

#[cfg(feature = "pdf")]
fn pdf_text(path: &Path) -> std::result::Result<String, ExtractError> {
    pdf_extract::extract_text(path).map_err(|e| ExtractError::Pdf(e.to_string()))
}

#[cfg(not(feature = "pdf"))]
fn pdf_text(path: &Path) -> std::result::Result<String, ExtractError> {
    Err(ExtractError::Unsupported(format!(
        "{}: built without the `pdf` feature",
        path.display()
    )))
}

/// Extracts every not-yet-registered PDF under `root` and registers the
/// results. Returns how many documents were registered.
pub async fn run_extractor(
    ledger: &dyn Ledger,
    extractor: Arc<dyn TextExtractor>,
    cfg: &ExtractionConfig,
    root: &Path,
    allow_ocr: bool,
) -> Result<usize> {
    let known = ledger.known_pdf_paths().await?;
    let documents_dir = PathBuf::from(&cfg.documents_dir);
    fs::create_dir_all(&documents_dir)?;
    let excludes = build_globset(&cfg.exclude)?;
    let root = root.to_path_buf();

    info!(root = %root.display(), allow_ocr, "starting extraction");
    let entries = tokio::task::spawn_blocking(move || {
        let pending = pending_sources(&root, &excludes, &known);
        info!(pending = pending.len(), "sources awaiting extraction");
        pending
            .par_iter()
            .filter_map(|source| extract_one(extractor.as_ref(), source, &documents_dir, allow_ocr))
            .collect::<Vec<LedgerEntry>>()
    })
    .await?;

    ledger.register(&entries).await?;
    info!(registered = entries.len(), "extraction complete");
    Ok(entries.len())
}

fn pending_sources(root: &Path, excludes: &GlobSet, known: &HashSet<String>) -> Vec<PathBuf> {
    discover_sources(root, excludes)
        .into_iter()
        .filter(|p| !known.contains(p.to_string_lossy().as_ref()))
        .collect()
}

/// A single file is taken as-is; a directory is walked for PDF files,
/// skipping hidden and excluded entries.
pub fn discover_sources(root: &Path, excludes: &GlobSet) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }
    let mut sources = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !(is_hidden(e.path()) || excludes.is_match(e.path())))
    {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        if entry.file_type().is_file() && is_pdf(entry.path()) {
            sources.push(entry.path().to_path_buf());
        }
    }
    sources
}

fn extract_one(
    extractor: &dyn TextExtractor,
    source: &Path,
    documents_dir: &Path,
    allow_ocr: bool,
) -> Option<LedgerEntry> {
    info!(path = %source.display(), "extracting");
    let text = match extractor.extract(source, allow_ocr) {
        Ok(text) => text,
        Err(e) => {
            warn!(path = %source.display(), error = %e, "extraction failed");
            return None;
        }
    };
    // Re-join words hyphenated across line breaks.
    let text = text.replace("-\n", "");
    let name = source.file_name()?.to_string_lossy().into_owned();
    let txt_path = documents_dir.join(format!("{name}.txt"));
    if let Err(e) = fs::write(&txt_path, text) {
        warn!(path = %txt_path.display(), error = %e, "cannot write extracted text");
        return None;
    }
    Some(LedgerEntry::extracted(
        name,
        source.to_string_lossy(),
        txt_path.to_string_lossy(),
    ))
}

fn is_pdf(path: &Path) -> bool {
    let by_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    by_extension
        || infer::get_from_path(path)
            .ok()
            .flatten()
            .map(|kind| kind.mime_type() == "application/pdf")
            .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat)
            .map_err(|e| crate::error::EngineError::Config(format!("bad exclude '{pat}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| crate::error::EngineError::Config(e.to_string()))
}
