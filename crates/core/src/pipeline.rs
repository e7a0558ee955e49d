//! Engine orchestration: ingestion, batch indexing and search.

use crate::classifier::Classifier;
use crate::config::{AppConfig, ExtractionConfig};
use crate::error::{EngineError, Result};
use crate::extractor::{self, PdfTextExtractor, TextExtractor};
use crate::indexer::CorpusIndex;
use crate::models::{AddSummary, Document, SearchResponse};
use crate::normalize::process_content;
use crate::query::{build_plan, SearchMode, SearchRequest};
use crate::search;
use crate::vocabulary::Vocabulary;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::{Ledger, LedgerEntry, SqliteLedger};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

pub struct Engine {
    classifier: Arc<Classifier>,
    index: CorpusIndex,
    ledger: Arc<dyn Ledger>,
    extractor: Arc<dyn TextExtractor>,
    extraction: ExtractionConfig,
    // Serializes index writes and the ledger updates tied to them.
    writer_lock: Mutex<()>,
}

impl Engine {
    pub fn new(
        classifier: Arc<Classifier>,
        index: CorpusIndex,
        ledger: Arc<dyn Ledger>,
        extractor: Arc<dyn TextExtractor>,
        extraction: ExtractionConfig,
    ) -> Self {
        Self {
            classifier,
            index,
            ledger,
            extractor,
            extraction,
            writer_lock: Mutex::new(()),
        }
    }

    pub async fn from_config(cfg: &AppConfig) -> Result<Self> {
        let vocabulary = Arc::new(Vocabulary::load(&cfg.vocabulary)?);
        let classifier = Arc::new(Classifier::new(vocabulary)?);
        let index = CorpusIndex::open_or_create(&cfg.index)?;
        let ledger = SqliteLedger::open(&cfg.database.path).await?;
        let extractor = PdfTextExtractor::new(cfg.extraction.min_words);
        Ok(Self::new(
            classifier,
            index,
            Arc::new(ledger),
            Arc::new(extractor),
            cfg.extraction.clone(),
        ))
    }

    pub fn index(&self) -> &CorpusIndex {
        &self.index
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Rebuilds the index from every extracted document in the ledger.
    pub async fn create_searchable_data(&self) -> Result<AddSummary> {
        let _guard = self.writer_lock.lock().await;
        let reset = self.ledger.reset_indexed().await?;
        info!(reset, "ledger flags reset");
        self.index.clear()?;
        let indexed = self.index_pending().await?;
        Ok(AddSummary {
            extracted: 0,
            indexed,
        })
    }

    /// Optionally ingests `folder`, then indexes every pending document as
    /// one all-or-nothing batch.
    pub async fn add_documents(&self, folder: Option<&Path>, allow_ocr: bool) -> Result<AddSummary> {
        let _guard = self.writer_lock.lock().await;
        let extracted = match folder {
            Some(root) => {
                extractor::run_extractor(
                    self.ledger.as_ref(),
                    Arc::clone(&self.extractor),
                    &self.extraction,
                    root,
                    allow_ocr,
                )
                .await?
            }
            None => 0,
        };
        let indexed = self.index_pending().await?;
        Ok(AddSummary { extracted, indexed })
    }

    /// Callers must hold `writer_lock`.
    async fn index_pending(&self) -> Result<usize> {
        let pending = self.ledger.unindexed().await?;
        if pending.is_empty() {
            info!("nothing to index");
            return Ok(0);
        }
        info!(documents = pending.len(), "indexing batch");

        let classifier = Arc::clone(&self.classifier);
        let names: Vec<String> = pending.iter().map(|e| e.name.clone()).collect();
        let documents = tokio::task::spawn_blocking(move || {
            pending
                .par_iter()
                .map(|entry| prepare_document(&classifier, entry))
                .collect::<Result<Vec<Document>>>()
        })
        .await?
        .map_err(|e| {
            warn!(error = %e, "batch aborted before staging");
            e
        })?;

        let mut batch = self.index.begin_batch()?;
        if let Err(e) = documents.iter().try_for_each(|d| batch.stage(d)) {
            warn!(error = %e, "batch aborted while staging");
            batch.cancel()?;
            return Err(e);
        }
        let paths = batch.commit()?;

        if let Err(e) = self.ledger.mark_indexed(&names).await {
            error!(error = %e, "ledger update failed, reverting index commit");
            self.index.remove(&paths)?;
            return Err(EngineError::Ledger(e));
        }
        Ok(paths.len())
    }

    /// Runs a structured query against the last committed snapshot.
    pub fn search(&self, request: &SearchRequest, mode: SearchMode) -> Result<SearchResponse> {
        let plan = build_plan(request, mode)?;
        search::execute(&self.index, &plan)
    }

    pub async fn lookup(&self, name: &str) -> Result<Option<LedgerEntry>> {
        Ok(self.ledger.get(name).await?)
    }
}

/// Reads, normalizes and classifies one ledger entry's extracted text.
pub fn prepare_document(classifier: &Classifier, entry: &LedgerEntry) -> Result<Document> {
    let txt_path = PathBuf::from(&entry.txt_path);
    let bytes = std::fs::read(&txt_path).map_err(|source| EngineError::DocumentRead {
        path: txt_path.clone(),
        source,
    })?;
    let raw = String::from_utf8(bytes).map_err(|_| EngineError::Normalization {
        path: txt_path.clone(),
    })?;
    let content = process_content(&raw);
    let classification = classifier.classify(&content);
    let title = txt_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| entry.name.clone());
    Ok(Document {
        title,
        path: entry.pdf_path.clone(),
        content,
        tags: classification.tags,
        categories: classification.categories,
    })
}
