//! On-disk (or in-memory) document index with single-writer batch sessions.
//!
//! Readers always search the last committed snapshot: the reader is
//! reloaded manually, and only after a successful commit.

use crate::config::IndexConfig;
use crate::error::{EngineError, Result};
use crate::models::Document;
use crate::schema::{build_schema, register_tokenizers, CorpusFields};
use std::path::Path;
use tantivy::directory::MmapDirectory;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyError, Term};
use tracing::{debug, info, warn};

/// Smallest writer budget the storage engine accepts per worker thread.
const MIN_HEAP_PER_THREAD: usize = 15_000_000;

pub struct CorpusIndex {
    index: Index,
    reader: IndexReader,
    fields: CorpusFields,
    writer_threads: usize,
    writer_heap: usize,
}

impl CorpusIndex {
    pub fn open_or_create(cfg: &IndexConfig) -> Result<Self> {
        let path = Path::new(&cfg.path);
        std::fs::create_dir_all(path)?;
        let directory = MmapDirectory::open(path)
            .map_err(|e| EngineError::IndexWrite(TantivyError::from(e)))?;
        let index =
            Index::open_or_create(directory, build_schema()).map_err(EngineError::IndexWrite)?;
        info!(path = %path.display(), "opened index");
        Self::from_index(index, cfg)
    }

    /// A RAM-backed index; nothing survives the process.
    pub fn in_memory(cfg: &IndexConfig) -> Result<Self> {
        Self::from_index(Index::create_in_ram(build_schema()), cfg)
    }

    fn from_index(index: Index, cfg: &IndexConfig) -> Result<Self> {
        register_tokenizers(&index, &cfg.language)?;
        let fields = CorpusFields::from_schema(&index.schema())?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(EngineError::IndexRead)?;
        let (writer_threads, writer_heap) = writer_budget(cfg);
        Ok(Self {
            index,
            reader,
            fields,
            writer_threads,
            writer_heap,
        })
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn fields(&self) -> CorpusFields {
        self.fields
    }

    /// Snapshot of the last committed state.
    pub fn searcher(&self) -> Searcher {
        self.reader.searcher()
    }

    pub fn num_docs(&self) -> u64 {
        self.searcher().num_docs()
    }

    /// Opens the single writer session. Fails while another writer holds
    /// the index lock.
    pub fn begin_batch(&self) -> Result<BatchWriter<'_>> {
        let writer: IndexWriter = self
            .index
            .writer_with_num_threads(self.writer_threads, self.writer_heap)
            .map_err(EngineError::IndexWrite)?;
        debug!(
            threads = self.writer_threads,
            heap = self.writer_heap,
            "index writer opened"
        );
        Ok(BatchWriter {
            index: self,
            writer,
            staged: Vec::new(),
        })
    }

    /// Removes every document and commits the empty state.
    pub fn clear(&self) -> Result<()> {
        let batch = self.begin_batch()?;
        batch
            .writer
            .delete_all_documents()
            .map_err(EngineError::IndexWrite)?;
        batch.commit()?;
        info!("index cleared");
        Ok(())
    }

    /// Deletes the documents stored under `paths` and commits.
    pub fn remove(&self, paths: &[String]) -> Result<()> {
        let batch = self.begin_batch()?;
        for path in paths {
            batch
                .writer
                .delete_term(Term::from_field_text(self.fields.path, path));
        }
        batch.commit()?;
        Ok(())
    }

    fn reload(&self) -> Result<()> {
        self.reader.reload().map_err(EngineError::IndexRead)
    }
}

/// Staged documents become visible together on [`BatchWriter::commit`];
/// [`BatchWriter::cancel`] (or dropping the session) discards all of them.
pub struct BatchWriter<'a> {
    index: &'a CorpusIndex,
    writer: IndexWriter,
    staged: Vec<String>,
}

impl BatchWriter<'_> {
    /// Stages `document`, replacing any committed document with the same path.
    pub fn stage(&mut self, document: &Document) -> Result<()> {
        let fields = self.index.fields;
        let categories = serde_json::to_string(&document.categories).map_err(|e| {
            EngineError::IndexWrite(TantivyError::InvalidArgument(e.to_string()))
        })?;
        self.writer
            .delete_term(Term::from_field_text(fields.path, &document.path));
        self.writer
            .add_document(doc!(
                fields.title => document.title.as_str(),
                fields.path => document.path.as_str(),
                fields.content => document.content.as_str(),
                fields.tags => document.tags_field(),
                fields.categories => categories
            ))
            .map_err(EngineError::IndexWrite)?;
        debug!(path = %document.path, tags = document.tags.len(), "staged document");
        self.staged.push(document.path.clone());
        Ok(())
    }

    /// Commits every staged document atomically and refreshes readers.
    /// Returns the committed paths.
    pub fn commit(mut self) -> Result<Vec<String>> {
        if let Err(e) = self.writer.commit() {
            warn!(error = %e, "commit failed, rolling back");
            if let Err(rollback) = self.writer.rollback() {
                warn!(error = %rollback, "rollback after failed commit also failed");
            }
            return Err(EngineError::IndexWrite(e));
        }
        self.index.reload()?;
        info!(documents = self.staged.len(), "index commit");
        Ok(std::mem::take(&mut self.staged))
    }

    pub fn cancel(mut self) -> Result<()> {
        self.writer.rollback().map_err(EngineError::IndexWrite)?;
        info!(documents = self.staged.len(), "index batch cancelled");
        Ok(())
    }
}

fn writer_budget(cfg: &IndexConfig) -> (usize, usize) {
    let heap = (cfg.writer_heap_mb * 1024 * 1024).max(MIN_HEAP_PER_THREAD);
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let threads = cfg
        .writer_threads
        .unwrap_or(cores)
        .min(heap / MIN_HEAP_PER_THREAD)
        .max(1);
    (threads, heap)
}
