use async_trait::async_trait;
use corpus_core::classifier::Classifier;
use corpus_core::config::{ExtractionConfig, IndexConfig};
use corpus_core::extractor::PlainTextExtractor;
use corpus_core::indexer::CorpusIndex;
use corpus_core::models::Document;
use corpus_core::vocabulary::Vocabulary;
use corpus_core::{Engine, EngineError, SearchMode, SearchRequest};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use storage::{Ledger, LedgerEntry, LedgerError, SqliteLedger};
use tempfile::TempDir;

fn vocabulary() -> Arc<Vocabulary> {
    let tag_keywords = BTreeMap::from([
        (
            "hidrografia".to_string(),
            vec!["agua".to_string(), "rio".to_string()],
        ),
        ("saneamento".to_string(), vec!["esgoto".to_string()]),
        ("municipal".to_string(), vec!["município".to_string()]),
    ]);
    let tag_category = BTreeMap::from([
        ("hidrografia".to_string(), "tema".to_string()),
        ("saneamento".to_string(), "tema".to_string()),
        ("municipal".to_string(), "scale".to_string()),
    ]);
    let thresholds = BTreeMap::from([("tema".to_string(), 0.0), ("scale".to_string(), 0.15)]);
    Arc::new(Vocabulary::new(tag_keywords, tag_category, thresholds).unwrap())
}

fn index_config() -> IndexConfig {
    let mut cfg = IndexConfig::new("");
    cfg.writer_heap_mb = 32;
    cfg.writer_threads = Some(1);
    cfg
}

struct Fixture {
    dir: TempDir,
    ledger: Arc<SqliteLedger>,
}

impl Fixture {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let url = dir.path().join("ledger.db");
        let ledger = SqliteLedger::open(url.to_str().unwrap()).await.unwrap();
        std::fs::create_dir_all(dir.path().join("docs")).unwrap();
        std::fs::create_dir_all(dir.path().join("incoming")).unwrap();
        Self {
            dir,
            ledger: Arc::new(ledger),
        }
    }

    fn extraction(&self) -> ExtractionConfig {
        ExtractionConfig {
            documents_dir: self.dir.path().join("docs").to_string_lossy().into_owned(),
            min_words: 0,
            exclude: Vec::new(),
        }
    }

    fn engine_with(&self, ledger: Arc<dyn Ledger>) -> Engine {
        Engine::new(
            Arc::new(Classifier::new(vocabulary()).unwrap()),
            CorpusIndex::in_memory(&index_config()).unwrap(),
            ledger,
            Arc::new(PlainTextExtractor),
            self.extraction(),
        )
    }

    fn engine(&self) -> Engine {
        self.engine_with(self.ledger.clone())
    }

    fn incoming(&self) -> std::path::PathBuf {
        self.dir.path().join("incoming")
    }

    /// Drops a source file into the ingestion folder.
    fn source(&self, name: &str, text: &str) {
        std::fs::write(self.incoming().join(name), text).unwrap();
    }

    /// Registers an already extracted text file, bypassing ingestion.
    async fn extracted(&self, name: &str, bytes: impl AsRef<[u8]>) {
        let txt = self.dir.path().join("docs").join(format!("{name}.txt"));
        std::fs::write(&txt, bytes.as_ref()).unwrap();
        let pdf = self.incoming().join(name);
        self.ledger
            .register(&[LedgerEntry::extracted(
                name,
                pdf.to_string_lossy(),
                txt.to_string_lossy(),
            )])
            .await
            .unwrap();
    }
}

fn titles(engine: &Engine, request: &SearchRequest, mode: SearchMode) -> Vec<String> {
    engine
        .search(request, mode)
        .unwrap()
        .results
        .into_iter()
        .map(|hit| hit.title)
        .collect()
}

#[tokio::test]
async fn indexes_keyword_occurrences_end_to_end() {
    let fx = Fixture::new().await;
    fx.source("relatorio.pdf", "Água, água e mais ÁGUA.");
    let engine = fx.engine();

    let summary = engine
        .add_documents(Some(fx.incoming().as_path()), false)
        .await
        .unwrap();
    assert_eq!(summary.extracted, 1);
    assert_eq!(summary.indexed, 1);

    let response = engine
        .search(&SearchRequest::terms(["agua"]), SearchMode::Term)
        .unwrap();
    assert_eq!(response.results.len(), 1);
    let hit = &response.results[0];
    assert_eq!(hit.title, "relatorio.pdf");
    assert_eq!(hit.occurrences.get("agua"), Some(&3));
    assert_eq!(hit.score, 3);
    assert_eq!(
        hit.categories.get("tema"),
        Some(&vec![("hidrografia".to_string(), 3)])
    );

    let entry = engine.lookup("relatorio.pdf").await.unwrap().unwrap();
    assert!(entry.indexed);
}

#[tokio::test]
async fn stored_tags_are_frequency_weighted() {
    let fx = Fixture::new().await;
    fx.extracted("a.pdf", "agua agua agua").await;
    let engine = fx.engine();
    engine.add_documents(None, false).await.unwrap();

    let entry = fx.ledger.get("a.pdf").await.unwrap().unwrap();
    let document: Document =
        corpus_core::pipeline::prepare_document(engine.classifier(), &entry).unwrap();
    assert_eq!(document.tags, vec!["hidrografia"; 3]);
}

#[tokio::test]
async fn term_search_is_conjunctive_and_sorted_by_score() {
    let fx = Fixture::new().await;
    fx.extracted("a.pdf", "rio esgoto").await;
    fx.extracted("b.pdf", "rio esgoto esgoto esgoto").await;
    fx.extracted("c.pdf", "rio somente").await;
    let engine = fx.engine();
    engine.add_documents(None, false).await.unwrap();

    let found = titles(
        &engine,
        &SearchRequest::terms(["rio", "esgoto"]),
        SearchMode::Term,
    );
    assert_eq!(found, vec!["b.pdf".to_string(), "a.pdf".to_string()]);
}

#[tokio::test]
async fn term_search_rejects_candidates_failing_the_exact_phrase() {
    let fx = Fixture::new().await;
    // "da" and "de" are stop words, so the index admits both documents.
    fx.extracted("a.pdf", "rio da janeiro").await;
    fx.extracted("b.pdf", "rio de janeiro").await;
    let engine = fx.engine();
    engine.add_documents(None, false).await.unwrap();

    let found = titles(
        &engine,
        &SearchRequest::terms(["rio de janeiro"]),
        SearchMode::Term,
    );
    assert_eq!(found, vec!["b.pdf"]);
}

#[tokio::test]
async fn advanced_search_validates_and_and_not_terms() {
    let fx = Fixture::new().await;
    fx.extracted("both.pdf", "agua e esgoto").await;
    fx.extracted("or_only.pdf", "esgoto tratado").await;
    fx.extracted("excluded.pdf", "agua poluida com lixo").await;
    let engine = fx.engine();
    engine.add_documents(None, false).await.unwrap();

    let request = SearchRequest::advanced(
        vec!["agua".to_string()],
        vec!["esgoto".to_string()],
        vec!["lixo".to_string()],
    );
    let response = engine.search(&request, SearchMode::Advanced).unwrap();
    let found: Vec<&str> = response.results.iter().map(|h| h.title.as_str()).collect();
    assert_eq!(found, vec!["both.pdf"]);
    let hit = &response.results[0];
    assert_eq!(hit.occurrences.get("esgoto"), Some(&1));
    assert_eq!(hit.occurrences.get("lixo"), Some(&0));
    assert_eq!(hit.score, 2);
}

#[tokio::test]
async fn advanced_search_requires_every_clause() {
    let fx = Fixture::new().await;
    let engine = fx.engine();
    let request = SearchRequest::terms(["agua"]);
    assert!(matches!(
        engine.search(&request, SearchMode::Advanced),
        Err(EngineError::QueryParse(_))
    ));
}

#[tokio::test]
async fn tag_search_matches_exact_tags() {
    let fx = Fixture::new().await;
    fx.extracted("a.pdf", "o rio corre").await;
    fx.extracted("b.pdf", "rede de esgoto").await;
    let engine = fx.engine();
    engine.add_documents(None, false).await.unwrap();

    assert_eq!(
        titles(&engine, &SearchRequest::tag("Hidrografia"), SearchMode::Tag),
        vec!["a.pdf".to_string()]
    );
    assert!(titles(&engine, &SearchRequest::tag("hidro"), SearchMode::Tag).is_empty());
}

#[tokio::test]
async fn second_add_without_new_files_writes_nothing() {
    let fx = Fixture::new().await;
    fx.source("a.pdf", "agua");
    let engine = fx.engine();
    engine
        .add_documents(Some(fx.incoming().as_path()), false)
        .await
        .unwrap();
    let before = engine.index().searcher().segment_readers().len();

    let summary = engine
        .add_documents(Some(fx.incoming().as_path()), false)
        .await
        .unwrap();
    assert_eq!(summary.extracted, 0);
    assert_eq!(summary.indexed, 0);
    assert_eq!(engine.index().num_docs(), 1);
    assert_eq!(engine.index().searcher().segment_readers().len(), before);
}

#[tokio::test]
async fn failing_document_cancels_the_whole_batch() {
    let fx = Fixture::new().await;
    fx.extracted("1.pdf", b"agua").await;
    fx.extracted("2.pdf", b"rio").await;
    fx.extracted("3.pdf", [0x61, 0xff, 0xfe, 0x61]).await;
    fx.extracted("4.pdf", b"esgoto").await;
    fx.extracted("5.pdf", b"agua rio").await;
    let engine = fx.engine();

    let err = engine.add_documents(None, false).await.unwrap_err();
    assert!(matches!(err, EngineError::Normalization { .. }));
    assert_eq!(engine.index().num_docs(), 0);
    assert_eq!(fx.ledger.unindexed().await.unwrap().len(), 5);
}

#[tokio::test]
async fn create_reindexes_every_extracted_document() {
    let fx = Fixture::new().await;
    fx.extracted("a.pdf", "agua").await;
    fx.extracted("b.pdf", "rio").await;
    let engine = fx.engine();
    engine.add_documents(None, false).await.unwrap();
    assert!(fx.ledger.unindexed().await.unwrap().is_empty());

    let summary = engine.create_searchable_data().await.unwrap();
    assert_eq!(summary.indexed, 2);
    assert_eq!(engine.index().num_docs(), 2);
    assert!(fx.ledger.unindexed().await.unwrap().is_empty());
}

struct FailingMarks(SqliteLedger);

#[async_trait]
impl Ledger for FailingMarks {
    async fn get(&self, name: &str) -> storage::Result<Option<LedgerEntry>> {
        self.0.get(name).await
    }

    async fn unindexed(&self) -> storage::Result<Vec<LedgerEntry>> {
        self.0.unindexed().await
    }

    async fn known_pdf_paths(&self) -> storage::Result<HashSet<String>> {
        self.0.known_pdf_paths().await
    }

    async fn register(&self, entries: &[LedgerEntry]) -> storage::Result<()> {
        self.0.register(entries).await
    }

    async fn mark_indexed(&self, _names: &[String]) -> storage::Result<()> {
        Err(LedgerError::Unavailable("disk full".to_string()))
    }

    async fn reset_indexed(&self) -> storage::Result<u64> {
        self.0.reset_indexed().await
    }
}

#[tokio::test]
async fn ledger_failure_reverts_the_index_commit() {
    let fx = Fixture::new().await;
    fx.extracted("a.pdf", "agua").await;
    let engine = fx.engine_with(Arc::new(FailingMarks(fx.ledger.as_ref().clone())));

    let err = engine.add_documents(None, false).await.unwrap_err();
    assert!(matches!(err, EngineError::Ledger(_)));
    assert_eq!(engine.index().num_docs(), 0);
    assert_eq!(fx.ledger.unindexed().await.unwrap().len(), 1);
}

#[tokio::test]
async fn searches_see_only_committed_documents() {
    let fx = Fixture::new().await;
    fx.extracted("a.pdf", "agua").await;
    let engine = fx.engine();
    engine.add_documents(None, false).await.unwrap();

    let mut batch = engine.index().begin_batch().unwrap();
    batch
        .stage(&Document {
            title: "b".to_string(),
            path: "b.pdf".to_string(),
            content: " agua agua ".to_string(),
            tags: Vec::new(),
            categories: BTreeMap::new(),
        })
        .unwrap();
    let request = SearchRequest::terms(["agua"]);
    assert_eq!(titles(&engine, &request, SearchMode::Term), vec!["a.pdf"]);

    batch.commit().unwrap();
    assert_eq!(titles(&engine, &request, SearchMode::Term).len(), 2);
}

#[test]
fn unreadable_document_is_a_read_error() {
    let classifier = Classifier::new(vocabulary()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let entry = LedgerEntry::extracted("x.pdf", "x.pdf", dir.path().to_string_lossy());
    assert!(matches!(
        corpus_core::pipeline::prepare_document(&classifier, &entry),
        Err(EngineError::DocumentRead { .. })
    ));
}
