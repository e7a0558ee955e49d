//! Two-stage query execution: index retrieval narrows candidates, then an
//! exact scan of stored content validates and scores each one.

use crate::error::{EngineError, Result};
use crate::indexer::CorpusIndex;
use crate::models::{CategoryTags, SearchHit, SearchResponse};
use crate::query::{IndexQuery, SearchMode, SearchPlan};
use std::collections::BTreeMap;
use tantivy::collector::TopDocs;
use tantivy::query::{Query, QueryParser, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::Term;
use tracing::{debug, warn};

/// A stored document returned by the index stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub title: String,
    pub path: String,
    pub content: String,
    pub categories: CategoryTags,
}

pub fn execute(index: &CorpusIndex, plan: &SearchPlan) -> Result<SearchResponse> {
    let candidates = retrieve_candidates(index, &plan.query)?;
    let retrieved = candidates.len();
    let mut results: Vec<SearchHit> = candidates
        .into_iter()
        .filter(|c| is_valid_hit(plan, &c.content))
        .map(|c| {
            let (occurrences, score) = count_occurrences(plan, &c.content);
            SearchHit {
                title: c.title,
                path: c.path,
                occurrences,
                categories: c.categories,
                score,
            }
        })
        .collect();
    // Tag hits keep the index's own order.
    if plan.mode != SearchMode::Tag {
        results.sort_by(|a, b| b.score.cmp(&a.score));
    }
    debug!(
        mode = ?plan.mode,
        retrieved,
        returned = results.len(),
        "search executed"
    );
    Ok(SearchResponse { results })
}

/// Runs the index query against the last committed snapshot, returning
/// every match in the index's retrieval order.
pub fn retrieve_candidates(index: &CorpusIndex, query: &IndexQuery) -> Result<Vec<Candidate>> {
    let fields = index.fields();
    let query: Box<dyn Query> = match query {
        IndexQuery::Content(expression) => {
            let parser = QueryParser::for_index(index.index(), vec![fields.content]);
            parser
                .parse_query(expression)
                .map_err(|e| EngineError::QueryParse(e.to_string()))?
        }
        IndexQuery::Tag(tag) => Box::new(TermQuery::new(
            Term::from_field_text(fields.tags, tag),
            IndexRecordOption::WithFreqs,
        )),
    };

    let searcher = index.searcher();
    let limit = (searcher.num_docs() as usize).max(1);
    let top_docs = searcher
        .search(&*query, &TopDocs::with_limit(limit))
        .map_err(EngineError::IndexRead)?;

    let mut candidates = Vec::with_capacity(top_docs.len());
    for (_score, addr) in top_docs {
        let doc: tantivy::Document = searcher.doc(addr).map_err(EngineError::IndexRead)?;
        let text = |field| {
            doc.get_first(field)
                .and_then(|v| v.as_text())
                .unwrap_or_default()
                .to_string()
        };
        let path = text(fields.path);
        let categories = parse_categories(&path, &text(fields.categories));
        candidates.push(Candidate {
            title: text(fields.title),
            path,
            content: text(fields.content),
            categories,
        });
    }
    Ok(candidates)
}

/// Decodes the stored categories blob. A corrupt blob yields no categories.
fn parse_categories(path: &str, raw: &str) -> CategoryTags {
    match serde_json::from_str(raw) {
        Ok(categories) => categories,
        Err(e) => {
            warn!(path, error = %e, "stored categories are not valid JSON");
            CategoryTags::new()
        }
    }
}

/// Exact containment check on stored content: every required term present,
/// no excluded term present.
pub fn is_valid_hit(plan: &SearchPlan, content: &str) -> bool {
    plan.required.iter().all(|t| content.contains(t.as_str()))
        && !plan.excluded.iter().any(|t| content.contains(t.as_str()))
}

/// Literal, non-overlapping occurrences of each scanned term. The score is
/// the sum over all terms.
pub fn count_occurrences(plan: &SearchPlan, content: &str) -> (BTreeMap<String, usize>, usize) {
    let mut occurrences = BTreeMap::new();
    let mut score = 0;
    for (raw, norm) in &plan.scan_terms {
        let count = content.matches(norm.as_str()).count();
        occurrences.insert(raw.clone(), count);
        score += count;
    }
    (occurrences, score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{build_plan, SearchRequest};

    #[test]
    fn term_validity_requires_every_and_term() {
        let plan = build_plan(&SearchRequest::terms(["rio", "lago"]), SearchMode::Term).unwrap();
        assert!(is_valid_hit(&plan, " o rio e o lago "));
        assert!(!is_valid_hit(&plan, " o rio e o mar "));
    }

    #[test]
    fn advanced_validity_enforces_and_and_not() {
        let request = SearchRequest::advanced(
            vec!["rio".into()],
            vec!["lago".into()],
            vec!["mar".into()],
        );
        let plan = build_plan(&request, SearchMode::Advanced).unwrap();
        assert!(is_valid_hit(&plan, " rio e lago "));
        assert!(!is_valid_hit(&plan, " apenas lago "));
        assert!(!is_valid_hit(&plan, " rio e mar "));
    }

    #[test]
    fn occurrences_are_counted_per_requested_term() {
        let plan = build_plan(&SearchRequest::terms(["Água", "rio"]), SearchMode::Term).unwrap();
        let (occurrences, score) = count_occurrences(&plan, " agua, agua e rio; agua ");
        assert_eq!(occurrences["Água"], 3);
        assert_eq!(occurrences["rio"], 1);
        assert_eq!(score, 4);
    }

    #[test]
    fn corrupt_categories_blob_decodes_to_empty() {
        assert!(parse_categories("a.pdf", "{not json").is_empty());
        let parsed = parse_categories("a.pdf", r#"{"tema": [["hidrografia", 2]]}"#);
        assert_eq!(parsed["tema"], vec![("hidrografia".to_string(), 2)]);
    }
}
