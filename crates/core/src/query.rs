//! Structured search requests and their translation into index queries.
//!
//! The index query is only a candidate filter. Exact AND/NOT semantics are
//! enforced afterwards against stored content (see `search`).

use crate::error::{EngineError, Result};
use crate::normalize::normalize;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(rename = "AND", default, skip_serializing_if = "Option::is_none")]
    pub and: Option<Vec<String>>,
    #[serde(rename = "OR", default, skip_serializing_if = "Option::is_none")]
    pub or: Option<Vec<String>>,
    #[serde(rename = "NOT", default, skip_serializing_if = "Option::is_none")]
    pub not: Option<Vec<String>>,
    #[serde(rename = "TAG", default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<Vec<String>>,
}

impl SearchRequest {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| EngineError::QueryParse(e.to_string()))
    }

    pub fn terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            and: Some(terms.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(vec![tag.into()]),
            ..Self::default()
        }
    }

    pub fn advanced(and: Vec<String>, or: Vec<String>, not: Vec<String>) -> Self {
        Self {
            and: Some(and),
            or: Some(or),
            not: Some(not),
            tag: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// `AND` terms, all required.
    Term,
    /// A single exact tag.
    Tag,
    /// `AND` + `OR` + `NOT`.
    Advanced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexQuery {
    /// Query-language expression over the `content` field.
    Content(String),
    /// Exact, lower-cased term of the `tags` field.
    Tag(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPlan {
    pub mode: SearchMode,
    pub query: IndexQuery,
    /// `(as requested, normalized)` pairs counted in every hit.
    pub scan_terms: Vec<(String, String)>,
    /// Normalized terms every hit must contain.
    pub required: Vec<String>,
    /// Normalized terms no hit may contain.
    pub excluded: Vec<String>,
}

pub fn build_plan(request: &SearchRequest, mode: SearchMode) -> Result<SearchPlan> {
    match mode {
        SearchMode::Term => {
            let and = terms_of(clause(&request.and, "AND")?);
            let expression = phrase_expression(&and, " AND ")?;
            Ok(SearchPlan {
                mode,
                query: IndexQuery::Content(expression),
                required: normalized(&and),
                scan_terms: and,
                excluded: Vec::new(),
            })
        }
        SearchMode::Tag => {
            let tag = clause(&request.tag, "TAG")?
                .first()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .ok_or_else(|| EngineError::QueryParse("TAG needs a value".to_string()))?;
            Ok(SearchPlan {
                mode,
                query: IndexQuery::Tag(tag.to_lowercase()),
                scan_terms: vec![(tag.to_string(), normalize(tag))],
                required: Vec::new(),
                excluded: Vec::new(),
            })
        }
        SearchMode::Advanced => {
            let and = terms_of(clause(&request.and, "AND")?);
            let or = terms_of(clause(&request.or, "OR")?);
            let not = terms_of(clause(&request.not, "NOT")?);
            let mut all = and.clone();
            all.extend(or);
            all.extend(not.iter().cloned());
            let expression = phrase_expression(&all, " OR ")?;
            Ok(SearchPlan {
                mode,
                query: IndexQuery::Content(expression),
                scan_terms: all,
                required: normalized(&and),
                excluded: normalized(&not),
            })
        }
    }
}

fn clause<'a>(values: &'a Option<Vec<String>>, key: &str) -> Result<&'a [String]> {
    values
        .as_deref()
        .ok_or_else(|| EngineError::QueryParse(format!("missing '{key}' clause")))
}

/// Pairs each term with its normalized form, dropping terms with nothing
/// searchable left.
fn terms_of(values: &[String]) -> Vec<(String, String)> {
    values
        .iter()
        .map(|raw| (raw.clone(), normalize(raw)))
        .filter(|(_, norm)| !phrase_text(norm).is_empty())
        .collect()
}

fn normalized(terms: &[(String, String)]) -> Vec<String> {
    terms.iter().map(|(_, norm)| norm.clone()).collect()
}

fn phrase_expression(terms: &[(String, String)], joiner: &str) -> Result<String> {
    if terms.is_empty() {
        return Err(EngineError::QueryParse("no searchable terms".to_string()));
    }
    Ok(terms
        .iter()
        .map(|(_, norm)| format!("\"{}\"", phrase_text(norm)))
        .collect::<Vec<_>>()
        .join(joiner))
}

/// Quotes and backslashes cannot appear inside a quoted phrase.
fn phrase_text(normalized: &str) -> String {
    normalized
        .replace(['"', '\\'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
