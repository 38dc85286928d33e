//! Datasets and the retrieval boundary.
//!
//! The built-in datasets are small fixed corpora standing in for a search
//! backend. Anything implementing [`Retriever`] can replace them.

pub mod upload;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{AppMode, RetrievalResult, Source};

pub use upload::dataset_from_paths;

/// Query in, ranked snippets out.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<RetrievalResult>>;
}

/// In-memory retriever doing case-insensitive substring matching on snippets.
#[derive(Debug, Clone, Default)]
pub struct DatasetRetriever {
    records: Vec<RetrievalResult>,
}

impl DatasetRetriever {
    pub fn new(records: Vec<RetrievalResult>) -> Self {
        Self { records }
    }

    /// Retriever over the built-in support tickets.
    pub fn support_tickets() -> Self {
        Self::new(support_tickets())
    }
}

#[async_trait]
impl Retriever for DatasetRetriever {
    async fn search(&self, query: &str) -> Result<Vec<RetrievalResult>> {
        let needle = query.to_lowercase();
        let mut hits: Vec<RetrievalResult> = self
            .records
            .iter()
            .filter(|r| r.content_snippet.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        tracing::debug!(query, hits = hits.len(), "dataset search");
        Ok(hits)
    }
}

/// One sales figure for a region and period.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SalesRecord {
    pub region: String,
    pub sales: u64,
    /// Reporting period, e.g. `Q3 2023`.
    pub date: String,
}

/// Sales figures looked up by region.
#[derive(Debug, Clone)]
pub struct SalesLedger {
    records: Vec<SalesRecord>,
}

impl SalesLedger {
    pub fn new(records: Vec<SalesRecord>) -> Self {
        Self { records }
    }

    /// Records for `region` (case-insensitive), or all records when `None`.
    pub fn lookup(&self, region: Option<&str>) -> Vec<SalesRecord> {
        match region {
            None => self.records.clone(),
            Some(region) => self
                .records
                .iter()
                .filter(|r| r.region.eq_ignore_ascii_case(region))
                .cloned()
                .collect(),
        }
    }
}

impl Default for SalesLedger {
    fn default() -> Self {
        Self::new(sales_data())
    }
}

pub fn support_tickets() -> Vec<RetrievalResult> {
    vec![
        RetrievalResult::new(
            Source::new("Login Issue EMEA", "Ticket #48151"),
            "User: I'm unable to log in from Germany. I keep getting an \"Invalid Credentials\" error. Region: EMEA",
            0.92,
        ),
        RetrievalResult::new(
            Source::new("Billing Discrepancy NA", "Ticket #62342"),
            "User: Hi, I was charged twice for my subscription this month in the US. My account ID is user-123. Region: NA",
            0.89,
        ),
        RetrievalResult::new(
            Source::new("Login Issue APAC", "Ticket #55198"),
            "User: My team in Japan is reporting login issues. Seems to be widespread. Region: APAC",
            0.95,
        ),
    ]
}

pub fn sales_data() -> Vec<SalesRecord> {
    [("NA", 1_250_000), ("EMEA", 750_000), ("APAC", 700_000)]
        .into_iter()
        .map(|(region, sales)| SalesRecord {
            region: region.to_string(),
            sales,
            date: "Q3 2023".to_string(),
        })
        .collect()
}

/// The corpus a non-agentic mode answers from.
///
/// The agent mode has no single dataset: it reaches data through tools.
pub fn dataset_for_mode(mode: AppMode, custom: Option<&[RetrievalResult]>) -> Vec<RetrievalResult> {
    match mode {
        AppMode::Support => support_tickets(),
        AppMode::Custom => custom.map(<[_]>::to_vec).unwrap_or_default(),
        AppMode::BusinessAgent
        | AppMode::Codebase
        | AppMode::Research
        | AppMode::WebSearch
        | AppMode::GoogleDrive => Vec::new(),
    }
}

/// Case-insensitive match against `fileName + ' ' + snippet`.
pub fn search_documents(
    query: &str,
    mode: AppMode,
    custom: Option<&[RetrievalResult]>,
) -> Vec<RetrievalResult> {
    let needle = query.to_lowercase();
    dataset_for_mode(mode, custom)
        .into_iter()
        .filter(|doc| {
            format!("{} {}", doc.source.file_name, doc.content_snippet)
                .to_lowercase()
                .contains(&needle)
        })
        .collect()
}

/// Unique sources of a mode's dataset, in first-seen order.
pub fn list_files(mode: AppMode, custom: Option<&[RetrievalResult]>) -> Vec<Source> {
    let mut seen = HashSet::new();
    dataset_for_mode(mode, custom)
        .into_iter()
        .filter(|doc| seen.insert(format!("{}/{}", doc.source.path, doc.source.file_name)))
        .map(|doc| doc.source)
        .collect()
}

/// Full (trimmed) content for a source, if the mode's dataset holds it.
pub fn file_content(
    source: &Source,
    mode: AppMode,
    custom: Option<&[RetrievalResult]>,
) -> Option<String> {
    dataset_for_mode(mode, custom)
        .into_iter()
        .find(|doc| doc.source == *source)
        .map(|doc| doc.content_snippet.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ticket_search_is_case_insensitive_and_ranked() {
        let retriever = DatasetRetriever::support_tickets();
        let hits = retriever.search("REGION").await.unwrap();
        let paths: Vec<_> = hits.iter().map(|h| h.source.path.as_str()).collect();
        assert_eq!(paths, vec!["Ticket #55198", "Ticket #48151", "Ticket #62342"]);

        // "log in" is not "login"
        let hits = retriever.search("LOGIN").await.unwrap();
        let paths: Vec<_> = hits.iter().map(|h| h.source.path.as_str()).collect();
        assert_eq!(paths, vec!["Ticket #55198"]);
    }

    #[test]
    fn sales_lookup_filters_by_region() {
        let ledger = SalesLedger::default();
        assert_eq!(ledger.lookup(None).len(), 3);
        let emea = ledger.lookup(Some("emea"));
        assert_eq!(emea.len(), 1);
        assert_eq!(emea[0].sales, 750_000);
        assert!(ledger.lookup(Some("LATAM")).is_empty());
    }

    #[test]
    fn documents_match_on_file_name_too() {
        let hits = search_documents("billing discrepancy", AppMode::Support, None);
        assert_eq!(hits.len(), 1);
        assert!(search_documents("anything", AppMode::Codebase, None).is_empty());
    }

    #[test]
    fn list_files_deduplicates_sources() {
        let doc = RetrievalResult::new(Source::new("a.txt", "docs/a.txt"), "x", 1.0);
        let custom = vec![doc.clone(), doc];
        assert_eq!(list_files(AppMode::Custom, Some(&custom)).len(), 1);
    }

    #[test]
    fn file_content_is_trimmed() {
        let custom = vec![RetrievalResult::new(Source::new("a.txt", "a.txt"), "  body \n", 1.0)];
        let content = file_content(&Source::new("a.txt", "a.txt"), AppMode::Custom, Some(&custom));
        assert_eq!(content.as_deref(), Some("body"));
        assert!(file_content(&Source::new("b", "b"), AppMode::Custom, Some(&custom)).is_none());
    }
}
