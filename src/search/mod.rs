//! Search engine: query parsing, index lookup, and snippet generation.

pub mod query;
pub mod snippet;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::Result;
use crate::index::SearchIndex;
use crate::metrics::IndexMetrics;
use crate::model::document::EmailDocument;

use self::query::{parse_query, SearchQuery};
use self::snippet::SnippetGenerator;

/// One document in a result page.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchResult {
    pub document: EmailDocument,
    /// Body excerpt around the first matched term.
    pub snippet: Option<String>,
    /// Relevance score (higher is better) when content terms were given.
    pub score: Option<f64>,
}

/// A page of results plus the total number of matches.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchResultSet {
    /// The query that produced this page.
    pub query: SearchQuery,
    pub results: Vec<SearchResult>,
    /// Every matching document, independent of `take`.
    pub total_count: u64,
    pub skip: usize,
    pub take: usize,
    pub elapsed: Duration,
}

impl SearchResultSet {
    /// Whether documents exist beyond this page.
    pub fn has_more(&self) -> bool {
        (self.skip as u64).saturating_add(self.results.len() as u64) < self.total_count
    }
}

/// High-level search over a [`SearchIndex`].
pub struct SearchEngine<'a> {
    index: &'a SearchIndex,
    snippets: SnippetGenerator,
    metrics: Arc<IndexMetrics>,
}

impl<'a> SearchEngine<'a> {
    pub fn new(index: &'a SearchIndex, snippets: SnippetGenerator, metrics: Arc<IndexMetrics>) -> Self {
        Self {
            index,
            snippets,
            metrics,
        }
    }

    /// Parse `input` and run it with the given page size.
    pub fn search(&self, input: &str, take: usize) -> Result<SearchResultSet> {
        let query = parse_query(input);
        let query = SearchQuery { take, ..query };
        self.execute(&query)
    }

    /// Run a structured query: one page of results plus the full match count.
    pub fn execute(&self, query: &SearchQuery) -> Result<SearchResultSet> {
        let start = Instant::now();

        let hits = self.index.query(query)?;
        let total_count = self.index.total_count(query)?;

        let terms = query.content_terms.as_deref();
        let results: Vec<SearchResult> = hits
            .into_iter()
            .map(|hit| SearchResult {
                snippet: self.snippets.generate(hit.document.snippet_source(), terms),
                score: hit.score,
                document: hit.document,
            })
            .collect();

        let elapsed = start.elapsed();
        self.metrics.record_search(elapsed);
        debug!(
            returned = results.len(),
            total = total_count,
            elapsed_ms = elapsed.as_millis() as u64,
            "Search executed"
        );

        Ok(SearchResultSet {
            query: query.clone(),
            results,
            total_count,
            skip: query.skip,
            take: query.take,
            elapsed,
        })
    }
}
