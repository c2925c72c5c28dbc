use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::error::Result;
use crate::core::store::BreachStore;
use crate::core::types::{CredentialRecord, Deadline, StoredRecord};
use crate::query::predicate::Predicate;
use crate::query::types::{
    Pagination, SearchRequest, SearchResponse, SourceAggregations, SourceBucket,
};

// Row interval between deadline checks inside a part scan.
const DEADLINE_STRIDE: usize = 4096;

/// Multi-field search over the credential table.
///
/// One call produces the result page, the total count, and the top-source
/// facet, all under a single predicate. The three sub-reads run
/// concurrently over independently acquired snapshots, so a write landing
/// mid-flight may appear in one and not another; that best-effort
/// consistency is the documented contract of this read path.
///
/// The engine never surfaces an error: any failure or expired deadline is
/// logged and collapses to the empty response, so a dashboard page load
/// degrades to "no results" instead of crashing.
pub struct QueryEngine {
    store: Arc<BreachStore>,
}

impl QueryEngine {
    pub fn new(store: Arc<BreachStore>) -> Self {
        QueryEngine { store }
    }

    pub fn search(&self, request: &SearchRequest) -> SearchResponse {
        let page = request.page.max(1);
        let limit = request.limit.clamp(1, self.store.config().max_page_size);

        match self.search_inner(request, page, limit) {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(error = %err, term = %request.term, "search failed, returning empty result");
                SearchResponse::empty(page)
            }
        }
    }

    fn search_inner(&self, request: &SearchRequest, page: u32, limit: u32) -> Result<SearchResponse> {
        let predicate = Predicate::from_request(request);
        let budget = self.store.config().read_deadline;

        let (page_result, (count_result, sources_result)) = rayon::join(
            || self.collect_page(&predicate, page, limit, Deadline::new(budget)),
            || {
                rayon::join(
                    || self.count_matches(&predicate, Deadline::new(budget)),
                    || self.aggregate_sources(&predicate, Deadline::new(budget)),
                )
            },
        );

        let results = page_result?;
        let total = count_result?;
        let aggregations = sources_result?;

        Ok(SearchResponse {
            results,
            pagination: Pagination::new(total, limit, page),
            aggregations,
        })
    }

    fn collect_page(
        &self,
        predicate: &Predicate,
        page: u32,
        limit: u32,
        deadline: Deadline,
    ) -> Result<Vec<CredentialRecord>> {
        deadline.check()?;

        let snapshot = self.store.credentials().snapshot();
        let mut matches: Vec<CredentialRecord> = Vec::new();

        for part in &snapshot.parts {
            deadline.check()?;
            if !predicate.may_match_part(part) {
                continue;
            }
            for (ordinal, row) in part.rows.iter().enumerate() {
                if ordinal % DEADLINE_STRIDE == 0 {
                    deadline.check()?;
                }
                if snapshot.is_deleted(&part.id, ordinal as u32) {
                    continue;
                }
                if predicate.matches(row) {
                    matches.push(row.clone());
                }
            }
        }

        // Newest first; the natural key breaks observed_at ties so
        // pagination is stable under concurrent ingestion.
        matches.sort_by_cached_key(|r| (Reverse(r.observed_at()), r.natural_key()));

        let offset = (page as usize - 1) * limit as usize;
        Ok(matches
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .collect())
    }

    fn count_matches(&self, predicate: &Predicate, deadline: Deadline) -> Result<u64> {
        deadline.check()?;

        let snapshot = self.store.credentials().snapshot();
        let mut total = 0u64;

        for part in &snapshot.parts {
            deadline.check()?;
            if !predicate.may_match_part(part) {
                continue;
            }
            for (ordinal, row) in part.rows.iter().enumerate() {
                if ordinal % DEADLINE_STRIDE == 0 {
                    deadline.check()?;
                }
                if snapshot.is_deleted(&part.id, ordinal as u32) {
                    continue;
                }
                if predicate.matches(row) {
                    total += 1;
                }
            }
        }

        Ok(total)
    }

    fn aggregate_sources(
        &self,
        predicate: &Predicate,
        deadline: Deadline,
    ) -> Result<SourceAggregations> {
        deadline.check()?;

        let snapshot = self.store.credentials().snapshot();
        let mut counts: HashMap<String, u64> = HashMap::new();
        let mut total_records = 0u64;

        for part in &snapshot.parts {
            deadline.check()?;
            if !predicate.may_match_part(part) {
                continue;
            }
            for (ordinal, row) in part.rows.iter().enumerate() {
                if ordinal % DEADLINE_STRIDE == 0 {
                    deadline.check()?;
                }
                if snapshot.is_deleted(&part.id, ordinal as u32) {
                    continue;
                }
                if predicate.matches(row) {
                    *counts.entry(row.source_name.clone()).or_default() += 1;
                    total_records += 1;
                }
            }
        }

        let mut sources: Vec<SourceBucket> = counts
            .into_iter()
            .map(|(source, count)| SourceBucket { source, count })
            .collect();
        // Count descending, source name as the deterministic tie-break
        sources.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.source.cmp(&b.source)));
        sources.truncate(self.store.config().top_sources);

        Ok(SourceAggregations {
            sources,
            total_records,
        })
    }
}
