use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::CredentialRecord;

/// Which dimension a search term runs against.
///
/// `All` ORs across name, email, domain, source, and username. The
/// pre-normalized dimensions match exactly on canonical values; `Name` is
/// free text and matches case-insensitive substrings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SearchType {
    #[default]
    All,
    Name,
    Email,
    Ip,
    Domain,
    Source,
    Username,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub term: String,
    pub search_type: SearchType,
    /// Exact source filter, applied on top of the term match.
    pub source: Option<String>,
    /// Inclusive `observed_at` range.
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// 1-indexed page.
    pub page: u32,
    pub limit: u32,
}

impl Default for SearchRequest {
    fn default() -> Self {
        SearchRequest {
            term: String::new(),
            search_type: SearchType::All,
            source: None,
            from: None,
            to: None,
            page: 1,
            limit: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: u64,
    pub pages: u32,
    pub current: u32,
}

impl Pagination {
    pub fn new(total: u64, limit: u32, current: u32) -> Self {
        let pages = if total == 0 {
            0
        } else {
            total.div_ceil(limit.max(1) as u64) as u32
        };
        Pagination {
            total,
            pages,
            current,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceBucket {
    pub source: String,
    pub count: u64,
}

/// Source-distribution facet computed under the same predicate as the
/// result page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceAggregations {
    pub sources: Vec<SourceBucket>,
    pub total_records: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<CredentialRecord>,
    pub pagination: Pagination,
    pub aggregations: SourceAggregations,
}

impl SearchResponse {
    /// The fail-open shape: what callers see when the store is
    /// unreachable or the read deadline expires. Indistinguishable from
    /// a genuinely empty result on purpose.
    pub fn empty(page: u32) -> Self {
        SearchResponse {
            results: Vec::new(),
            pagination: Pagination {
                total: 0,
                pages: 0,
                current: page,
            },
            aggregations: SourceAggregations::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRequest {
    pub victim_ids: Vec<String>,
    /// 1-indexed page.
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilePage<R> {
    pub results: Vec<R>,
    pub pagination: Pagination,
}

impl<R> ProfilePage<R> {
    pub fn empty(page: u32) -> Self {
        ProfilePage {
            results: Vec::new(),
            pagination: Pagination {
                total: 0,
                pages: 0,
                current: page,
            },
        }
    }
}
