use chrono::{DateTime, Utc};

use crate::core::types::CredentialRecord;
use crate::query::types::{SearchRequest, SearchType};
use crate::storage::part::Part;

/// One search predicate, built once per request and reused by all three
/// sub-reads (page, count, aggregation) so they agree on what matches.
///
/// `may_match_part` consults the part's skip indexes and time range to
/// skip whole parts; `matches` is the exact row test.
#[derive(Debug, Clone)]
pub struct Predicate {
    term: String,
    search_type: SearchType,
    source: Option<String>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

impl Predicate {
    pub fn from_request(request: &SearchRequest) -> Self {
        // The exact-match dimensions hold canonical (lowercased) values,
        // so canonicalize the term the same way. Name matching lowercases
        // too, for case-insensitive substring search.
        let term = request.term.trim().to_lowercase();
        let source = request
            .source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        Predicate {
            term,
            search_type: request.search_type,
            source,
            from: request.from,
            to: request.to,
        }
    }

    pub fn matches(&self, row: &CredentialRecord) -> bool {
        if let Some(from) = self.from {
            if row.observed_at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if row.observed_at > to {
                return false;
            }
        }
        if let Some(source) = &self.source {
            if row.source_name != *source {
                return false;
            }
        }

        if self.term.is_empty() {
            return true;
        }

        match self.search_type {
            SearchType::Email => row.email == self.term,
            SearchType::Ip => row.ip_address.as_deref() == Some(self.term.as_str()),
            SearchType::Domain => row.domain == self.term,
            SearchType::Source => row.source_name == self.term,
            SearchType::Username => row.username == self.term,
            SearchType::Name => Self::name_contains(&row.name, &self.term),
            SearchType::All => {
                Self::name_contains(&row.name, &self.term)
                    || row.email == self.term
                    || row.domain == self.term
                    || row.source_name == self.term
                    || row.username == self.term
            }
        }
    }

    /// Skip test against a part's metadata and indexes. `false` means no
    /// row inside can match; `true` only means the part must be scanned.
    pub fn may_match_part(&self, part: &Part<CredentialRecord>) -> bool {
        if let Some(from) = self.from {
            if part.meta.max_observed_at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if part.meta.min_observed_at > to {
                return false;
            }
        }
        if let Some(source) = &self.source {
            if !part.indexes.may_contain("source_name", source) {
                return false;
            }
        }

        if self.term.is_empty() {
            return true;
        }

        match self.search_type {
            SearchType::Email => part.indexes.may_contain("email", &self.term),
            SearchType::Ip => part.indexes.may_contain("ip_address", &self.term),
            SearchType::Domain => part.indexes.may_contain("domain", &self.term),
            SearchType::Source => part.indexes.may_contain("source_name", &self.term),
            SearchType::Username => part.indexes.may_contain("username", &self.term),
            // Free-text and OR-across-fields scans cannot be pruned by a
            // single-column index
            SearchType::Name | SearchType::All => true,
        }
    }

    fn name_contains(name: &str, term: &str) -> bool {
        !name.is_empty() && name.to_lowercase().contains(term)
    }
}
