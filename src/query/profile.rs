use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::core::error::Result;
use crate::core::store::BreachStore;
use crate::core::types::{CookieRecord, CredentialRecord, Deadline, StoredRecord};
use crate::query::types::{Pagination, ProfilePage, ProfileRequest};
use crate::table::table::Table;

/// Assembles the full picture of compromised identities: every credential
/// and every cookie belonging to a set of victim ids, usually collected
/// from a prior search. Each record kind is fetched and paginated
/// independently.
///
/// Reads fail open like the query engine: backend trouble degrades to an
/// empty page, never an error surfaced to the dashboard.
pub struct ProfileResolver {
    store: Arc<BreachStore>,
}

impl ProfileResolver {
    pub fn new(store: Arc<BreachStore>) -> Self {
        ProfileResolver { store }
    }

    pub fn credentials(&self, request: &ProfileRequest) -> ProfilePage<CredentialRecord> {
        let page = request.page.max(1);
        match self.resolve(self.store.credentials(), request, page) {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(error = %err, "profile credential lookup failed, returning empty page");
                ProfilePage::empty(page)
            }
        }
    }

    pub fn cookies(&self, request: &ProfileRequest) -> ProfilePage<CookieRecord> {
        let page = request.page.max(1);
        match self.resolve(self.store.cookies(), request, page) {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(error = %err, "profile cookie lookup failed, returning empty page");
                ProfilePage::empty(page)
            }
        }
    }

    fn resolve<R: StoredRecord>(
        &self,
        table: &Table<R>,
        request: &ProfileRequest,
        page: u32,
    ) -> Result<ProfilePage<R>> {
        let limit = request.limit.clamp(1, self.store.config().max_page_size);

        let ids: HashSet<&str> = request
            .victim_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .collect();
        // An empty id list short-circuits without touching the store
        if ids.is_empty() {
            return Ok(ProfilePage::empty(page));
        }

        let deadline = Deadline::new(self.read_budget());
        deadline.check()?;

        let snapshot = table.snapshot();
        let mut matches: Vec<R> = Vec::new();

        for part in &snapshot.parts {
            deadline.check()?;
            // Skip parts whose membership index rules out every wanted id
            if !ids
                .iter()
                .any(|id| part.indexes.may_contain("victim_id", id))
            {
                continue;
            }
            for (ordinal, row) in part.rows.iter().enumerate() {
                if snapshot.is_deleted(&part.id, ordinal as u32) {
                    continue;
                }
                if ids.contains(row.victim_id()) {
                    matches.push(row.clone());
                }
            }
        }

        let total = matches.len() as u64;

        // Group per identity, then per site, newest observation first;
        // natural key keeps equal timestamps stably ordered.
        matches.sort_by_cached_key(|r| {
            (
                r.victim_id().to_string(),
                r.domain().to_string(),
                Reverse(r.observed_at()),
                r.natural_key(),
            )
        });

        let offset = (page as usize - 1) * limit as usize;
        let results = matches
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .collect();

        Ok(ProfilePage {
            results,
            pagination: Pagination::new(total, limit, page),
        })
    }

    fn read_budget(&self) -> Duration {
        self.store.config().read_deadline
    }
}
