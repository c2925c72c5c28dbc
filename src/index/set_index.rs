use fst::Set;

use crate::core::error::Result;

/// Exact set index over one low-cardinality column of a part (domain,
/// source_name, cookie_type). Backed by an FST set, so lookups are exact
/// and the distinct values stay cheap to hold even for wide parts.
pub struct SetIndex {
    set: Set<Vec<u8>>,
}

impl SetIndex {
    pub fn build(mut terms: Vec<String>) -> Result<Self> {
        terms.sort();
        terms.dedup();
        let set = Set::from_iter(terms)?;
        Ok(SetIndex { set })
    }

    pub fn contains(&self, term: &str) -> bool {
        self.set.contains(term)
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

impl std::fmt::Debug for SetIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetIndex").field("len", &self.len()).finish()
    }
}
