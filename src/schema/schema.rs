use serde::{Deserialize, Serialize};

/// Storage engine behavior for a table. The replacing-merge engine folds
/// rows sharing a natural key during background merges, keeping the row
/// with the greatest `observed_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableEngine {
    ReplacingMerge,
}

/// Per-part skip index kinds.
///
/// `Membership` is an approximate (bloom-style) filter sized for
/// high-cardinality text columns; `Set` is an exact sorted-set index for
/// low-cardinality columns. Both exist to let queries skip whole parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipIndexKind {
    Membership,
    Set,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub column: String,
    pub kind: SkipIndexKind,
}

impl IndexSpec {
    fn membership(column: &str) -> Self {
        IndexSpec {
            column: column.to_string(),
            kind: SkipIndexKind::Membership,
        }
    }

    fn set(column: &str) -> Self {
        IndexSpec {
            column: column.to_string(),
            kind: SkipIndexKind::Set,
        }
    }
}

/// Declarative table definition: engine, physical ordering, and the skip
/// indexes every part carries. Persisted as the schema manifest so an
/// existing store can be verified on reopen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub version: u32,
    pub engine: TableEngine,
    pub order_by: Vec<String>,
    pub indexes: Vec<IndexSpec>,
}

impl TableSchema {
    pub const FORMAT_VERSION: u32 = 1;

    /// The credential exposure table. Ordered domain-first since nearly
    /// every query filters or groups by domain.
    pub fn credentials() -> Self {
        TableSchema {
            name: "credentials".to_string(),
            version: Self::FORMAT_VERSION,
            engine: TableEngine::ReplacingMerge,
            order_by: vec![
                "domain".to_string(),
                "email".to_string(),
                "username".to_string(),
                "victim_id".to_string(),
            ],
            indexes: vec![
                IndexSpec::set("domain"),
                IndexSpec::set("source_name"),
                IndexSpec::membership("email"),
                IndexSpec::membership("username"),
                IndexSpec::membership("ip_address"),
                IndexSpec::membership("victim_id"),
            ],
        }
    }

    /// The cookie exposure table. `observed_at` participates in the key:
    /// each re-observation of a cookie is its own logical record.
    pub fn cookies() -> Self {
        TableSchema {
            name: "cookies".to_string(),
            version: Self::FORMAT_VERSION,
            engine: TableEngine::ReplacingMerge,
            order_by: vec![
                "domain".to_string(),
                "cookie_name".to_string(),
                "victim_id".to_string(),
                "observed_at".to_string(),
            ],
            indexes: vec![
                IndexSpec::set("domain"),
                IndexSpec::set("cookie_type"),
                IndexSpec::membership("cookie_name"),
                IndexSpec::membership("victim_id"),
                IndexSpec::membership("ip_address"),
            ],
        }
    }
}
