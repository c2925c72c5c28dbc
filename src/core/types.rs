use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Credential,
    Cookie,
}

impl RecordKind {
    pub fn table_name(&self) -> &'static str {
        match self {
            RecordKind::Credential => "credentials",
            RecordKind::Cookie => "cookies",
        }
    }
}

/// One exposed credential, canonicalized at normalization time.
///
/// The natural key is `(domain, email, username, victim_id)`: rows sharing
/// it collapse to the one with the greatest `observed_at` when parts merge.
/// Until a merge runs, duplicate physical rows may coexist and counts over
/// this table are approximate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub observed_at: DateTime<Utc>,
    pub victim_id: String,
    pub source_name: String,

    pub url: String,
    pub domain: String,
    pub email: String,
    pub username: String,
    pub password: Option<String>,
    pub phone: Option<String>,

    // Victim PII when the source carries it
    pub name: String,
    pub address: Option<String>,
    pub country: Option<String>,
    pub origin: Option<String>,

    /// Auxiliary field names present in the original record, sorted.
    pub fields: Vec<String>,

    // Machine metadata, present for infostealer-log sources
    pub hostname: Option<String>,
    pub ip_address: Option<String>,
    pub language: Option<String>,
    pub timezone: Option<String>,
    pub os_version: Option<String>,
    pub hwid: Option<String>,
    pub cpu_name: Option<String>,
    pub gpu: Option<String>,
    pub ram_size: Option<u64>,

    // Risk annotations
    pub account_type: Option<String>,
    pub risk_score: u8,
    pub risk_category: Option<String>,
    pub is_privileged: bool,
    pub breach_impact: Option<String>,
}

/// One exfiltrated cookie observation.
///
/// Unlike credentials the natural key includes `observed_at`: the same
/// cookie name re-observed with a different value is a distinct logical
/// record, while exact re-ingestions still fold to one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub observed_at: DateTime<Utc>,
    pub victim_id: String,
    pub domain: String,

    pub cookie_name: String,
    pub cookie_path: String,
    pub cookie_value: Option<String>,
    pub cookie_value_length: u32,
    pub secure: bool,

    pub cookie_type: String,
    pub risk_level: String,
    pub browser_source: String,

    pub hostname: Option<String>,
    pub ip_address: Option<String>,
    pub country: Option<String>,
}

/// Behavior shared by the two record kinds so parts, merging, retention,
/// and the profile join stay generic.
pub trait StoredRecord:
    Clone + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Natural key identifying one logical record. Ordered domain-first,
    /// which is also the physical sort order inside a part.
    type Key: Ord + Eq + std::hash::Hash + Clone + Send + Sync;

    const KIND: RecordKind;

    fn natural_key(&self) -> Self::Key;
    fn observed_at(&self) -> DateTime<Utc>;
    fn victim_id(&self) -> &str;
    fn domain(&self) -> &str;

    /// Canonical text of the named indexable column, if the row carries it.
    /// Feeds the per-part skip indexes declared by the table schema.
    fn index_value(&self, column: &str) -> Option<&str>;
}

impl StoredRecord for CredentialRecord {
    type Key = (String, String, String, String);

    const KIND: RecordKind = RecordKind::Credential;

    fn natural_key(&self) -> Self::Key {
        (
            self.domain.clone(),
            self.email.clone(),
            self.username.clone(),
            self.victim_id.clone(),
        )
    }

    fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    fn victim_id(&self) -> &str {
        &self.victim_id
    }

    fn domain(&self) -> &str {
        &self.domain
    }

    fn index_value(&self, column: &str) -> Option<&str> {
        let value = match column {
            "domain" => self.domain.as_str(),
            "email" => self.email.as_str(),
            "username" => self.username.as_str(),
            "source_name" => self.source_name.as_str(),
            "victim_id" => self.victim_id.as_str(),
            "ip_address" => self.ip_address.as_deref()?,
            _ => return None,
        };
        if value.is_empty() { None } else { Some(value) }
    }
}

impl StoredRecord for CookieRecord {
    type Key = (String, String, String, DateTime<Utc>);

    const KIND: RecordKind = RecordKind::Cookie;

    fn natural_key(&self) -> Self::Key {
        (
            self.domain.clone(),
            self.cookie_name.clone(),
            self.victim_id.clone(),
            self.observed_at,
        )
    }

    fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    fn victim_id(&self) -> &str {
        &self.victim_id
    }

    fn domain(&self) -> &str {
        &self.domain
    }

    fn index_value(&self, column: &str) -> Option<&str> {
        let value = match column {
            "domain" => self.domain.as_str(),
            "cookie_name" => self.cookie_name.as_str(),
            "cookie_type" => self.cookie_type.as_str(),
            "victim_id" => self.victim_id.as_str(),
            "ip_address" => self.ip_address.as_deref()?,
            _ => return None,
        };
        if value.is_empty() { None } else { Some(value) }
    }
}

/// Execution budget for one store operation. Scan loops check it between
/// parts so a slow read fails instead of hanging its caller.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn new(budget: Duration) -> Self {
        Deadline {
            start: Instant::now(),
            budget,
        }
    }

    pub fn expired(&self) -> bool {
        self.start.elapsed() >= self.budget
    }

    pub fn check(&self) -> Result<()> {
        if self.expired() {
            return Err(Error::new(
                ErrorKind::Timeout,
                format!("operation exceeded {:?} budget", self.budget),
            ));
        }
        Ok(())
    }
}
