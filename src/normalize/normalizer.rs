use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{CookieRecord, CredentialRecord};

/// Maps heterogeneous feed records into the canonical shapes.
///
/// Pure functions: same input, same output, no I/O. Missing fields are
/// defaulted (`""` for required strings, `None` for optional ones), never
/// rejected; only input that is not a JSON object at all fails, and that
/// failure is per record. Field lookup is case-insensitive over a fixed
/// alias table since feeds disagree on naming.
///
/// A missing victim id is synthesized as a hash of the stable identity
/// fields, so re-ingesting the same breach file reproduces the same id
/// instead of minting a fresh victim per run.
pub fn normalize_credential(
    input: &Value,
    source_name: &str,
    ingested_at: DateTime<Utc>,
) -> Result<CredentialRecord> {
    let obj = as_object(input)?;
    let source_name = canonical(source_name);

    let observed_at =
        get_time(obj, &["observed_at", "observedat", "timestamp", "date"]).unwrap_or(ingested_at);

    let url = get_str(obj, &["url", "uri"]).unwrap_or_default();
    let domain = get_str(obj, &["domain", "host"])
        .map(|d| canonical(&d))
        .or_else(|| domain_from_url(&url))
        .unwrap_or_default();

    let email = get_str(obj, &["email", "mail", "email_address"])
        .map(|e| canonical(&e))
        .unwrap_or_default();
    let username = get_str(obj, &["username", "user", "login"])
        .map(|u| canonical(&u))
        .unwrap_or_default();

    let victim_id = get_str(obj, &["victim_id", "victimid", "profile_id", "uid"])
        .unwrap_or_else(|| synthesize_victim_id(&[&domain, &email, &username, &source_name]));

    Ok(CredentialRecord {
        observed_at,
        victim_id,
        source_name,
        url,
        domain,
        email,
        username,
        password: get_str(obj, &["password", "pass"]),
        phone: get_str(obj, &["phone", "phone_number"]),
        name: get_str(obj, &["name", "full_name", "fullname"]).unwrap_or_default(),
        address: get_str(obj, &["address"]),
        country: get_str(obj, &["country"]),
        origin: get_str(obj, &["origin"]),
        fields: field_names(obj),
        hostname: get_str(obj, &["hostname", "computer_name"]),
        ip_address: get_str(obj, &["ip", "ip_address"]).map(|ip| canonical(&ip)),
        language: get_str(obj, &["language"]),
        timezone: get_str(obj, &["timezone"]),
        os_version: get_str(obj, &["os", "os_version"]),
        hwid: get_str(obj, &["hwid"]),
        cpu_name: get_str(obj, &["cpu", "cpu_name"]),
        gpu: get_str(obj, &["gpu"]),
        ram_size: get_u64(obj, &["ram", "ram_size"]),
        account_type: get_str(obj, &["account_type"]),
        risk_score: get_u64(obj, &["risk_score"]).map(|v| v.min(100) as u8).unwrap_or(0),
        risk_category: get_str(obj, &["risk_category"]),
        is_privileged: get_bool(obj, &["is_privileged", "privileged"]).unwrap_or(false),
        breach_impact: get_str(obj, &["breach_impact"]),
    })
}

pub fn normalize_cookie(
    input: &Value,
    source_name: &str,
    ingested_at: DateTime<Utc>,
) -> Result<CookieRecord> {
    let obj = as_object(input)?;
    let source_name = canonical(source_name);

    let observed_at =
        get_time(obj, &["observed_at", "observedat", "timestamp", "date"]).unwrap_or(ingested_at);

    let domain = get_str(obj, &["domain", "host"])
        .map(|d| canonical(&d))
        .unwrap_or_default();
    let cookie_name = get_str(obj, &["cookie_name", "name"]).unwrap_or_default();
    let cookie_value = get_str(obj, &["cookie_value", "value"]);
    let cookie_value_length = get_u64(obj, &["cookie_value_length", "value_length"])
        .map(|v| v.min(u32::MAX as u64) as u32)
        .unwrap_or_else(|| cookie_value.as_deref().map(|v| v.len() as u32).unwrap_or(0));
    let hostname = get_str(obj, &["hostname", "computer_name"]);

    let victim_id = get_str(obj, &["victim_id", "victimid", "profile_id", "uid"])
        .unwrap_or_else(|| {
            synthesize_victim_id(&[
                &domain,
                &cookie_name,
                hostname.as_deref().unwrap_or(""),
                &source_name,
            ])
        });

    Ok(CookieRecord {
        observed_at,
        victim_id,
        domain,
        cookie_name,
        cookie_path: get_str(obj, &["cookie_path", "path"]).unwrap_or_else(|| "/".to_string()),
        cookie_value,
        cookie_value_length,
        secure: get_bool(obj, &["secure"]).unwrap_or(false),
        cookie_type: get_str(obj, &["cookie_type", "type"]).unwrap_or_default(),
        risk_level: get_str(obj, &["risk_level"]).unwrap_or_default(),
        browser_source: get_str(obj, &["browser_source", "browser"]).unwrap_or_default(),
        hostname,
        ip_address: get_str(obj, &["ip", "ip_address"]).map(|ip| canonical(&ip)),
        country: get_str(obj, &["country"]),
    })
}

/// Deterministic fallback victim id: SHA-256 over the stable identity
/// fields, NUL-separated so field boundaries cannot collide.
fn synthesize_victim_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();

    let mut id = String::with_capacity(34);
    id.push_str("v:");
    for byte in digest.iter().take(16) {
        id.push_str(&format!("{:02x}", byte));
    }
    id
}

fn as_object(input: &Value) -> Result<&Map<String, Value>> {
    input.as_object().ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidInput,
            "record is not a JSON object".to_string(),
        )
    })
}

fn canonical(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Sorted top-level field names of the input, kept for provenance.
fn field_names(obj: &Map<String, Value>) -> Vec<String> {
    let mut names: Vec<String> = obj.keys().cloned().collect();
    names.sort();
    names
}

/// Case-insensitive lookup across the alias list, first hit wins.
fn get<'a>(obj: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    for alias in aliases {
        if let Some(found) = obj
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(alias))
            .map(|(_, value)| value)
        {
            if !found.is_null() {
                return Some(found);
            }
        }
    }
    None
}

fn get_str(obj: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    let value = get(obj, aliases)?;
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() { None } else { Some(text) }
}

fn get_bool(obj: &Map<String, Value>, aliases: &[&str]) -> Option<bool> {
    match get(obj, aliases)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn get_u64(obj: &Map<String, Value>, aliases: &[&str]) -> Option<u64> {
    match get(obj, aliases)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Timestamps arrive as RFC 3339 strings or epoch seconds/milliseconds.
fn get_time(obj: &Map<String, Value>, aliases: &[&str]) -> Option<DateTime<Utc>> {
    match get(obj, aliases)? {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => {
            let epoch = n.as_i64()?;
            // Heuristic: anything past the year 2603 in seconds is millis
            if epoch > 20_000_000_000 {
                DateTime::from_timestamp_millis(epoch)
            } else {
                DateTime::from_timestamp(epoch, 0)
            }
        }
        _ => None,
    }
}

/// Canonical host from a URL: scheme, path, port, and credentials
/// stripped, lowercased.
fn domain_from_url(url: &str) -> Option<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }

    let without_scheme = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed);
    let without_creds = without_scheme
        .rsplit_once('@')
        .map(|(_, rest)| rest)
        .unwrap_or(without_scheme);
    let host = without_creds
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .split(':')
        .next()
        .unwrap_or_default();

    if host.is_empty() {
        None
    } else {
        Some(host.to_lowercase())
    }
}
