use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::{Value, json};

use breachdb::core::config::StoreConfig;
use breachdb::core::store::BreachStore;
use breachdb::ingest::writer::IngestionWriter;
use breachdb::query::engine::QueryEngine;
use breachdb::query::profile::ProfileResolver;
use breachdb::query::types::{ProfileRequest, SearchRequest, SearchType};
use breachdb::retention::sweeper::RetentionSweeper;

fn open_store(dir: &std::path::Path) -> Arc<BreachStore> {
    let config = StoreConfig {
        data_dir: dir.to_path_buf(),
        ..StoreConfig::default()
    };
    Arc::new(BreachStore::open(config).unwrap())
}

fn credential(domain: &str, email: &str, username: &str, victim: &str, observed: &str) -> Value {
    json!({
        "domain": domain,
        "email": email,
        "username": username,
        "victim_id": victim,
        "observed_at": observed,
    })
}

fn search_email(engine: &QueryEngine, term: &str) -> breachdb::query::types::SearchResponse {
    engine.search(&SearchRequest {
        term: term.to_string(),
        search_type: SearchType::Email,
        ..SearchRequest::default()
    })
}

#[test]
fn reingestion_of_identical_records_converges_to_one_row() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let writer = IngestionWriter::new(store.clone());
    let engine = QueryEngine::new(store.clone());

    let record = credential("example.com", "a@b.com", "u1", "v1", "2025-01-01T00:00:00Z");
    for _ in 0..3 {
        let report = writer.ingest_credentials(&[record.clone()], "leak-a").unwrap();
        assert!(report.success);
        assert_eq!(report.inserted, 1);
    }

    // Duplicates may coexist until compaction; counts are approximate
    let before = search_email(&engine, "a@b.com");
    assert!(before.pagination.total >= 1);

    store.compact().unwrap();

    let after = search_email(&engine, "a@b.com");
    assert_eq!(after.pagination.total, 1);
    assert_eq!(after.results.len(), 1);
}

#[test]
fn synthesized_victim_ids_fold_across_reingestion_runs() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let writer = IngestionWriter::new(store.clone());
    let engine = QueryEngine::new(store.clone());

    // No victim_id supplied: the normalizer must synthesize the same id
    // on every run or each re-ingestion would mint a fresh victim
    let record = json!({
        "domain": "example.com",
        "email": "a@b.com",
        "username": "u1",
        "observed_at": "2025-01-01T00:00:00Z",
    });
    writer.ingest_credentials(&[record.clone()], "leak-a").unwrap();
    writer.ingest_credentials(&[record], "leak-a").unwrap();

    store.compact().unwrap();

    let response = search_email(&engine, "a@b.com");
    assert_eq!(response.pagination.total, 1);
}

#[test]
fn last_observed_wins_regardless_of_arrival_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let writer = IngestionWriter::new(store.clone());
    let engine = QueryEngine::new(store.clone());

    // Newer observation arrives first; the older one must not win
    let newer = json!({
        "domain": "example.com", "email": "a@b.com", "username": "u1",
        "victim_id": "v1", "observed_at": "2025-02-01T00:00:00Z",
        "password": "new",
    });
    let older = json!({
        "domain": "example.com", "email": "a@b.com", "username": "u1",
        "victim_id": "v1", "observed_at": "2025-01-01T00:00:00Z",
        "password": "old",
    });
    writer.ingest_credentials(&[newer], "leak-a").unwrap();
    writer.ingest_credentials(&[older], "leak-a").unwrap();

    store.compact().unwrap();

    let response = search_email(&engine, "a@b.com");
    assert_eq!(response.pagination.total, 1);
    assert_eq!(response.results[0].password.as_deref(), Some("new"));
    assert_eq!(
        response.results[0].observed_at,
        Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()
    );
}

#[test]
fn credential_update_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let writer = IngestionWriter::new(store.clone());
    let engine = QueryEngine::new(store.clone());

    writer
        .ingest_credentials(
            &[credential("example.com", "a@b.com", "u1", "v1", "2025-01-01T00:00:00Z")],
            "leak-a",
        )
        .unwrap();
    writer
        .ingest_credentials(
            &[json!({
                "domain": "example.com", "email": "a@b.com", "username": "u1",
                "victim_id": "v1", "observed_at": "2025-01-02T00:00:00Z",
                "password": "new",
            })],
            "leak-a",
        )
        .unwrap();

    store.compact().unwrap();

    let response = search_email(&engine, "a@b.com");
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].password.as_deref(), Some("new"));
}

#[test]
fn search_type_isolation() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let writer = IngestionWriter::new(store.clone());
    let engine = QueryEngine::new(store.clone());

    writer
        .ingest_credentials(
            &[
                credential("example.com", "x@example.com", "u1", "v1", "2025-01-01T00:00:00Z"),
                // The searched email appears in another row's username
                credential("example.com", "other@example.com", "x@example.com", "v2", "2025-01-01T00:00:00Z"),
            ],
            "leak-a",
        )
        .unwrap();

    let response = search_email(&engine, "x@example.com");
    assert_eq!(response.pagination.total, 1);
    assert!(response.results.iter().all(|r| r.email == "x@example.com"));

    // Username search finds the other row only
    let response = engine.search(&SearchRequest {
        term: "x@example.com".to_string(),
        search_type: SearchType::Username,
        ..SearchRequest::default()
    });
    assert_eq!(response.pagination.total, 1);
    assert_eq!(response.results[0].email, "other@example.com");
}

#[test]
fn pagination_is_complete_and_disjoint() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let writer = IngestionWriter::new(store.clone());
    let engine = QueryEngine::new(store.clone());

    // Equal timestamps everywhere: ordering falls to the natural-key
    // tie-break, which must keep pages disjoint
    let records: Vec<Value> = (0..25)
        .map(|i| {
            credential(
                "example.com",
                &format!("user{:02}@example.com", i),
                "u",
                &format!("v{:02}", i),
                "2025-03-01T00:00:00Z",
            )
        })
        .collect();
    writer.ingest_credentials(&records, "leak-a").unwrap();

    let mut seen = std::collections::HashSet::new();
    let mut fetched = 0usize;
    let mut page = 1u32;
    loop {
        let response = engine.search(&SearchRequest {
            term: "example.com".to_string(),
            search_type: SearchType::Domain,
            page,
            limit: 10,
            ..SearchRequest::default()
        });
        assert_eq!(response.pagination.total, 25);
        assert_eq!(response.pagination.pages, 3);

        if response.results.is_empty() {
            break;
        }
        for row in &response.results {
            assert!(seen.insert(row.email.clone()), "row repeated across pages");
        }
        fetched += response.results.len();
        page += 1;
    }

    assert_eq!(fetched, 25);
    assert_eq!(seen.len(), 25);
}

#[test]
fn search_orders_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let writer = IngestionWriter::new(store.clone());
    let engine = QueryEngine::new(store.clone());

    writer
        .ingest_credentials(
            &[
                credential("example.com", "old@example.com", "u", "v1", "2025-01-01T00:00:00Z"),
                credential("example.com", "new@example.com", "u", "v2", "2025-03-01T00:00:00Z"),
                credential("example.com", "mid@example.com", "u", "v3", "2025-02-01T00:00:00Z"),
            ],
            "leak-a",
        )
        .unwrap();

    let response = engine.search(&SearchRequest {
        term: "example.com".to_string(),
        search_type: SearchType::Domain,
        ..SearchRequest::default()
    });

    let emails: Vec<&str> = response.results.iter().map(|r| r.email.as_str()).collect();
    assert_eq!(emails, vec!["new@example.com", "mid@example.com", "old@example.com"]);
}

#[test]
fn source_filter_and_time_range_compose() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let writer = IngestionWriter::new(store.clone());
    let engine = QueryEngine::new(store.clone());

    writer
        .ingest_credentials(
            &[credential("example.com", "a@b.com", "u", "v1", "2025-01-15T00:00:00Z")],
            "leak-a",
        )
        .unwrap();
    writer
        .ingest_credentials(
            &[credential("example.com", "c@d.com", "u", "v2", "2025-02-15T00:00:00Z")],
            "leak-b",
        )
        .unwrap();

    let response = engine.search(&SearchRequest {
        term: String::new(),
        source: Some("leak-b".to_string()),
        ..SearchRequest::default()
    });
    assert_eq!(response.pagination.total, 1);
    assert_eq!(response.results[0].email, "c@d.com");

    let response = engine.search(&SearchRequest {
        term: String::new(),
        from: Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
        to: Some(Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap()),
        ..SearchRequest::default()
    });
    assert_eq!(response.pagination.total, 1);
    assert_eq!(response.results[0].email, "a@b.com");
}

#[test]
fn source_aggregations_rank_by_match_count() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let writer = IngestionWriter::new(store.clone());
    let engine = QueryEngine::new(store.clone());

    for i in 0..3 {
        writer
            .ingest_credentials(
                &[credential("example.com", &format!("a{}@b.com", i), "u", &format!("v{}", i), "2025-01-01T00:00:00Z")],
                "big-leak",
            )
            .unwrap();
    }
    writer
        .ingest_credentials(
            &[credential("example.com", "z@b.com", "u", "vz", "2025-01-01T00:00:00Z")],
            "small-leak",
        )
        .unwrap();

    let response = engine.search(&SearchRequest::default());
    assert_eq!(response.aggregations.total_records, 4);
    assert_eq!(response.aggregations.sources[0].source, "big-leak");
    assert_eq!(response.aggregations.sources[0].count, 3);
    assert_eq!(response.aggregations.sources[1].source, "small-leak");
    assert_eq!(response.aggregations.sources[1].count, 1);
    // Facet and count run under the same predicate
    assert_eq!(response.pagination.total, response.aggregations.total_records);
}

#[test]
fn profile_resolution_is_complete_and_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let writer = IngestionWriter::new(store.clone());
    let resolver = ProfileResolver::new(store.clone());

    writer
        .ingest_credentials(
            &[
                credential("a.com", "a@b.com", "u1", "victim-1", "2025-01-01T00:00:00Z"),
                credential("b.com", "a@b.com", "u1", "victim-1", "2025-01-02T00:00:00Z"),
                credential("c.com", "a@b.com", "u1", "victim-1", "2025-01-03T00:00:00Z"),
                credential("a.com", "other@b.com", "u2", "victim-2", "2025-01-01T00:00:00Z"),
            ],
            "leak-a",
        )
        .unwrap();
    writer
        .ingest_cookies(
            &[
                json!({"domain": "a.com", "name": "sid", "victim_id": "victim-1", "observed_at": "2025-01-01T00:00:00Z"}),
                json!({"domain": "b.com", "name": "sid", "victim_id": "victim-1", "observed_at": "2025-01-02T00:00:00Z"}),
                json!({"domain": "a.com", "name": "sid", "victim_id": "victim-2", "observed_at": "2025-01-01T00:00:00Z"}),
            ],
            "leak-a",
        )
        .unwrap();

    let request = ProfileRequest {
        victim_ids: vec!["victim-1".to_string()],
        page: 1,
        limit: 10,
    };

    let credentials = resolver.credentials(&request);
    assert_eq!(credentials.pagination.total, 3);
    assert_eq!(credentials.results.len(), 3);
    assert!(credentials.results.iter().all(|r| r.victim_id == "victim-1"));
    // Grouped ordering: per victim, then per domain
    let domains: Vec<&str> = credentials.results.iter().map(|r| r.domain.as_str()).collect();
    assert_eq!(domains, vec!["a.com", "b.com", "c.com"]);

    let cookies = resolver.cookies(&request);
    assert_eq!(cookies.pagination.total, 2);
    assert!(cookies.results.iter().all(|r| r.victim_id == "victim-1"));

    // Empty id list short-circuits
    let empty = resolver.credentials(&ProfileRequest {
        victim_ids: Vec::new(),
        page: 1,
        limit: 10,
    });
    assert_eq!(empty.pagination.total, 0);
    assert!(empty.results.is_empty());
}

#[test]
fn cookie_reobservations_are_distinct_records() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let writer = IngestionWriter::new(store.clone());
    let resolver = ProfileResolver::new(store.clone());

    let reobserved = json!({
        "domain": "a.com", "name": "sid", "victim_id": "v1",
        "observed_at": "2025-01-02T00:00:00Z", "value": "token-2",
    });
    writer
        .ingest_cookies(
            &[
                json!({
                    "domain": "a.com", "name": "sid", "victim_id": "v1",
                    "observed_at": "2025-01-01T00:00:00Z", "value": "token-1",
                }),
                reobserved.clone(),
            ],
            "leak-a",
        )
        .unwrap();
    // Exact duplicate of an existing observation folds away
    writer.ingest_cookies(&[reobserved], "leak-a").unwrap();

    store.compact().unwrap();

    let page = resolver.cookies(&ProfileRequest {
        victim_ids: vec!["v1".to_string()],
        page: 1,
        limit: 10,
    });
    assert_eq!(page.pagination.total, 2);
    let values: Vec<_> = page
        .results
        .iter()
        .map(|c| c.cookie_value.as_deref().unwrap())
        .collect();
    assert!(values.contains(&"token-1"));
    assert!(values.contains(&"token-2"));
}

#[test]
fn reads_fail_open_when_the_deadline_expires() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        data_dir: dir.path().to_path_buf(),
        read_deadline: Duration::ZERO, // Every read times out immediately
        ..StoreConfig::default()
    };
    let store = Arc::new(BreachStore::open(config).unwrap());
    let writer = IngestionWriter::new(store.clone());
    let engine = QueryEngine::new(store.clone());
    let resolver = ProfileResolver::new(store.clone());

    writer
        .ingest_credentials(
            &[credential("example.com", "a@b.com", "u", "v1", "2025-01-01T00:00:00Z")],
            "leak-a",
        )
        .unwrap();

    let response = engine.search(&SearchRequest {
        term: "a@b.com".to_string(),
        search_type: SearchType::Email,
        page: 3,
        ..SearchRequest::default()
    });
    assert!(response.results.is_empty());
    assert_eq!(response.pagination.total, 0);
    assert_eq!(response.pagination.pages, 0);
    assert_eq!(response.pagination.current, 3);
    assert!(response.aggregations.sources.is_empty());
    assert_eq!(response.aggregations.total_records, 0);

    let page = resolver.credentials(&ProfileRequest {
        victim_ids: vec!["v1".to_string()],
        page: 2,
        limit: 10,
    });
    assert!(page.results.is_empty());
    assert_eq!(page.pagination.current, 2);
}

#[test]
fn purge_respects_the_retention_horizon() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let writer = IngestionWriter::new(store.clone());
    let engine = QueryEngine::new(store.clone());
    let sweeper = RetentionSweeper::new(store.clone());

    let ten_days_ago = (Utc::now() - chrono::Duration::days(10)).to_rfc3339();
    writer
        .ingest_credentials(
            &[
                credential("example.com", "a@b.com", "u1", "v1", &ten_days_ago),
                credential("example.com", "c@d.com", "u2", "v2", &ten_days_ago),
            ],
            "leak-a",
        )
        .unwrap();
    writer
        .ingest_cookies(
            &[json!({"domain": "example.com", "name": "sid", "victim_id": "v1", "observed_at": ten_days_ago})],
            "leak-a",
        )
        .unwrap();

    // Ten-day-old rows survive a thirty-day horizon
    let report = sweeper.purge_older_than(30).unwrap();
    assert!(report.success);
    assert_eq!(report.removed_credentials, 0);
    assert_eq!(report.remaining_credentials, 2);
    assert_eq!(report.remaining_cookies, 1);
    assert_eq!(report.remaining_total, 3);

    // A five-day horizon removes them all
    let report = sweeper.purge_older_than(5).unwrap();
    assert_eq!(report.removed_credentials, 2);
    assert_eq!(report.removed_cookies, 1);
    assert_eq!(report.remaining_total, 0);

    // Purged rows disappear from reads before physical reclamation
    let response = search_email(&engine, "a@b.com");
    assert_eq!(response.pagination.total, 0);

    store.compact().unwrap();
    let stats = store.stats();
    assert_eq!(stats.credentials.physical_rows, 0);
    assert_eq!(stats.cookies.physical_rows, 0);
}

#[test]
fn malformed_records_are_rejected_individually() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let writer = IngestionWriter::new(store.clone());
    let engine = QueryEngine::new(store.clone());

    let report = writer
        .ingest_credentials(
            &[
                credential("example.com", "a@b.com", "u", "v1", "2025-01-01T00:00:00Z"),
                json!("not an object"),
                json!(42),
            ],
            "leak-a",
        )
        .unwrap();

    assert!(report.success);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.rejected, 2);

    let response = search_email(&engine, "a@b.com");
    assert_eq!(response.pagination.total, 1);
}

#[test]
fn store_reopens_with_all_data_visible() {
    let dir = tempfile::tempdir().unwrap();

    {
        let store = open_store(dir.path());
        let writer = IngestionWriter::new(store.clone());
        writer
            .ingest_credentials(
                &[credential("example.com", "a@b.com", "u", "v1", "2025-01-01T00:00:00Z")],
                "leak-a",
            )
            .unwrap();
        writer
            .ingest_cookies(
                &[json!({"domain": "example.com", "name": "sid", "victim_id": "v1"})],
                "leak-a",
            )
            .unwrap();
    }

    let store = open_store(dir.path());
    let engine = QueryEngine::new(store.clone());
    let response = search_email(&engine, "a@b.com");
    assert_eq!(response.pagination.total, 1);

    let stats = store.stats();
    assert_eq!(stats.credentials.logical_rows, 1);
    assert_eq!(stats.cookies.logical_rows, 1);
}
