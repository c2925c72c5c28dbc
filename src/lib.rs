pub mod core;
pub mod index;
pub mod ingest;
pub mod normalize;
pub mod query;
pub mod retention;
pub mod schema;
pub mod storage;
pub mod table;

/*
┌──────────────────────────────────────────────────────────────────────┐
│                       BREACHDB MODULE MAP                            │
└──────────────────────────────────────────────────────────────────────┘

  ingest::IngestionWriter ── normalize ──> normalize::normalizer
        │                                        │
        │ one part per batch                     │ canonical records,
        ▼                                        │ hashed victim ids
  table::Table<R> ◄──────────────────────────────┘
        │  copy-on-write part set + tombstones
        │  background fold: table::merger (last-observed-wins per key)
        ▼
  storage::{part, part_writer, part_reader, manifest, merge_policy}
        │  immutable sorted runs, lz4 + crc32, manifest commit point
        ▼
  index::{membership, set_index}   per-part skip indexes

  query::QueryEngine         three-part search (page/count/sources),
                             one predicate, fail-open
  query::ProfileResolver     victim-id fan-in, grouped per identity
  retention::RetentionSweeper  tombstone marks, merge reclaims

  core::BreachStore       composition root: layout + schema + tables
                          + merge workers, shared as Arc
*/
