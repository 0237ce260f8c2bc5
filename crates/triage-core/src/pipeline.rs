//! Per-issue pass glue: timeline loading with cache reuse, component
//! resolution with override reconciliation, and fact derivation.
//!
//! The engines themselves stay synchronous pure functions; only the
//! store round-trip here is async.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use triage_domain::{IssueSnapshot, Result, Timeline, TriageConfig, TIMELINE_SCHEMA_VERSION};
use triage_state::{validate_cache, CacheCheck, CacheVerdict, CachedTimeline, TimelineStore};

use crate::component::{reconcile_component_commands, MatchResult, Matcher};
use crate::facts::{derive_facts, FactsRecord};
use crate::history::{build_timeline, History};

/// Load the cached timeline for an issue, falling back to a full
/// rebuild when the cache is missing, stale, or the store misbehaves.
///
/// Store failures are never fatal: a read error is treated as a miss
/// and a write error leaves the fresh timeline usable for this pass.
/// Only a malformed snapshot aborts.
pub async fn load_or_build_timeline(
    store: &dyn TimelineStore,
    snapshot: &IssueSnapshot,
    config: &TriageConfig,
) -> Result<Timeline> {
    match store.get(snapshot.number).await {
        Ok(Some(cached)) => {
            let check = CacheCheck {
                current_updated_at: snapshot.updated_at,
                current_comment_count: snapshot.comments.len(),
                current_labels: &snapshot.labels,
                needs_info_label: &config.needs_info_label,
            };
            match validate_cache(&cached, &check) {
                CacheVerdict::Fresh => {
                    debug!(
                        issue = snapshot.number,
                        digest = cached.digest.short(),
                        "timeline cache hit"
                    );
                    return Ok(cached.timeline);
                }
                CacheVerdict::Stale(reason) => {
                    info!(issue = snapshot.number, ?reason, "timeline cache stale");
                }
            }
        }
        Ok(None) => {
            debug!(issue = snapshot.number, "timeline cache miss");
        }
        Err(err) => {
            warn!(issue = snapshot.number, error = %err, "timeline store read failed");
        }
    }

    let timeline = build_timeline(snapshot)?;
    match CachedTimeline::new(
        snapshot.number,
        TIMELINE_SCHEMA_VERSION,
        snapshot.updated_at,
        timeline.clone(),
    ) {
        Ok(cached) => {
            if let Err(err) = store.put(cached).await {
                warn!(issue = snapshot.number, error = %err, "timeline store write failed");
            }
        }
        Err(err) => {
            warn!(issue = snapshot.number, error = %err, "timeline digest failed, not caching");
        }
    }
    Ok(timeline)
}

/// Resolve the issue's components, then apply any `!component` override
/// commands found in the timeline.
pub fn resolve_components(
    snapshot: &IssueSnapshot,
    timeline: &Timeline,
    matcher: &Matcher<'_>,
    config: &TriageConfig,
) -> MatchResult {
    let history = History::new(timeline, config);
    let baseline = matcher.match_issue(snapshot);
    match reconcile_component_commands(&history, matcher, &baseline) {
        Some(overridden) => {
            info!(
                issue = snapshot.number,
                files = overridden.filenames().len(),
                "component match overridden by command"
            );
            overridden
        }
        None => baseline,
    }
}

/// Run one complete pass for a snapshot: load or rebuild the timeline,
/// resolve components, derive facts.
pub async fn triage_snapshot(
    store: &dyn TimelineStore,
    snapshot: &IssueSnapshot,
    matcher: &Matcher<'_>,
    config: &TriageConfig,
    now: DateTime<Utc>,
) -> Result<FactsRecord> {
    let timeline = load_or_build_timeline(store, snapshot, config).await?;
    let result = resolve_components(snapshot, &timeline, matcher, config);
    Ok(derive_facts(
        snapshot,
        &timeline,
        &result,
        matcher.table().layout(),
        config,
        now,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use triage_domain::{Event, EventKind, RawComment};
    use triage_state::fakes::MemoryTimelineStore;
    use triage_state::{StoreError, StoreResult};

    use crate::component::{ComponentTable, MatchConfig, MetadataEntry, RepoLayout};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn snapshot() -> IssueSnapshot {
        IssueSnapshot {
            number: 11,
            is_pull_request: true,
            submitter: "author1".to_string(),
            updated_at: Some(ts(50)),
            comments: vec![RawComment {
                actor: Some("user1".to_string()),
                body: "same problem here".to_string(),
                created_at: ts(10),
            }],
            files: vec!["lib/modules/cloud/object_store.py".to_string()],
            ..IssueSnapshot::default()
        }
    }

    fn table() -> ComponentTable {
        let mut entries = BTreeMap::new();
        entries.insert(
            "lib/modules/cloud/object_store.py".to_string(),
            MetadataEntry {
                maintainers: vec!["maint1".to_string()],
                support: Some("community".to_string()),
                ..MetadataEntry::default()
            },
        );
        entries.insert(
            "lib/modules/files/archive.py".to_string(),
            MetadataEntry {
                maintainers: vec!["maint2".to_string()],
                support: Some("community".to_string()),
                ..MetadataEntry::default()
            },
        );
        ComponentTable::build(
            vec![
                "lib/modules/cloud/object_store.py".to_string(),
                "lib/modules/files/archive.py".to_string(),
            ],
            entries,
            RepoLayout::default(),
        )
    }

    struct BrokenStore;

    #[async_trait]
    impl TimelineStore for BrokenStore {
        async fn get(&self, _issue_number: u64) -> StoreResult<Option<CachedTimeline>> {
            Err(StoreError::Backend("connection refused".to_string()))
        }

        async fn put(&self, _cached: CachedTimeline) -> StoreResult<()> {
            Err(StoreError::Backend("connection refused".to_string()))
        }

        async fn delete(&self, _issue_number: u64) -> StoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_miss_rebuilds_and_populates_store() {
        let store = MemoryTimelineStore::new();
        let config = TriageConfig::default();
        let snap = snapshot();

        let timeline = load_or_build_timeline(&store, &snap, &config)
            .await
            .unwrap();
        assert_eq!(timeline.count_kind("commented"), 1);
        assert_eq!(store.len(), 1);

        let cached = store.get(snap.number).await.unwrap().unwrap();
        assert_eq!(cached.schema_version, TIMELINE_SCHEMA_VERSION);
        assert_eq!(cached.updated_at, snap.updated_at);
        assert_eq!(cached.timeline, timeline);
    }

    #[tokio::test]
    async fn test_fresh_cache_is_reused() {
        let store = MemoryTimelineStore::new();
        let config = TriageConfig::default();
        let snap = snapshot();

        // Seed an entry newer than the issue, with a marker event the
        // snapshot sources would not produce.
        let marker = Timeline::from_events(vec![Event {
            actor: "maint1".to_string(),
            created_at: ts(5),
            kind: EventKind::Commented {
                body: "same problem here".to_string(),
            },
        }]);
        let cached = CachedTimeline::new(
            snap.number,
            TIMELINE_SCHEMA_VERSION,
            Some(ts(100)),
            marker.clone(),
        )
        .unwrap();
        store.put(cached).await.unwrap();

        let timeline = load_or_build_timeline(&store, &snap, &config)
            .await
            .unwrap();
        assert_eq!(timeline, marker);
    }

    #[tokio::test]
    async fn test_stale_cache_is_rebuilt_and_replaced() {
        let store = MemoryTimelineStore::new();
        let config = TriageConfig::default();
        let snap = snapshot();

        let outdated = CachedTimeline::new(
            snap.number,
            TIMELINE_SCHEMA_VERSION,
            Some(ts(1)),
            Timeline::from_events(vec![]),
        )
        .unwrap();
        store.put(outdated).await.unwrap();

        let timeline = load_or_build_timeline(&store, &snap, &config)
            .await
            .unwrap();
        assert_eq!(timeline.count_kind("commented"), 1);

        let cached = store.get(snap.number).await.unwrap().unwrap();
        assert_eq!(cached.updated_at, Some(ts(50)));
        assert_eq!(cached.timeline, timeline);
    }

    #[tokio::test]
    async fn test_broken_store_still_yields_timeline() {
        let config = TriageConfig::default();
        let snap = snapshot();

        let timeline = load_or_build_timeline(&BrokenStore, &snap, &config)
            .await
            .unwrap();
        assert_eq!(timeline.count_kind("commented"), 1);
    }

    #[tokio::test]
    async fn test_full_pass_applies_component_override() {
        let store = MemoryTimelineStore::new();
        let config = TriageConfig::default();
        let table = table();
        let matcher = Matcher::new(&table, MatchConfig::default());

        let mut snap = snapshot();
        snap.comments.push(RawComment {
            actor: Some("maint1".to_string()),
            body: "!component =lib/modules/files/archive.py".to_string(),
            created_at: ts(20),
        });

        let record = triage_snapshot(&store, &snap, &matcher, &config, ts(100))
            .await
            .unwrap();
        assert_eq!(
            record.component.maintainers,
            vec!["maint2".to_string()],
            "override should re-resolve metadata"
        );
        assert_eq!(store.len(), 1);
    }
}
