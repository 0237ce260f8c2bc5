//! Cache invalidation predicate.
//!
//! A persisted timeline is reused only when every check passes; any
//! failure is recovered locally by a full rebuild from source, never a
//! partial patch, and never surfaced to the caller as an error.

use chrono::{DateTime, Utc};
use tracing::debug;

use triage_domain::{EventKind, TIMELINE_SCHEMA_VERSION};

use crate::store::CachedTimeline;

/// Current state of the issue, against which a cache entry is validated.
#[derive(Debug, Clone)]
pub struct CacheCheck<'a> {
    pub current_updated_at: Option<DateTime<Utc>>,
    pub current_comment_count: usize,
    pub current_labels: &'a [String],
    /// Label whose presence requires a matching `labeled` event in the
    /// cache (guards against a known class of event-delivery gaps).
    pub needs_info_label: &'a str,
}

/// Why a cache entry was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    SchemaVersion { cached: u32, current: u32 },
    OutOfDate,
    TruncatedEvents,
    MissingNeedsInfoEvent,
}

/// Outcome of validating a cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheVerdict {
    Fresh,
    Stale(StaleReason),
}

impl CacheVerdict {
    pub fn is_fresh(&self) -> bool {
        matches!(self, CacheVerdict::Fresh)
    }
}

/// Validate a cached timeline against the issue's current state.
///
/// All four checks must hold for reuse:
/// 1. the schema version tag matches the current one;
/// 2. the cached `updated_at` is at least the issue's current one;
/// 3. cached `commented` events plus current labels reach the sanity
///    floor of current comments plus current labels (truncation guard);
/// 4. when the needs-info label is currently applied, the cache holds at
///    least one `labeled` event for it.
pub fn validate_cache(cached: &CachedTimeline, check: &CacheCheck<'_>) -> CacheVerdict {
    if cached.schema_version != TIMELINE_SCHEMA_VERSION {
        debug!(
            issue = cached.issue_number,
            cached_version = cached.schema_version,
            "timeline cache stale: schema version"
        );
        return CacheVerdict::Stale(StaleReason::SchemaVersion {
            cached: cached.schema_version,
            current: TIMELINE_SCHEMA_VERSION,
        });
    }

    match (cached.updated_at, check.current_updated_at) {
        (Some(cached_at), Some(current_at)) if cached_at >= current_at => {}
        (_, None) => {}
        _ => {
            debug!(
                issue = cached.issue_number,
                "timeline cache stale: issue updated since cache write"
            );
            return CacheVerdict::Stale(StaleReason::OutOfDate);
        }
    }

    let floor = check.current_comment_count + check.current_labels.len();
    let have = cached.timeline.count_kind("commented") + check.current_labels.len();
    if have < floor {
        debug!(
            issue = cached.issue_number,
            have, floor, "timeline cache stale: event count below floor"
        );
        return CacheVerdict::Stale(StaleReason::TruncatedEvents);
    }

    if check
        .current_labels
        .iter()
        .any(|l| l == check.needs_info_label)
    {
        let seen = cached.timeline.iter().any(|e| {
            matches!(&e.kind, EventKind::Labeled { label } if label == check.needs_info_label)
        });
        if !seen {
            debug!(
                issue = cached.issue_number,
                label = check.needs_info_label,
                "timeline cache stale: applied label has no labeled event"
            );
            return CacheVerdict::Stale(StaleReason::MissingNeedsInfoEvent);
        }
    }

    CacheVerdict::Fresh
}
