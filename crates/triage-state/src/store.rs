//! Timeline store trait definitions.
//!
//! The pipeline persists rebuilt timelines so subsequent passes can skip
//! the merge step when nothing changed. The backend is deliberately
//! unspecified; an in-memory fake is provided for testing via the
//! `fakes` module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use triage_domain::Timeline;

use crate::error::{StoreError, StoreResult};

// ---------------------------------------------------------------------------
// TimelineDigest
// ---------------------------------------------------------------------------

/// Content digest of a serialized timeline (SHA-256 hex string).
///
/// The inner field is private to guarantee the string is always valid
/// lowercase hex produced by `of_timeline` or validated via
/// `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimelineDigest(String);

impl TimelineDigest {
    /// Compute the digest of a timeline's canonical JSON form.
    ///
    /// Timelines are pure functions of their source events, so two
    /// rebuilds from identical sources always produce the same digest.
    pub fn of_timeline(timeline: &Timeline) -> StoreResult<Self> {
        use sha2::Digest;
        let bytes = serde_json::to_vec(timeline)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(TimelineDigest(hex::encode(hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for TimelineDigest {
    type Error = StoreError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StoreError::InvalidDigest { digest: s });
        }
        Ok(TimelineDigest(s.to_ascii_lowercase()))
    }
}

impl std::fmt::Display for TimelineDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// CachedTimeline
// ---------------------------------------------------------------------------

/// A persisted timeline plus the metadata the invalidation predicate
/// checks before reuse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedTimeline {
    pub issue_number: u64,
    /// Schema version the timeline was serialized under.
    pub schema_version: u32,
    /// The issue's `updated_at` as seen when the cache entry was written.
    pub updated_at: Option<DateTime<Utc>>,
    pub timeline: Timeline,
    pub digest: TimelineDigest,
}

impl CachedTimeline {
    /// Wrap a freshly built timeline for persistence.
    pub fn new(
        issue_number: u64,
        schema_version: u32,
        updated_at: Option<DateTime<Utc>>,
        timeline: Timeline,
    ) -> StoreResult<Self> {
        let digest = TimelineDigest::of_timeline(&timeline)?;
        Ok(CachedTimeline {
            issue_number,
            schema_version,
            updated_at,
            timeline,
            digest,
        })
    }
}

// ---------------------------------------------------------------------------
// TimelineStore
// ---------------------------------------------------------------------------

/// Timeline cache store.
///
/// Guarantees:
/// - `get` after `put` returns the stored entry for that issue number.
/// - A miss is `Ok(None)`, never an error.
/// - Concurrent writers may race; last-writer-wins is acceptable because
///   rebuilds are idempotent pure functions of the same source events.
#[async_trait]
pub trait TimelineStore: Send + Sync {
    /// Fetch the cached timeline for an issue, if any.
    async fn get(&self, issue_number: u64) -> StoreResult<Option<CachedTimeline>>;

    /// Store (or replace) the cached timeline for an issue.
    async fn put(&self, cached: CachedTimeline) -> StoreResult<()>;

    /// Drop the cached timeline for an issue. No-op if absent.
    async fn delete(&self, issue_number: u64) -> StoreResult<()>;
}
