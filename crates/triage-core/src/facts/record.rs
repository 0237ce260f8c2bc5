//! The facts record: sole output of a triage pass.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::component::ComponentSummary;

/// One reviewer's unanswered change request, aged past the staleness
/// window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaleReview {
    /// Days since the last commit.
    pub age_days: i64,
    /// Days between the change request and the last commit.
    pub delta_days: i64,
    pub review_date: DateTime<Utc>,
    pub commit_date: DateTime<Utc>,
}

/// Every fact derived for one issue/PR in one triage pass.
///
/// # Invariants
///
/// - Fully recomputed each pass; no field is ever patched in place.
/// - Deterministic for a given timeline, match result, and `now`: list
///   fields keep timeline order or are sorted, and `stale_reviews` is a
///   sorted map, so two runs serialize byte-identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactsRecord {
    // Revision and rebase state.
    pub is_needs_revision: bool,
    pub needs_revision_msgs: Vec<String>,
    pub is_needs_rebase: bool,
    pub needs_rebase_msgs: Vec<String>,
    pub mergeable: Option<bool>,
    pub mergeable_state: Option<String>,
    pub ci_state: Option<String>,
    pub ci_stale: bool,
    pub has_ci_config: bool,

    // Review reconciliation.
    pub changes_requested_by: Vec<String>,
    pub stale_reviews: BTreeMap<String, StaleReview>,
    pub ready_for_review: bool,
    pub ready_for_review_date: Option<DateTime<Utc>>,

    // Commit hygiene.
    pub committer_count: usize,
    pub merge_commits: Vec<String>,
    pub has_commit_mention: bool,

    // Shipit tally.
    pub shipit: bool,
    pub supershipit: bool,
    pub owner_pr: bool,
    pub shipit_actors: Vec<String>,
    pub shipit_count_core: usize,
    pub shipit_count_maintainer: usize,
    pub shipit_count_community: usize,
    pub shipit_count_other: usize,

    // Merge and rebuild gates.
    pub automerge: bool,
    pub automerge_msgs: Vec<String>,
    pub needs_rebuild: bool,
    pub rebuild_run_id: Option<String>,

    // Resolved component view.
    pub component: ComponentSummary,
}
