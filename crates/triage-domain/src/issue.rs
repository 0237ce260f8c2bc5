//! Raw issue/PR snapshot supplied by the tracker collaborator.
//!
//! The fetch layer is out of scope; these types describe the shape it
//! must deliver. Each source sequence is ordered-by-fetch and carries
//! kind-specific payloads that the history builder normalizes into
//! [`crate::events::Event`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A native label event as fetched from the tracker timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLabelEvent {
    /// `"labeled"` or `"unlabeled"`.
    pub action: String,
    /// Acting login; `None` for deleted accounts.
    pub actor: Option<String>,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

/// A raw issue comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawComment {
    /// Author login; `None` for deleted accounts.
    pub actor: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A raw code-review submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReview {
    /// Reviewer login; `None` for deleted accounts.
    pub actor: Option<String>,
    /// Tracker-native state string (`APPROVED`, `CHANGES_REQUESTED`, ...).
    pub state: String,
    pub submitted_at: DateTime<Utc>,
    /// Head commit the review was submitted against.
    pub commit_id: Option<String>,
    pub body: Option<String>,
}

/// A raw commit on the pull request branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCommit {
    pub sha: String,
    pub message: String,
    pub committer_email: Option<String>,
    pub committed_at: DateTime<Utc>,
}

/// Everything the pipeline needs about one issue/PR, fetched upfront.
///
/// Mergeability and CI state are carried as the tracker's opaque strings;
/// the fact engine pattern-matches them rather than this layer guessing
/// an enum for every tracker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueSnapshot {
    pub number: u64,
    pub title: String,
    pub is_pull_request: bool,
    /// Whether the author marked the PR as work-in-progress.
    pub is_wip: bool,
    /// Login of the issue/PR author.
    pub submitter: String,
    pub updated_at: Option<DateTime<Utc>>,

    /// Labels currently applied.
    pub labels: Vec<String>,
    /// Declared component section from the issue template, verbatim.
    pub component_text: Option<String>,

    pub label_events: Vec<RawLabelEvent>,
    pub comments: Vec<RawComment>,
    pub reviews: Vec<RawReview>,
    pub commits: Vec<RawCommit>,

    /// Files touched by the PR.
    pub files: Vec<String>,
    /// Files the PR adds (not present on the base branch).
    pub new_files: Vec<String>,
    /// Merge commits present on the PR branch.
    pub merge_commit_shas: Vec<String>,

    pub mergeable: Option<bool>,
    /// Opaque mergeability string: `clean`/`unstable`/`dirty`/`unknown`.
    pub mergeable_state: Option<String>,
    /// Opaque CI result string: `success`/`pending`/`failure`.
    pub ci_state: Option<String>,
    /// Whether the newest full CI run is older than the staleness window.
    pub ci_stale: bool,
    /// Identifier of the newest CI run, for rebuild requests.
    pub ci_run_id: Option<String>,
    /// Whether the PR tree still contains the required CI config file.
    pub has_ci_config: bool,
}

impl IssueSnapshot {
    /// Sha of the current head commit, if any commits were fetched.
    pub fn head_commit_sha(&self) -> Option<&str> {
        self.commits.last().map(|c| c.sha.as_str())
    }

    /// Distinct committer emails across the PR branch.
    pub fn committer_email_count(&self) -> usize {
        let mut emails: Vec<&str> = self
            .commits
            .iter()
            .filter_map(|c| c.committer_email.as_deref())
            .collect();
        emails.sort_unstable();
        emails.dedup();
        emails.len()
    }
}
