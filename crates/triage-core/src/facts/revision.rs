//! Needs-revision / needs-rebase derivation.
//!
//! Mergeability drives the initial state; a `clean` PR instead replays
//! the timeline so that the latest maintainer or submitter toggle wins.
//! Review reconciliation and staleness run only on clean PRs, where the
//! review record is trustworthy.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::debug;

use triage_domain::{EventKind, IssueSnapshot, ReviewVerdict, TriageConfig};

use crate::history::History;

use super::record::StaleReview;
use super::shipit::is_approval;

const READY_FOR_REVIEW: &str = "ready_for_review";

/// Revision, rebase, and review facts for one PR.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RevisionFacts {
    pub is_needs_revision: bool,
    pub needs_revision_msgs: Vec<String>,
    pub is_needs_rebase: bool,
    pub needs_rebase_msgs: Vec<String>,
    pub changes_requested_by: Vec<String>,
    pub stale_reviews: BTreeMap<String, StaleReview>,
    pub ready_for_review_date: Option<DateTime<Utc>>,
    pub committer_count: usize,
    pub merge_commits: Vec<String>,
    pub has_commit_mention: bool,
}

/// Final folded review state for one reviewer.
#[derive(Debug, Clone, PartialEq)]
struct ReviewState {
    verdict: ReviewVerdict,
    submitted_at: DateTime<Utc>,
    commit_id: Option<String>,
}

/// Derive revision/rebase facts for `snapshot`.
///
/// `maintainers` is the merged authority set (core team plus component
/// maintainers) whose toggles move the revision state.
pub fn revision_facts(
    snapshot: &IssueSnapshot,
    history: &History,
    maintainers: &[String],
    config: &TriageConfig,
    now: DateTime<Utc>,
) -> RevisionFacts {
    let mut facts = RevisionFacts::default();
    if !snapshot.is_pull_request {
        return facts;
    }

    let mstate = snapshot.mergeable_state.as_deref().unwrap_or("unknown");
    let ci_state = snapshot.ci_state.as_deref();
    debug!(mergeable_state = mstate, ci_state = ?ci_state, "revision inputs");

    let mut reviews: BTreeMap<&str, ReviewState> = BTreeMap::new();

    if mstate != "clean" {
        if ci_state == Some("failure") {
            facts.is_needs_revision = true;
            facts.needs_revision_msgs.push("ci failure".to_string());
        }
        match mstate {
            "dirty" => {
                facts.is_needs_revision = true;
                facts.is_needs_rebase = true;
                facts
                    .needs_revision_msgs
                    .push("mergeable state is dirty".to_string());
                facts
                    .needs_rebase_msgs
                    .push("mergeable state is dirty".to_string());
            }
            "unknown" => {
                // Tests still running leave the state undecided; wait.
                if ci_state != Some("pending") {
                    facts.is_needs_revision = true;
                    facts.is_needs_rebase = true;
                    facts
                        .needs_revision_msgs
                        .push("mergeable state is unknown".to_string());
                    facts
                        .needs_rebase_msgs
                        .push("mergeable state is unknown".to_string());
                }
            }
            "unstable" => {
                // Damp label churn while a rerun is in flight.
                if ci_state == Some("pending")
                    && snapshot.labels.iter().any(|l| *l == config.revision_label)
                {
                    facts.is_needs_revision = true;
                    facts
                        .needs_revision_msgs
                        .push("keep label until tests finish".to_string());
                }
            }
            _ => {}
        }
    } else {
        walk_clean_timeline(snapshot, history, maintainers, config, &mut facts);
        reviews = fold_reviews(snapshot, history);

        if !reviews.is_empty() {
            let outstanding = outstanding_change_requests(
                &reviews,
                snapshot,
                history,
                config,
                facts.ready_for_review_date,
            );
            if !outstanding.is_empty() {
                facts.is_needs_revision = true;
                facts
                    .needs_revision_msgs
                    .push(format!("outstanding reviews: {}", outstanding.join(",")));
                facts.changes_requested_by = outstanding;
            }
        }
    }

    if !snapshot.merge_commit_shas.is_empty() {
        facts.is_needs_rebase = true;
        for sha in &snapshot.merge_commit_shas {
            facts.merge_commits.push(sha.clone());
            facts.needs_rebase_msgs.push(format!("merge commit {sha}"));
        }
    }

    facts.committer_count = snapshot.committer_email_count();

    for commit in &snapshot.commits {
        let mentioned = commit
            .message
            .split_whitespace()
            .any(|w| w.starts_with('@') && !w.ends_with('@'));
        if mentioned {
            facts.has_commit_mention = true;
            facts.is_needs_revision = true;
            facts
                .needs_revision_msgs
                .push("@ in commit message".to_string());
            break;
        }
    }

    if !snapshot.has_ci_config {
        facts.is_needs_rebase = true;
        facts
            .needs_rebase_msgs
            .push("missing ci config".to_string());
    }

    if !reviews.is_empty() {
        facts.stale_reviews = stale_reviews(&reviews, history, config, now);
    }

    debug!(
        needs_revision = facts.is_needs_revision,
        needs_rebase = facts.is_needs_rebase,
        "revision facts"
    );
    facts
}

/// Replay maintainer and submitter toggles over a clean PR's timeline.
fn walk_clean_timeline(
    snapshot: &IssueSnapshot,
    history: &History,
    maintainers: &[String],
    config: &TriageConfig,
    facts: &mut RevisionFacts,
) {
    let mut has_set: HashSet<&str> = HashSet::new();

    for event in history.timeline() {
        if config.is_bot(&event.actor) {
            continue;
        }
        let actor = event.actor.as_str();

        if maintainers.iter().any(|m| m == actor) && actor != snapshot.submitter {
            match &event.kind {
                EventKind::Labeled { label } if *label == config.revision_label => {
                    facts.is_needs_revision = true;
                    facts.needs_revision_msgs.push(format!("[{actor}] labeled"));
                    has_set.insert(actor);
                    continue;
                }
                EventKind::Unlabeled { label } if *label == config.revision_label => {
                    facts.is_needs_revision = false;
                    facts
                        .needs_revision_msgs
                        .push(format!("[{actor}] unlabeled"));
                    continue;
                }
                EventKind::Commented { body } => {
                    let negated = format!("!{}", config.revision_label);
                    if body.contains(&negated) {
                        facts.is_needs_revision = false;
                        facts
                            .needs_revision_msgs
                            .push(format!("[{actor}] {negated}"));
                        continue;
                    }
                    if body.contains(&config.revision_label) {
                        facts.is_needs_revision = true;
                        facts
                            .needs_revision_msgs
                            .push(format!("[{actor}] {}", config.revision_label));
                        has_set.insert(actor);
                        continue;
                    }
                    if is_approval(body, &config.approval_phrases) && has_set.remove(actor) {
                        // The setter withdrew; clear only when nobody
                        // else still holds the state.
                        if has_set.is_empty() {
                            facts.is_needs_revision = false;
                            facts
                                .needs_revision_msgs
                                .push(format!("[{actor}] approval clears"));
                        }
                        continue;
                    }
                }
                _ => {}
            }
        }

        if actor == snapshot.submitter {
            if let EventKind::Commented { body } = &event.kind {
                if body.contains(READY_FOR_REVIEW) || is_approval(body, &config.approval_phrases) {
                    let later = facts
                        .ready_for_review_date
                        .map_or(true, |d| event.created_at > d);
                    if later {
                        facts.ready_for_review_date = Some(event.created_at);
                    }
                    facts.is_needs_revision = false;
                    facts
                        .needs_revision_msgs
                        .push(format!("[{actor}] ready for review"));
                }
            }
        }
    }
}

/// Fold each reviewer's submissions into one final state.
///
/// `CHANGES_REQUESTED` and `APPROVED` overwrite; `COMMENTED` never
/// downgrades an open change request; `DISMISSED` collapses to
/// `COMMENTED`. The submitter's self-reviews are skipped.
fn fold_reviews<'a>(
    snapshot: &'a IssueSnapshot,
    history: &History<'a>,
) -> BTreeMap<&'a str, ReviewState> {
    let mut reviews: BTreeMap<&str, ReviewState> = BTreeMap::new();

    for event in history.timeline() {
        let Some(verdict) = event.review_verdict() else {
            continue;
        };
        if event.actor == snapshot.submitter {
            continue;
        }
        let state = ReviewState {
            verdict: match verdict {
                ReviewVerdict::Dismissed => ReviewVerdict::Commented,
                other => other,
            },
            submitted_at: event.created_at,
            commit_id: event.review_commit_id().map(str::to_string),
        };
        match verdict {
            ReviewVerdict::Approved | ReviewVerdict::ChangesRequested => {
                reviews.insert(&event.actor, state);
            }
            ReviewVerdict::Commented | ReviewVerdict::Dismissed => {
                let blocked = reviews
                    .get(event.actor.as_str())
                    .is_some_and(|r| r.verdict == ReviewVerdict::ChangesRequested);
                if !blocked {
                    reviews.insert(&event.actor, state);
                }
            }
        }
    }

    reviews
}

/// Reviewers whose change request is still in force.
fn outstanding_change_requests(
    reviews: &BTreeMap<&str, ReviewState>,
    snapshot: &IssueSnapshot,
    history: &History,
    config: &TriageConfig,
    ready_for_review: Option<DateTime<Utc>>,
) -> Vec<String> {
    let last_commit = snapshot.head_commit_sha();
    let mut outstanding = Vec::new();

    for (actor, review) in reviews {
        if review.verdict != ReviewVerdict::ChangesRequested {
            continue;
        }

        // A later approval comment from the reviewer stands down the
        // review.
        let approved_later = history.timeline().iter().any(|e| {
            e.actor == *actor
                && matches!(&e.kind, EventKind::Commented { body }
                    if is_approval(body, &config.approval_phrases))
                && e.created_at > review.submitted_at
        });
        if approved_later {
            continue;
        }

        // Submitter declared ready and pushed new work since the review.
        if let Some(rfr) = ready_for_review {
            let head_moved = review.commit_id.as_deref() != last_commit;
            if head_moved && review.submitted_at < rfr {
                continue;
            }
        }

        outstanding.push((*actor).to_string());
    }

    outstanding.sort_unstable();
    outstanding
}

/// Change requests that predate the last commit and have aged out.
fn stale_reviews(
    reviews: &BTreeMap<&str, ReviewState>,
    history: &History,
    config: &TriageConfig,
    now: DateTime<Utc>,
) -> BTreeMap<String, StaleReview> {
    let mut stale = BTreeMap::new();

    let Some(lc_date) = history
        .timeline()
        .iter()
        .rev()
        .find(|e| matches!(e.kind, EventKind::Committed { .. }))
        .map(|e| e.created_at)
    else {
        return stale;
    };

    for (actor, review) in reviews {
        if review.verdict != ReviewVerdict::ChangesRequested {
            continue;
        }

        let mut last_request: Option<DateTime<Utc>> = None;
        for event in history.timeline() {
            if event.actor != *actor {
                continue;
            }
            match &event.kind {
                EventKind::ReviewChangesRequested { .. } => {
                    if last_request.map_or(true, |d| d < event.created_at) {
                        last_request = Some(event.created_at);
                    }
                }
                EventKind::Commented { body }
                    if is_approval(body, &config.approval_phrases) =>
                {
                    if last_request.is_some_and(|d| d < event.created_at) {
                        last_request = None;
                    }
                }
                _ => {}
            }
        }

        if let Some(lrd) = last_request {
            let age = (now - lc_date).num_days();
            if lc_date > lrd && age > config.stale_review_days {
                stale.insert(
                    (*actor).to_string(),
                    StaleReview {
                        age_days: age,
                        delta_days: (lc_date - lrd).num_days(),
                        review_date: lrd,
                        commit_date: lc_date,
                    },
                );
            }
        }
    }

    stale
}
