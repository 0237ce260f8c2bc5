//! Timeline construction from raw tracker sources.
//!
//! Four independently fetched sequences are normalized into the common
//! event shape and merge-sorted by timestamp: native label events,
//! comments, code-review submissions, and commit metadata. Events from
//! deleted accounts carry no actor and are skipped.

use tracing::debug;

use triage_domain::{Event, EventKind, IssueSnapshot, Result, ReviewVerdict, Timeline, TriageError};

/// Build the merged timeline for one issue/PR snapshot.
///
/// Review submissions in `PENDING` state are discarded; any other
/// unrecognized review state aborts the build (the downstream state
/// machines must not run against guessed verdicts). Label events with an
/// action other than `labeled`/`unlabeled` are malformed.
pub fn build_timeline(snapshot: &IssueSnapshot) -> Result<Timeline> {
    let mut events = Vec::with_capacity(
        snapshot.label_events.len()
            + snapshot.comments.len()
            + snapshot.reviews.len()
            + snapshot.commits.len(),
    );

    for raw in &snapshot.label_events {
        let Some(actor) = raw.actor.clone() else {
            continue;
        };
        let kind = match raw.action.as_str() {
            "labeled" => EventKind::Labeled {
                label: raw.label.clone(),
            },
            "unlabeled" => EventKind::Unlabeled {
                label: raw.label.clone(),
            },
            other => {
                return Err(TriageError::MalformedEvent {
                    kind: other.to_string(),
                    detail: format!("unsupported label event action for {:?}", raw.label),
                })
            }
        };
        events.push(Event {
            actor,
            created_at: raw.created_at,
            kind,
        });
    }

    for raw in &snapshot.comments {
        let Some(actor) = raw.actor.clone() else {
            continue;
        };
        events.push(Event {
            actor,
            created_at: raw.created_at,
            kind: EventKind::Commented {
                body: raw.body.clone(),
            },
        });
    }

    for raw in &snapshot.reviews {
        let Some(actor) = raw.actor.clone() else {
            continue;
        };
        let Some(verdict) = ReviewVerdict::parse(&raw.state)? else {
            continue;
        };
        events.push(Event {
            actor,
            created_at: raw.submitted_at,
            kind: EventKind::from_review(verdict, raw.commit_id.clone(), raw.body.clone()),
        });
    }

    for raw in &snapshot.commits {
        events.push(Event {
            actor: snapshot.submitter.clone(),
            created_at: raw.committed_at,
            kind: EventKind::Committed {
                sha: raw.sha.clone(),
                message: raw.message.clone(),
                committer_email: raw.committer_email.clone(),
            },
        });
    }

    debug!(
        issue = snapshot.number,
        events = events.len(),
        "merged timeline sources"
    );

    Ok(Timeline::from_events(events))
}
