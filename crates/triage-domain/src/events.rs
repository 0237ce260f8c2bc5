//! Normalized tracker events and the merged timeline.
//!
//! Every event source (native timeline, comments, review submissions,
//! commit metadata) is converted into the single [`Event`] shape before
//! merging. The [`Timeline`] is the authoritative, time-ordered log the
//! rest of the pipeline queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TriageError};

/// Schema version stamped on persisted timelines.
///
/// Bump whenever the serialized shape of [`Event`] changes; any cached
/// timeline carrying an older version is rebuilt from source.
pub const TIMELINE_SCHEMA_VERSION: u32 = 2;

// ---------------------------------------------------------------------------
// Review verdicts
// ---------------------------------------------------------------------------

/// Final verdict of a code-review submission.
///
/// `PENDING` submissions never reach the timeline, so they have no
/// variant here; [`ReviewVerdict::parse`] returns `None` for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
}

impl ReviewVerdict {
    /// Parse a tracker-supplied review state string.
    ///
    /// Returns `Ok(None)` for `PENDING` (discarded, not an error) and
    /// `Err(TriageError::UnknownReviewState)` for anything unrecognized.
    /// Unknown states are fatal rather than defaulted: downstream merge
    /// decisions must never act on a guessed review verdict.
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        match raw {
            "APPROVED" => Ok(Some(ReviewVerdict::Approved)),
            "CHANGES_REQUESTED" => Ok(Some(ReviewVerdict::ChangesRequested)),
            "COMMENTED" => Ok(Some(ReviewVerdict::Commented)),
            "DISMISSED" => Ok(Some(ReviewVerdict::Dismissed)),
            "PENDING" => Ok(None),
            other => Err(TriageError::UnknownReviewState {
                state: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Kind-specific payload of a normalized event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    Labeled {
        label: String,
    },
    Unlabeled {
        label: String,
    },
    Commented {
        body: String,
    },
    Committed {
        sha: String,
        message: String,
        committer_email: Option<String>,
    },
    ReviewApproved {
        commit_id: Option<String>,
        body: Option<String>,
    },
    ReviewChangesRequested {
        commit_id: Option<String>,
        body: Option<String>,
    },
    ReviewComment {
        commit_id: Option<String>,
        body: Option<String>,
    },
    ReviewDismissed {
        commit_id: Option<String>,
        body: Option<String>,
    },
}

impl EventKind {
    /// Stable name of this kind, matching the serialized tag.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Labeled { .. } => "labeled",
            EventKind::Unlabeled { .. } => "unlabeled",
            EventKind::Commented { .. } => "commented",
            EventKind::Committed { .. } => "committed",
            EventKind::ReviewApproved { .. } => "review_approved",
            EventKind::ReviewChangesRequested { .. } => "review_changes_requested",
            EventKind::ReviewComment { .. } => "review_comment",
            EventKind::ReviewDismissed { .. } => "review_dismissed",
        }
    }

    /// Build the review event kind for a parsed verdict.
    pub fn from_review(
        verdict: ReviewVerdict,
        commit_id: Option<String>,
        body: Option<String>,
    ) -> Self {
        match verdict {
            ReviewVerdict::Approved => EventKind::ReviewApproved { commit_id, body },
            ReviewVerdict::ChangesRequested => EventKind::ReviewChangesRequested { commit_id, body },
            ReviewVerdict::Commented => EventKind::ReviewComment { commit_id, body },
            ReviewVerdict::Dismissed => EventKind::ReviewDismissed { commit_id, body },
        }
    }
}

/// A single normalized event in an issue's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Login of the acting identity.
    pub actor: String,
    /// When the event occurred at the tracker.
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    /// Label name, for `labeled`/`unlabeled` events.
    pub fn label(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Labeled { label } | EventKind::Unlabeled { label } => Some(label),
            _ => None,
        }
    }

    /// Text body, for comments and review submissions that carry one.
    pub fn body(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Commented { body } => Some(body),
            EventKind::ReviewApproved { body, .. }
            | EventKind::ReviewChangesRequested { body, .. }
            | EventKind::ReviewComment { body, .. }
            | EventKind::ReviewDismissed { body, .. } => body.as_deref(),
            _ => None,
        }
    }

    /// Reviewed commit id, for review events.
    pub fn review_commit_id(&self) -> Option<&str> {
        match &self.kind {
            EventKind::ReviewApproved { commit_id, .. }
            | EventKind::ReviewChangesRequested { commit_id, .. }
            | EventKind::ReviewComment { commit_id, .. }
            | EventKind::ReviewDismissed { commit_id, .. } => commit_id.as_deref(),
            _ => None,
        }
    }

    /// Review verdict, for review events.
    pub fn review_verdict(&self) -> Option<ReviewVerdict> {
        match &self.kind {
            EventKind::ReviewApproved { .. } => Some(ReviewVerdict::Approved),
            EventKind::ReviewChangesRequested { .. } => Some(ReviewVerdict::ChangesRequested),
            EventKind::ReviewComment { .. } => Some(ReviewVerdict::Commented),
            EventKind::ReviewDismissed { .. } => Some(ReviewVerdict::Dismissed),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

/// Merged, time-ordered event log for one issue or pull request.
///
/// # Invariants
///
/// - Events are sorted ascending by `created_at`; ties keep the order in
///   which sources were merged (stable sort).
/// - A timeline is immutable once built. Staleness is handled by a full
///   rebuild, never an in-place patch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    events: Vec<Event>,
}

impl Timeline {
    /// Build a timeline from already-normalized events.
    ///
    /// Sorting is stable, so events with identical timestamps keep their
    /// source-insertion order.
    pub fn from_events(mut events: Vec<Event>) -> Self {
        events.sort_by_key(|e| e.created_at);
        Timeline { events }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    /// Count events of one kind, by serialized kind name.
    pub fn count_kind(&self, kind: &str) -> usize {
        self.events.iter().filter(|e| e.kind.name() == kind).count()
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn labeled(actor: &str, label: &str, secs: i64) -> Event {
        Event {
            actor: actor.to_string(),
            created_at: ts(secs),
            kind: EventKind::Labeled {
                label: label.to_string(),
            },
        }
    }

    #[test]
    fn test_timeline_sorts_by_timestamp() {
        let tl = Timeline::from_events(vec![
            labeled("a", "one", 30),
            labeled("b", "two", 10),
            labeled("c", "three", 20),
        ]);
        let order: Vec<&str> = tl.iter().map(|e| e.actor.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_timeline_stable_on_ties() {
        let tl = Timeline::from_events(vec![
            labeled("first", "x", 10),
            labeled("second", "x", 10),
        ]);
        let order: Vec<&str> = tl.iter().map(|e| e.actor.as_str()).collect();
        assert_eq!(order, vec!["first", "second"]);
    }

    #[test]
    fn test_review_verdict_parse_known_states() {
        assert_eq!(
            ReviewVerdict::parse("APPROVED").unwrap(),
            Some(ReviewVerdict::Approved)
        );
        assert_eq!(
            ReviewVerdict::parse("CHANGES_REQUESTED").unwrap(),
            Some(ReviewVerdict::ChangesRequested)
        );
        assert_eq!(ReviewVerdict::parse("PENDING").unwrap(), None);
    }

    #[test]
    fn test_review_verdict_parse_unknown_is_fatal() {
        let err = ReviewVerdict::parse("SELF_REQUESTED").unwrap_err();
        assert!(matches!(
            err,
            TriageError::UnknownReviewState { ref state } if state == "SELF_REQUESTED"
        ));
    }

    #[test]
    fn test_event_serde_round_trip() {
        let event = Event {
            actor: "reviewer1".to_string(),
            created_at: ts(100),
            kind: EventKind::ReviewChangesRequested {
                commit_id: Some("abc123".to_string()),
                body: Some("please split this".to_string()),
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"review_changes_requested\""));
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_count_kind() {
        let tl = Timeline::from_events(vec![
            labeled("a", "x", 1),
            labeled("a", "y", 2),
            Event {
                actor: "a".to_string(),
                created_at: ts(3),
                kind: EventKind::Commented {
                    body: "hi".to_string(),
                },
            },
        ]);
        assert_eq!(tl.count_kind("labeled"), 2);
        assert_eq!(tl.count_kind("commented"), 1);
        assert_eq!(tl.count_kind("committed"), 0);
    }
}
