//! Shipit tallying, the supershipit override, and the merge/rebuild
//! gates built on top of the tally.

use std::collections::HashSet;

use tracing::debug;

use triage_domain::{EventKind, IssueSnapshot, TriageConfig};

use crate::component::{ComponentSummary, MatchResult};
use crate::history::History;

use super::record::FactsRecord;

/// Command a core-team member can issue to approve and re-run CI in one
/// step.
pub const REBUILD_MERGE_COMMAND: &str = "rebuild_merge";

/// Whether a comment body contains one of the approval phrases as a
/// whole token.
pub(crate) fn is_approval(body: &str, phrases: &[String]) -> bool {
    body.split_whitespace()
        .any(|token| phrases.iter().any(|p| token == p))
}

/// Approval tally for one PR, bucketed by actor authority.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShipitFacts {
    pub shipit: bool,
    pub supershipit: bool,
    pub owner_pr: bool,
    pub shipit_actors: Vec<String>,
    pub count_core: usize,
    pub count_maintainer: usize,
    pub count_community: usize,
    pub count_other: usize,
}

/// Tally approvals over the timeline.
///
/// A `committed` event starts a new epoch: counters, actor sets, and
/// the approval record all reset, so nothing approved before a push can
/// carry over. Each actor lands in exactly one bucket per epoch,
/// checked in authority order.
pub fn shipit_facts(
    snapshot: &IssueSnapshot,
    history: &History,
    result: &MatchResult,
    summary: &ComponentSummary,
    config: &TriageConfig,
) -> ShipitFacts {
    let mut facts = ShipitFacts::default();
    if !snapshot.is_pull_request {
        return facts;
    }

    facts.owner_pr = !summary.is_new_module
        && summary.maintainers.iter().any(|m| *m == snapshot.submitter);

    let mut counted: HashSet<&str> = HashSet::new();
    let mut approvers: HashSet<&str> = HashSet::new();
    let head_commit = snapshot.head_commit_sha();

    for event in history.timeline() {
        if config.is_bot(&event.actor) {
            continue;
        }
        let actor = event.actor.as_str();

        match &event.kind {
            EventKind::Committed { .. } => {
                facts.count_core = 0;
                facts.count_maintainer = 0;
                facts.count_community = 0;
                facts.count_other = 0;
                facts.shipit_actors.clear();
                counted.clear();
                approvers.clear();
            }
            EventKind::Commented { body } => {
                if actor == snapshot.submitter
                    || !is_approval(body, &config.approval_phrases)
                    || !counted.insert(actor)
                {
                    continue;
                }
                if config.is_core_team(actor) {
                    facts.count_core += 1;
                } else if summary.maintainers.iter().any(|m| m == actor) {
                    facts.count_maintainer += 1;
                } else if summary.namespace_maintainers.iter().any(|m| m == actor) {
                    facts.count_community += 1;
                } else {
                    facts.count_other += 1;
                }
                facts.shipit_actors.push(actor.to_string());
                approvers.insert(actor);
            }
            EventKind::ReviewApproved { commit_id, .. } => {
                // Review approvals feed the supershipit check but not
                // the comment tally.
                if commit_id.as_deref() == head_commit && actor != snapshot.submitter {
                    approvers.insert(actor);
                }
            }
            _ => {}
        }
    }

    let tally = facts.count_core + facts.count_maintainer + facts.count_community;
    facts.shipit = tally > 1 || (tally == 1 && facts.count_other > 2);

    if !facts.shipit {
        let core: Vec<&str> = config.core_team.iter().map(String::as_str).collect();
        let commands = history.get_commands(&core, &[REBUILD_MERGE_COMMAND]);
        if commands.iter().any(|c| c == REBUILD_MERGE_COMMAND) {
            facts.shipit = true;
        }
    }

    facts.supershipit = !result.records.is_empty()
        && result.records.iter().all(|record| {
            record
                .supershipit
                .iter()
                .any(|s| approvers.contains(s.as_str()))
        });
    if facts.supershipit {
        facts.shipit = true;
    }

    debug!(
        shipit = facts.shipit,
        supershipit = facts.supershipit,
        core = facts.count_core,
        maintainer = facts.count_maintainer,
        community = facts.count_community,
        other = facts.count_other,
        "shipit tally"
    );
    facts
}

/// Decide whether the PR can merge without a human, with the reasons it
/// cannot.
///
/// Deliberately conservative: a single-file change to an existing,
/// community-supported module with a green tally and no blocking facts.
pub fn automerge_facts(record: &FactsRecord, snapshot: &IssueSnapshot) -> (bool, Vec<String>) {
    let mut msgs = Vec::new();

    if !snapshot.is_pull_request {
        msgs.push("not a pull request".to_string());
    }
    if snapshot.is_wip {
        msgs.push("work in progress".to_string());
    }
    if !record.merge_commits.is_empty() {
        msgs.push("has merge commits".to_string());
    }
    if record.has_commit_mention {
        msgs.push("mention in commit message".to_string());
    }
    if record.is_needs_revision {
        msgs.push("needs revision".to_string());
    }
    if record.is_needs_rebase {
        msgs.push("needs rebase".to_string());
    }
    if record.mergeable != Some(true) {
        msgs.push("not mergeable".to_string());
    }
    if record.ci_state.as_deref() != Some("success") {
        msgs.push("ci not green".to_string());
    }
    if snapshot.files.len() != 1 {
        msgs.push("touches more than one file".to_string());
    }
    if record.component.is_new_module {
        msgs.push("new module".to_string());
    }
    if !record.component.is_module {
        msgs.push("not a module".to_string());
    }
    if record.component.is_core {
        msgs.push("not community supported".to_string());
    }
    if !record.shipit {
        msgs.push("no shipit".to_string());
    }

    (msgs.is_empty(), msgs)
}

/// Flag a shipit-ready PR whose newest CI run has gone stale, so the
/// policy layer re-triggers CI instead of merging on old results.
pub fn rebuild_facts(record: &FactsRecord, snapshot: &IssueSnapshot) -> (bool, Option<String>) {
    let needs_rebuild = snapshot.is_pull_request
        && record.ci_stale
        && !record.is_needs_revision
        && !record.is_needs_rebase
        && record.has_ci_config
        && record.shipit;
    if needs_rebuild {
        (true, snapshot.ci_run_id.clone())
    } else {
        (false, None)
    }
}
