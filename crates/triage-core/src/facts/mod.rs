//! Fact derivation engine: combines the timeline, the component match,
//! and tracker-supplied PR state into one [`FactsRecord`].

mod record;
mod revision;
mod shipit;

pub use record::{FactsRecord, StaleReview};
pub use revision::{revision_facts, RevisionFacts};
pub use shipit::{
    automerge_facts, rebuild_facts, shipit_facts, ShipitFacts, REBUILD_MERGE_COMMAND,
};

use chrono::{DateTime, Utc};
use tracing::info;

use triage_domain::{IssueSnapshot, Timeline, TriageConfig};

use crate::component::{MatchResult, RepoLayout};
use crate::history::History;

/// Derive every fact for one issue/PR.
///
/// Pure function of its inputs: no I/O, no shared state, and the same
/// inputs with the same `now` always produce the same record.
pub fn derive_facts(
    snapshot: &IssueSnapshot,
    timeline: &Timeline,
    result: &MatchResult,
    layout: &RepoLayout,
    config: &TriageConfig,
    now: DateTime<Utc>,
) -> FactsRecord {
    let history = History::new(timeline, config);
    let summary = result.summarize(layout, None, &snapshot.new_files);

    let mut maintainers: Vec<String> = config
        .core_team
        .iter()
        .filter(|m| !config.is_bot(m))
        .cloned()
        .collect();
    for maintainer in &summary.maintainers {
        if !maintainers.contains(maintainer) {
            maintainers.push(maintainer.clone());
        }
    }

    let revision = revision_facts(snapshot, &history, &maintainers, config, now);
    let shipit = shipit_facts(snapshot, &history, result, &summary, config);

    let mut record = FactsRecord {
        is_needs_revision: revision.is_needs_revision,
        needs_revision_msgs: revision.needs_revision_msgs,
        is_needs_rebase: revision.is_needs_rebase,
        needs_rebase_msgs: revision.needs_rebase_msgs,
        mergeable: snapshot.mergeable,
        mergeable_state: snapshot.mergeable_state.clone(),
        ci_state: snapshot.ci_state.clone(),
        ci_stale: snapshot.ci_stale,
        has_ci_config: snapshot.has_ci_config,
        changes_requested_by: revision.changes_requested_by,
        stale_reviews: revision.stale_reviews,
        ready_for_review: revision.ready_for_review_date.is_some(),
        ready_for_review_date: revision.ready_for_review_date,
        committer_count: revision.committer_count,
        merge_commits: revision.merge_commits,
        has_commit_mention: revision.has_commit_mention,
        shipit: shipit.shipit,
        supershipit: shipit.supershipit,
        owner_pr: shipit.owner_pr,
        shipit_actors: shipit.shipit_actors,
        shipit_count_core: shipit.count_core,
        shipit_count_maintainer: shipit.count_maintainer,
        shipit_count_community: shipit.count_community,
        shipit_count_other: shipit.count_other,
        automerge: false,
        automerge_msgs: Vec::new(),
        needs_rebuild: false,
        rebuild_run_id: None,
        component: summary,
    };

    let (automerge, automerge_msgs) = automerge_facts(&record, snapshot);
    record.automerge = automerge;
    record.automerge_msgs = automerge_msgs;

    let (needs_rebuild, rebuild_run_id) = rebuild_facts(&record, snapshot);
    record.needs_rebuild = needs_rebuild;
    record.rebuild_run_id = rebuild_run_id;

    info!(
        number = snapshot.number,
        needs_revision = record.is_needs_revision,
        needs_rebase = record.is_needs_rebase,
        shipit = record.shipit,
        automerge = record.automerge,
        "facts derived"
    );
    record
}
