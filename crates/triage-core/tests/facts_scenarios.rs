//! End-to-end fact derivation scenarios: raw snapshot sources through
//! timeline construction, component matching, and the facts record.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};

use triage_core::{
    build_timeline, derive_facts, ComponentTable, MatchConfig, Matcher, MetadataEntry, RepoLayout,
};
use triage_domain::{IssueSnapshot, RawComment, RawCommit, RawReview, TriageConfig};

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn comment(actor: &str, body: &str, secs: i64) -> RawComment {
    RawComment {
        actor: Some(actor.to_string()),
        body: body.to_string(),
        created_at: ts(secs),
    }
}

fn table() -> ComponentTable {
    let mut entries = BTreeMap::new();
    entries.insert(
        "lib/modules/cloud/object_store.py".to_string(),
        MetadataEntry {
            maintainers: vec!["maint1".to_string(), "maint2".to_string()],
            support: Some("community".to_string()),
            supershipit: vec!["super1".to_string()],
            ..MetadataEntry::default()
        },
    );
    ComponentTable::build(
        vec!["lib/modules/cloud/object_store.py".to_string()],
        entries,
        RepoLayout::default(),
    )
}

fn community_pr() -> IssueSnapshot {
    IssueSnapshot {
        number: 7,
        is_pull_request: true,
        submitter: "author1".to_string(),
        updated_at: Some(ts(90)),
        files: vec!["lib/modules/cloud/object_store.py".to_string()],
        mergeable: Some(true),
        mergeable_state: Some("clean".to_string()),
        ci_state: Some("success".to_string()),
        has_ci_config: true,
        commits: vec![RawCommit {
            sha: "head1".to_string(),
            message: "retry on throttling errors".to_string(),
            committer_email: Some("author1@example.org".to_string()),
            committed_at: ts(5),
        }],
        ..IssueSnapshot::default()
    }
}

fn facts_for(snap: &IssueSnapshot, config: &TriageConfig) -> triage_core::FactsRecord {
    let table = table();
    let matcher = Matcher::new(&table, MatchConfig::default());
    let timeline = build_timeline(snap).expect("timeline");
    let result = matcher.match_issue(snap);
    derive_facts(snap, &timeline, &result, table.layout(), config, ts(1000))
}

#[test]
fn test_two_maintainer_approvals_reach_automerge() {
    let config = TriageConfig::default();
    let mut snap = community_pr();
    snap.comments = vec![
        comment("maint1", "shipit", 10),
        comment("maint2", "shipit", 20),
    ];

    let record = facts_for(&snap, &config);
    assert!(record.shipit);
    assert_eq!(record.shipit_count_maintainer, 2);
    assert_eq!(
        record.shipit_actors,
        vec!["maint1".to_string(), "maint2".to_string()]
    );
    assert!(record.automerge, "reasons: {:?}", record.automerge_msgs);
}

#[test]
fn test_outstanding_change_request_blocks_merge() {
    let config = TriageConfig::default();
    let mut snap = community_pr();
    snap.reviews = vec![RawReview {
        actor: Some("rev1".to_string()),
        state: "CHANGES_REQUESTED".to_string(),
        submitted_at: ts(30),
        commit_id: Some("head1".to_string()),
        body: None,
    }];

    let record = facts_for(&snap, &config);
    assert!(record.is_needs_revision);
    assert_eq!(record.changes_requested_by, vec!["rev1".to_string()]);
    assert!(!record.automerge);
}

#[test]
fn test_reviewer_approval_comment_stands_down_block() {
    let config = TriageConfig::default();
    let mut snap = community_pr();
    snap.reviews = vec![RawReview {
        actor: Some("rev1".to_string()),
        state: "CHANGES_REQUESTED".to_string(),
        submitted_at: ts(30),
        commit_id: Some("head1".to_string()),
        body: None,
    }];
    snap.comments = vec![comment("rev1", "shipit", 40)];

    let record = facts_for(&snap, &config);
    assert!(!record.is_needs_revision);
    assert!(record.changes_requested_by.is_empty());
}

#[test]
fn test_dirty_merge_state_needs_revision_and_rebase() {
    let config = TriageConfig::default();
    let mut snap = community_pr();
    snap.mergeable = Some(false);
    snap.mergeable_state = Some("dirty".to_string());

    let record = facts_for(&snap, &config);
    assert!(record.is_needs_revision);
    assert!(record.is_needs_rebase);
    assert!(record
        .needs_rebase_msgs
        .iter()
        .any(|m| m.contains("dirty")));
    assert!(!record.automerge);
}

#[test]
fn test_supershipit_review_on_head_commit_ships() {
    let config = TriageConfig::default();
    let mut snap = community_pr();
    snap.reviews = vec![RawReview {
        actor: Some("super1".to_string()),
        state: "APPROVED".to_string(),
        submitted_at: ts(30),
        commit_id: Some("head1".to_string()),
        body: None,
    }];

    let record = facts_for(&snap, &config);
    assert!(record.supershipit);
    assert!(record.shipit);
}

#[test]
fn test_core_team_rebuild_merge_command_ships() {
    let config = TriageConfig::default().with_core_team(vec!["boss".to_string()]);
    let mut snap = community_pr();
    snap.comments = vec![comment("boss", "rebuild_merge", 10)];

    let record = facts_for(&snap, &config);
    assert!(record.shipit);
    assert_eq!(record.shipit_count_core, 0, "command is not a tally vote");
}

#[test]
fn test_new_module_blocks_automerge() {
    let config = TriageConfig::default();
    let mut snap = community_pr();
    snap.new_files = vec!["lib/modules/cloud/object_store.py".to_string()];
    snap.comments = vec![
        comment("maint1", "shipit", 10),
        comment("maint2", "shipit", 20),
    ];

    let record = facts_for(&snap, &config);
    assert!(record.shipit);
    assert!(record.component.is_new_module);
    assert!(!record.automerge);
}

#[test]
fn test_commit_mention_forces_revision() {
    let config = TriageConfig::default();
    let mut snap = community_pr();
    snap.commits[0].message = "cc @maint1 please review".to_string();

    let record = facts_for(&snap, &config);
    assert!(record.has_commit_mention);
    assert!(record.is_needs_revision);
    assert!(!record.automerge);
}

#[test]
fn test_stale_ci_flags_rebuild_not_merge_state() {
    let config = TriageConfig::default();
    let mut snap = community_pr();
    snap.ci_stale = true;
    snap.ci_run_id = Some("run-42".to_string());
    snap.comments = vec![
        comment("maint1", "shipit", 10),
        comment("maint2", "shipit", 20),
    ];

    let record = facts_for(&snap, &config);
    assert!(record.needs_rebuild);
    assert_eq!(record.rebuild_run_id.as_deref(), Some("run-42"));
    assert!(!record.is_needs_revision);
}
