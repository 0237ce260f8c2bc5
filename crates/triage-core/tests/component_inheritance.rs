//! Component table inheritance exercised through the public matcher
//! surface: directory metadata flowing to files, summary reduction, and
//! the blacklist short-circuit.

use std::collections::BTreeMap;

use triage_core::{ComponentTable, MatchConfig, MatchStrategy, Matcher, MetadataEntry, RepoLayout};

fn entries() -> BTreeMap<String, MetadataEntry> {
    let mut entries = BTreeMap::new();
    entries.insert(
        "lib/modules".to_string(),
        MetadataEntry {
            support: Some("community".to_string()),
            ..MetadataEntry::default()
        },
    );
    entries.insert(
        "lib/modules/cloud".to_string(),
        MetadataEntry {
            maintainers: vec!["teamlead".to_string()],
            ignored: vec!["gone_user".to_string()],
            ..MetadataEntry::default()
        },
    );
    entries.insert(
        "lib/modules/cloud/object_store.py".to_string(),
        MetadataEntry {
            maintainers: vec!["maint1".to_string(), "gone_user".to_string()],
            keywords: vec!["object storage".to_string()],
            ..MetadataEntry::default()
        },
    );
    entries.insert(
        "lib/modules/cloud/block_store.py".to_string(),
        MetadataEntry {
            maintainers: vec!["maint3".to_string()],
            support: Some("certified".to_string()),
            ..MetadataEntry::default()
        },
    );
    entries
}

fn table() -> ComponentTable {
    ComponentTable::build(
        vec![
            "lib/modules/cloud/object_store.py".to_string(),
            "lib/modules/cloud/block_store.py".to_string(),
        ],
        entries(),
        RepoLayout::default(),
    )
}

#[test]
fn test_directory_metadata_flows_to_file() {
    let table = table();
    let record = table.record_for("lib/modules/cloud/object_store.py");

    assert!(record.maintainers.contains(&"maint1".to_string()));
    assert!(record.maintainers.contains(&"teamlead".to_string()));
    assert!(
        !record.maintainers.contains(&"gone_user".to_string()),
        "ignored identities are removed after inheritance"
    );
    assert!(record
        .maintainers_keys
        .contains(&"lib/modules/cloud".to_string()));
    assert!(record
        .maintainers_keys
        .contains(&"lib/modules/cloud/object_store.py".to_string()));
}

#[test]
fn test_support_comes_from_nearest_declaring_ancestor() {
    let table = table();
    let inherited = table.record_for("lib/modules/cloud/object_store.py");
    assert_eq!(inherited.support, "community");

    let declared = table.record_for("lib/modules/cloud/block_store.py");
    assert_eq!(declared.support, "certified");
}

#[test]
fn test_namespace_maintainers_span_sibling_files() {
    let table = table();
    let record = table.record_for("lib/modules/cloud/object_store.py");
    assert_eq!(record.namespace.as_deref(), Some("cloud"));
    assert!(record
        .namespace_maintainers
        .contains(&"maint3".to_string()));
}

#[test]
fn test_path_segments_become_labels() {
    let table = table();
    let record = table.record_for("lib/modules/cloud/object_store.py");
    assert!(record.labels.contains(&"cloud".to_string()));
    assert!(record.labels.contains(&"object_store".to_string()));
}

#[test]
fn test_summary_merges_across_matched_files() {
    let table = table();
    let matcher = Matcher::new(&table, MatchConfig::default());
    let files = vec![
        "lib/modules/cloud/object_store.py".to_string(),
        "lib/modules/cloud/block_store.py".to_string(),
    ];
    let result = matcher.match_files(&files, MatchStrategy::PullRequestFiles);
    let summary = result.summarize(table.layout(), None, &[]);

    assert!(summary.maintainers.contains(&"maint1".to_string()));
    assert!(summary.maintainers.contains(&"maint3".to_string()));
    assert_eq!(
        summary.support,
        vec!["certified".to_string(), "community".to_string()]
    );
    assert!(summary.is_module);
    assert!(summary.is_multi_module);
    assert!(
        summary.is_core,
        "a certified file in the set lifts it out of community-only"
    );
    assert!(!summary.missing_maintainers);
}

#[test]
fn test_keyword_exact_resolves_component_text() {
    let table = table();
    let matcher = Matcher::new(&table, MatchConfig::default());
    let result = matcher.match_component_text("bucket uploads fail", "object storage");

    assert_eq!(result.strategies, vec![MatchStrategy::KeywordExact]);
    assert_eq!(
        result.filenames(),
        vec!["lib/modules/cloud/object_store.py"]
    );
}

#[test]
fn test_blacklisted_component_text_matches_nothing() {
    let table = table();
    let matcher = Matcher::new(&table, MatchConfig::default());
    let result = matcher.match_component_text("everything is broken", "core");

    assert!(result.records.is_empty());
    assert!(result.strategies.is_empty());
}

#[test]
fn test_unmatched_file_carries_missing_metadata_marker() {
    let table = table();
    let matcher = Matcher::new(&table, MatchConfig::default());
    let files = vec!["lib/modules/cloud/brand_new.py".to_string()];
    let result = matcher.match_files(&files, MatchStrategy::PullRequestFiles);
    let summary = result.summarize(table.layout(), None, &files);

    assert!(summary.missing_maintainers);
    assert!(summary.is_new_module);
}
