//! Component metadata table with build-time inheritance.
//!
//! Ownership metadata is declared at arbitrary granularity: a single
//! file, or any path prefix. [`ComponentTable::build`] resolves all
//! inheritance up front over a sorted prefix index, so per-file lookups
//! at match time are plain map reads and never re-walk the tree.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Where the conventional repository subtrees live.
///
/// Classification flags and namespace derivation key off these
/// prefixes; they are configuration, not constants, because forks lay
/// their trees out differently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoLayout {
    /// Root of the module tree.
    pub module_root: String,
    /// Root of the shared module-utility tree.
    pub module_utils_root: String,
    /// Root of the plugin tree.
    pub plugin_root: String,
    /// Root of the integration-test target tree.
    pub test_target_root: String,
    /// Prefix the runtime loader prepends to module files it copies
    /// into scratch directories; stripped when mapping traceback paths
    /// back to the repository.
    pub loader_prefix: String,
}

impl Default for RepoLayout {
    fn default() -> Self {
        RepoLayout {
            module_root: "lib/modules".to_string(),
            module_utils_root: "lib/module_utils".to_string(),
            plugin_root: "lib/plugins".to_string(),
            test_target_root: "test/integration/targets".to_string(),
            loader_prefix: "loader_module_".to_string(),
        }
    }
}

impl RepoLayout {
    /// Action plugins live directly under the plugin root.
    pub fn action_plugin_root(&self) -> String {
        format!("{}/action", self.plugin_root)
    }
}

/// One declared metadata block, keyed by file or path prefix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    #[serde(default)]
    pub maintainers: Vec<String>,
    #[serde(default)]
    pub notify: Vec<String>,
    #[serde(default)]
    pub ignored: Vec<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Free-text keywords that resolve directly to this path.
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub support: Option<String>,
    #[serde(default)]
    pub supported_by: Option<String>,
    /// Identities whose lone approval is sufficient for the files under
    /// this entry.
    #[serde(default)]
    pub supershipit: Vec<String>,

    // Provenance of inherited fields, filled during propagation. Each
    // list names the ancestor entries a field's values came from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignored_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub support_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_by_keys: Vec<String>,
}

/// Fully resolved ownership metadata for one repository path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub path: String,
    /// Basename without extension.
    pub name: String,
    /// Whether the path is in the known repository file list.
    pub exists: bool,
    pub maintainers: Vec<String>,
    /// Entries each maintainer set was inherited from.
    pub maintainers_keys: Vec<String>,
    pub notify: Vec<String>,
    pub labels: Vec<String>,
    pub ignored: Vec<String>,
    pub support: String,
    pub supported_by: String,
    /// Directory chain between the module root and the file.
    pub namespace: Option<String>,
    pub namespace_maintainers: Vec<String>,
    pub supershipit: Vec<String>,
    /// Set when no declared entry covers this path. The match is kept
    /// but a downstream pass must flag the gap to humans.
    pub missing_metadata: bool,
}

impl ComponentRecord {
    fn empty(path: &str, exists: bool) -> Self {
        ComponentRecord {
            path: path.to_string(),
            name: file_stem(path).to_string(),
            exists,
            support: String::new(),
            supported_by: String::new(),
            ..Default::default()
        }
    }
}

/// Immutable, fully resolved component index for one repository
/// snapshot.
///
/// # Invariants
///
/// - Built once per snapshot; lookups never mutate it.
/// - Every known file has a precomputed record. Unknown paths resolve
///   on the fly through the same rules, so override commands naming
///   files outside the tree still get consistent answers.
#[derive(Debug, Clone)]
pub struct ComponentTable {
    layout: RepoLayout,
    files: Vec<String>,
    entries: BTreeMap<String, MetadataEntry>,
    records: HashMap<String, ComponentRecord>,
    keywords: HashMap<String, String>,
}

impl ComponentTable {
    /// Build the table: extend labels from path segments, run the
    /// inheritance pass over the sorted prefix index, then resolve a
    /// record for every known file.
    pub fn build(
        files: Vec<String>,
        declared: BTreeMap<String, MetadataEntry>,
        layout: RepoLayout,
    ) -> Self {
        let mut files = files;
        files.sort_unstable();
        files.dedup();

        let mut entries = declared;
        extend_labels_from_paths(&mut entries);
        propagate(&mut entries);

        let mut keywords = HashMap::new();
        for (path, entry) in &entries {
            for keyword in &entry.keywords {
                keywords
                    .entry(keyword.to_lowercase())
                    .or_insert_with(|| path.clone());
            }
        }

        let mut table = ComponentTable {
            layout,
            files,
            entries,
            records: HashMap::new(),
            keywords,
        };
        table.records = table
            .files
            .iter()
            .map(|f| (f.clone(), table.resolve(f)))
            .collect();
        debug!(
            files = table.files.len(),
            entries = table.entries.len(),
            "component table built"
        );
        table
    }

    pub fn layout(&self) -> &RepoLayout {
        &self.layout
    }

    /// All known repository files, sorted.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.binary_search_by(|f| f.as_str().cmp(path)).is_ok()
    }

    /// Path a declared keyword resolves to, if any.
    pub fn keyword_target(&self, keyword: &str) -> Option<&str> {
        self.keywords.get(&keyword.to_lowercase()).map(String::as_str)
    }

    /// Declared keywords, for loose scanning.
    pub fn keywords(&self) -> impl Iterator<Item = (&str, &str)> {
        self.keywords.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Resolved record for a path. Known files are precomputed; unknown
    /// paths resolve through the same inheritance rules on demand.
    pub fn record_for(&self, path: &str) -> ComponentRecord {
        match self.records.get(path) {
            Some(record) => record.clone(),
            None => self.resolve(path),
        }
    }

    /// Module files whose stem equals `name`, including the
    /// deprecated-underscore spelling.
    pub fn modules_named(&self, name: &str) -> Vec<&str> {
        let deprecated = format!("_{name}");
        self.files
            .iter()
            .filter(|f| f.starts_with(&self.layout.module_root))
            .filter(|f| {
                let stem = file_stem(f);
                stem == name || stem == deprecated
            })
            .map(String::as_str)
            .collect()
    }

    fn resolve(&self, path: &str) -> ComponentRecord {
        let mut record = ComponentRecord::empty(path, self.contains(path));
        let stem = strip_extension(path);

        let matched: Vec<&str> = self
            .entries
            .keys()
            .filter(|key| path == key.as_str() || stem == key.as_str() || path.starts_with(key.as_str()))
            .map(String::as_str)
            .collect();

        record.missing_metadata = matched.is_empty();

        let mut support_levels: Vec<(&str, &str)> = Vec::new();
        for key in &matched {
            let entry = &self.entries[*key];
            union_into(&mut record.maintainers, &entry.maintainers);
            union_into(&mut record.notify, &entry.maintainers);
            union_into(&mut record.notify, &entry.notify);
            union_into(&mut record.labels, &entry.labels);
            union_into(&mut record.supershipit, &entry.supershipit);
            if !entry.maintainers.is_empty() {
                record.maintainers_keys.push((*key).to_string());
            }
            if let Some(level) = entry.support.as_deref().or(entry.supported_by.as_deref()) {
                support_levels.push((key, level));
            }
        }

        // Exact entry wins; otherwise the longest covering prefix.
        let support = support_levels
            .iter()
            .find(|(key, _)| *key == path)
            .or_else(|| support_levels.iter().max_by_key(|(key, _)| key.len()))
            .map(|(_, level)| (*level).to_string());
        if let Some(level) = support {
            record.support = level;
        }

        if let Some(namespace) = self.namespace_of(path) {
            record.namespace_maintainers = self.namespace_maintainers(&namespace);
            record.namespace = Some(namespace);
        }

        // Ignore lists trump everything inherited above them.
        for key in &matched {
            for ignoree in &self.entries[*key].ignored {
                if !record.ignored.contains(ignoree) {
                    record.ignored.push(ignoree.clone());
                }
                record.maintainers.retain(|m| m != ignoree);
                record.notify.retain(|n| n != ignoree);
            }
        }

        if record.missing_metadata {
            self.inherit_from_test_target(path, &mut record);
        }

        if record.support.is_empty() {
            record.support = "core".to_string();
        }
        record.supported_by = record.support.clone();

        for list in [
            &mut record.maintainers,
            &mut record.notify,
            &mut record.labels,
            &mut record.ignored,
            &mut record.supershipit,
            &mut record.namespace_maintainers,
            &mut record.maintainers_keys,
        ] {
            list.sort_unstable();
            list.dedup();
        }

        record
    }

    fn namespace_of(&self, path: &str) -> Option<String> {
        let rest = path
            .strip_prefix(&self.layout.module_root)?
            .strip_prefix('/')?;
        let segments: Vec<&str> = rest.split('/').collect();
        if segments.len() < 2 {
            return None;
        }
        Some(segments[..segments.len() - 1].join("/"))
    }

    fn namespace_maintainers(&self, namespace: &str) -> Vec<String> {
        let prefix = format!("{}/{}", self.layout.module_root, namespace);
        let mut maintainers = Vec::new();
        let mut ignored = Vec::new();
        for (key, entry) in &self.entries {
            if !key.starts_with(&prefix) {
                continue;
            }
            union_into(&mut maintainers, &entry.maintainers);
            union_into(&mut ignored, &entry.ignored);
        }
        maintainers.retain(|m| !ignored.contains(m));
        maintainers
    }

    /// Undeclared test targets inherit from the module they exercise
    /// and default to community support.
    fn inherit_from_test_target(&self, path: &str, record: &mut ComponentRecord) {
        let Some(rest) = path
            .strip_prefix(&self.layout.test_target_root)
            .and_then(|r| r.strip_prefix('/'))
        else {
            return;
        };
        let Some(target) = rest.split('/').next().filter(|t| !t.is_empty()) else {
            return;
        };
        let modules = self.modules_named(target);
        for module in modules {
            let inherited = self.record_for(module);
            union_into(&mut record.maintainers, &inherited.maintainers);
            union_into(&mut record.notify, &inherited.notify);
            union_into(&mut record.labels, &inherited.labels);
            union_into(&mut record.ignored, &inherited.ignored);
            if record.support.is_empty() {
                record.support = inherited.support;
            }
            record.missing_metadata = false;
        }
        if record.support.is_empty() {
            record.support = "community".to_string();
        }
    }
}

// ---------------------------------------------------------------------------
// Build passes
// ---------------------------------------------------------------------------

/// Every path segment of an entry key becomes a label on that entry.
fn extend_labels_from_paths(entries: &mut BTreeMap<String, MetadataEntry>) {
    for (key, entry) in entries.iter_mut() {
        for segment in key.split('/').filter(|s| !s.is_empty()) {
            let label = strip_extension(segment).to_string();
            if !entry.labels.contains(&label) {
                entry.labels.push(label);
            }
        }
        entry.labels.sort_unstable();
        entry.labels.dedup();
    }
}

/// Copy metadata from every declared ancestor into its descendants.
///
/// Multivalued fields union across all ancestors; single-valued fields
/// come from the nearest ancestor and never overwrite a value the
/// descendant declared itself. Sorted key order makes all descendants
/// of a prefix contiguous, so the scan is a forward window, not a full
/// cross product.
fn propagate(entries: &mut BTreeMap<String, MetadataEntry>) {
    let keys: Vec<String> = entries.keys().cloned().collect();
    for (idx, ancestor) in keys.iter().enumerate() {
        let top = entries[ancestor].clone();
        let mut started = false;
        for descendant in &keys[idx + 1..] {
            if !descendant.starts_with(ancestor.as_str()) {
                if started {
                    break;
                }
                continue;
            }
            started = true;
            let child = entries
                .get_mut(descendant)
                .unwrap_or_else(|| unreachable!("descendant key came from the same map"));
            inherit_multivalued(
                &top.maintainers,
                ancestor,
                &mut child.maintainers,
                &mut child.maintainers_keys,
            );
            inherit_multivalued(
                &top.ignored,
                ancestor,
                &mut child.ignored,
                &mut child.ignored_keys,
            );
            inherit_multivalued(&top.labels, ancestor, &mut child.labels, &mut child.labels_keys);
            inherit_single(
                &top.support,
                ancestor,
                &mut child.support,
                &mut child.support_keys,
            );
            inherit_single(
                &top.supported_by,
                ancestor,
                &mut child.supported_by,
                &mut child.supported_by_keys,
            );
        }
    }
}

fn inherit_multivalued(
    from: &[String],
    ancestor: &str,
    into: &mut Vec<String>,
    provenance: &mut Vec<String>,
) {
    if from.is_empty() {
        return;
    }
    provenance.push(ancestor.to_string());
    for value in from {
        if !into.contains(value) {
            into.push(value.clone());
        }
    }
}

/// Replace only when the descendant has no value, or its current value
/// was itself inherited from a shorter (less specific) ancestor.
fn inherit_single(
    from: &Option<String>,
    ancestor: &str,
    into: &mut Option<String>,
    provenance: &mut Vec<String>,
) {
    let Some(value) = from else {
        return;
    };
    let replace = match (into.as_ref(), provenance.first()) {
        (None, _) => true,
        (Some(_), Some(previous)) => previous.len() < ancestor.len(),
        (Some(_), None) => false,
    };
    if replace {
        *provenance = vec![ancestor.to_string()];
        *into = Some(value.clone());
    }
}

fn union_into(into: &mut Vec<String>, from: &[String]) {
    for value in from {
        if !into.contains(value) {
            into.push(value.clone());
        }
    }
}

pub(crate) fn strip_extension(path: &str) -> &str {
    match path.rfind('.') {
        Some(idx) if path[idx..].find('/').is_none() => &path[..idx],
        _ => path,
    }
}

pub(crate) fn file_stem(path: &str) -> &str {
    let base = path.rsplit('/').next().unwrap_or(path);
    strip_extension(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(maintainers: &[&str]) -> MetadataEntry {
        MetadataEntry {
            maintainers: maintainers.iter().map(|m| m.to_string()).collect(),
            ..Default::default()
        }
    }

    fn sample_table() -> ComponentTable {
        let mut declared = BTreeMap::new();
        declared.insert(
            "lib/modules/cloud/".to_string(),
            MetadataEntry {
                support: Some("community".to_string()),
                ..entry(&["cloudlead"])
            },
        );
        declared.insert(
            "lib/modules/cloud/object_store.py".to_string(),
            MetadataEntry {
                ignored: vec!["gonequiet".to_string()],
                supershipit: vec!["superv".to_string()],
                ..entry(&["storemaint", "gonequiet"])
            },
        );
        declared.insert(
            "lib/parsing/".to_string(),
            MetadataEntry {
                support: Some("core".to_string()),
                keywords: vec!["vault".to_string()],
                ..entry(&["parselead"])
            },
        );
        ComponentTable::build(
            vec![
                "lib/modules/cloud/object_store.py".to_string(),
                "lib/modules/cloud/dns_zone.py".to_string(),
                "lib/parsing/vault.py".to_string(),
                "test/integration/targets/object_store/tasks/main.yml".to_string(),
            ],
            declared,
            RepoLayout::default(),
        )
    }

    #[test]
    fn test_multivalued_inheritance_unions_all_ancestors() {
        let table = sample_table();
        let record = table.record_for("lib/modules/cloud/object_store.py");
        assert_eq!(record.maintainers, vec!["cloudlead", "storemaint"]);
        assert!(record
            .maintainers_keys
            .contains(&"lib/modules/cloud/".to_string()));
        assert!(record
            .maintainers_keys
            .contains(&"lib/modules/cloud/object_store.py".to_string()));
    }

    #[test]
    fn test_single_valued_comes_from_nearest_ancestor() {
        let mut declared = BTreeMap::new();
        declared.insert(
            "lib/".to_string(),
            MetadataEntry {
                support: Some("core".to_string()),
                ..Default::default()
            },
        );
        declared.insert(
            "lib/modules/".to_string(),
            MetadataEntry {
                support: Some("community".to_string()),
                ..Default::default()
            },
        );
        let table = ComponentTable::build(
            vec!["lib/modules/ping.py".to_string()],
            declared,
            RepoLayout::default(),
        );
        let record = table.record_for("lib/modules/ping.py");
        assert_eq!(record.support, "community");
        assert_eq!(record.supported_by, "community");
    }

    #[test]
    fn test_declared_support_never_overwritten_by_ancestor() {
        let mut declared = BTreeMap::new();
        declared.insert(
            "lib/modules/".to_string(),
            MetadataEntry {
                support: Some("community".to_string()),
                ..Default::default()
            },
        );
        declared.insert(
            "lib/modules/ping.py".to_string(),
            MetadataEntry {
                support: Some("network".to_string()),
                ..Default::default()
            },
        );
        let table = ComponentTable::build(
            vec!["lib/modules/ping.py".to_string()],
            declared,
            RepoLayout::default(),
        );
        assert_eq!(table.record_for("lib/modules/ping.py").support, "network");
    }

    #[test]
    fn test_ignored_identities_removed_after_inheritance() {
        let table = sample_table();
        let record = table.record_for("lib/modules/cloud/object_store.py");
        assert!(!record.maintainers.contains(&"gonequiet".to_string()));
        assert!(!record.notify.contains(&"gonequiet".to_string()));
        assert_eq!(record.ignored, vec!["gonequiet"]);
    }

    #[test]
    fn test_labels_extended_from_path_segments() {
        let table = sample_table();
        let record = table.record_for("lib/modules/cloud/object_store.py");
        assert!(record.labels.contains(&"cloud".to_string()));
        assert!(record.labels.contains(&"object_store".to_string()));
    }

    #[test]
    fn test_support_falls_back_to_core() {
        let table = ComponentTable::build(
            vec!["bin/cli.py".to_string()],
            BTreeMap::new(),
            RepoLayout::default(),
        );
        let record = table.record_for("bin/cli.py");
        assert_eq!(record.support, "core");
        assert!(record.missing_metadata);
    }

    #[test]
    fn test_namespace_maintainers_accumulate() {
        let table = sample_table();
        let record = table.record_for("lib/modules/cloud/dns_zone.py");
        assert_eq!(record.namespace.as_deref(), Some("cloud"));
        assert!(record
            .namespace_maintainers
            .contains(&"storemaint".to_string()));
        assert!(!record
            .namespace_maintainers
            .contains(&"gonequiet".to_string()));
    }

    #[test]
    fn test_supershipit_from_prefix_walk() {
        let table = sample_table();
        let record = table.record_for("lib/modules/cloud/object_store.py");
        assert_eq!(record.supershipit, vec!["superv"]);
    }

    #[test]
    fn test_test_target_inherits_from_module() {
        let table = sample_table();
        let record = table.record_for("test/integration/targets/object_store/tasks/main.yml");
        assert!(record.maintainers.contains(&"storemaint".to_string()));
        assert!(!record.missing_metadata);
        assert_eq!(record.support, "community");
    }

    #[test]
    fn test_unknown_path_yields_marked_empty_record() {
        let table = sample_table();
        let record = table.record_for("docs/changelog.rst");
        assert!(record.missing_metadata);
        assert!(!record.exists);
        assert!(record.maintainers.is_empty());
    }

    #[test]
    fn test_keyword_target_lookup() {
        let table = sample_table();
        assert_eq!(table.keyword_target("vault"), Some("lib/parsing/"));
        assert_eq!(table.keyword_target("VAULT"), Some("lib/parsing/"));
        assert_eq!(table.keyword_target("nope"), None);
    }
}
