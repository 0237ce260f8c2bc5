//! Component matching: free text and changed files to repository paths.

use serde::{Deserialize, Serialize};
use tracing::debug;

use triage_domain::IssueSnapshot;

use super::extract::{traceback_paths, url_paths, STOP_CHARS};
use super::metadata::{file_stem, ComponentRecord, ComponentTable, RepoLayout};

/// Which strategy produced a match, recorded for operator forensics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    PullRequestFiles,
    KeywordExact,
    UrlDerived,
    TracebackDerived,
    FilepathExact,
    FilepathPartial,
    KeywordLoose,
    OverrideCommand,
}

impl MatchStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            MatchStrategy::PullRequestFiles => "pull_request_files",
            MatchStrategy::KeywordExact => "keyword_exact",
            MatchStrategy::UrlDerived => "url_derived",
            MatchStrategy::TracebackDerived => "traceback_derived",
            MatchStrategy::FilepathExact => "filepath_exact",
            MatchStrategy::FilepathPartial => "filepath_partial",
            MatchStrategy::KeywordLoose => "keyword_loose",
            MatchStrategy::OverrideCommand => "override_command",
        }
    }
}

/// Matching knobs: terms too generic to match on, and terms that
/// suppress the whole match when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    pub stopwords: Vec<String>,
    pub blacklist: Vec<String>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            stopwords: vec!["core".to_string(), "plugin".to_string()],
            blacklist: vec![
                "core".to_string(),
                "new module".to_string(),
                "new modules".to_string(),
            ],
        }
    }
}

/// Resolved component matches for one issue, plus the strategies that
/// produced them.
///
/// Recomputed on every pass; comment overrides mutate the inputs, so
/// caching a result across passes would serve stale ownership.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchResult {
    pub records: Vec<ComponentRecord>,
    pub strategies: Vec<MatchStrategy>,
}

impl MatchResult {
    pub fn filenames(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.path.as_str()).collect()
    }

    /// Flatten the matched records into the aggregate view the fact
    /// engine consumes: merged identity sets with ignores applied, the
    /// support tier set, and path-prefix classification flags.
    pub fn summarize(
        &self,
        layout: &RepoLayout,
        valid_labels: Option<&[String]>,
        new_files: &[String],
    ) -> ComponentSummary {
        let mut summary = ComponentSummary::default();
        summary.filenames = self.records.iter().map(|r| r.path.clone()).collect();

        for record in &self.records {
            for label in &record.labels {
                let valid = valid_labels.map_or(true, |v| v.contains(label));
                if valid && !summary.labels.contains(label) {
                    summary.labels.push(label.clone());
                }
            }
            for maintainer in &record.maintainers {
                if !summary.maintainers.contains(maintainer) {
                    summary.maintainers.push(maintainer.clone());
                }
            }
            for maintainer in &record.namespace_maintainers {
                if !summary.namespace_maintainers.contains(maintainer) {
                    summary.namespace_maintainers.push(maintainer.clone());
                }
            }
            for notifiee in &record.notify {
                if !summary.notifiers.contains(notifiee) {
                    summary.notifiers.push(notifiee.clone());
                }
            }
            for supershipiteer in &record.supershipit {
                if !summary.supershipit.contains(supershipiteer) {
                    summary.supershipit.push(supershipiteer.clone());
                }
            }
            if !summary.support.contains(&record.support) {
                summary.support.push(record.support.clone());
            }
            if record.missing_metadata {
                summary.missing_maintainers = true;
            }
        }

        for record in &self.records {
            for ignoree in &record.ignored {
                summary.maintainers.retain(|m| m != ignoree);
                summary.notifiers.retain(|n| n != ignoree);
            }
        }

        summary.support.sort_unstable();
        summary.is_core = summary.support != vec!["community".to_string()];

        let module_root = format!("{}/", layout.module_root);
        let plugin_root = format!("{}/", layout.plugin_root);
        let action_root = format!("{}/", layout.action_plugin_root());
        let utils_root = format!("{}/", layout.module_utils_root);

        let module_count = summary
            .filenames
            .iter()
            .filter(|f| f.starts_with(&module_root))
            .count();
        summary.is_module = module_count > 0;
        summary.is_multi_module = module_count > 1;
        summary.is_plugin =
            summary.is_module || summary.filenames.iter().any(|f| f.starts_with(&plugin_root));
        summary.is_action_plugin = summary.filenames.iter().any(|f| f.starts_with(&action_root));
        summary.is_module_util = summary.filenames.iter().any(|f| f.starts_with(&utils_root));
        summary.is_new_module = new_files.iter().any(|f| f.starts_with(&module_root));

        summary
    }
}

/// Aggregate component facts reduced from a [`MatchResult`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentSummary {
    pub filenames: Vec<String>,
    pub labels: Vec<String>,
    pub maintainers: Vec<String>,
    pub namespace_maintainers: Vec<String>,
    pub notifiers: Vec<String>,
    pub supershipit: Vec<String>,
    /// Distinct support tiers across the matched files, sorted.
    pub support: Vec<String>,
    pub is_core: bool,
    pub is_module: bool,
    pub is_multi_module: bool,
    pub is_plugin: bool,
    pub is_action_plugin: bool,
    pub is_module_util: bool,
    pub is_new_module: bool,
    /// At least one matched file had no declared metadata.
    pub missing_maintainers: bool,
}

enum StrategyOutcome {
    Matched(MatchStrategy, Vec<String>),
    Blacklisted,
    NoMatch,
}

/// Strategy pipeline over one component table.
pub struct Matcher<'a> {
    table: &'a ComponentTable,
    config: MatchConfig,
}

impl<'a> Matcher<'a> {
    pub fn new(table: &'a ComponentTable, config: MatchConfig) -> Self {
        Matcher { table, config }
    }

    pub fn table(&self) -> &'a ComponentTable {
        self.table
    }

    /// Match one issue or pull request.
    ///
    /// Pull requests carry an authoritative changed-file list and skip
    /// text matching entirely. Issues go through the declared component
    /// text.
    pub fn match_issue(&self, snapshot: &IssueSnapshot) -> MatchResult {
        if !snapshot.files.is_empty() {
            return self.match_files(
                &snapshot.files.iter().map(String::clone).collect::<Vec<_>>(),
                MatchStrategy::PullRequestFiles,
            );
        }
        let Some(component_text) = snapshot.component_text.as_deref() else {
            return MatchResult::default();
        };
        self.match_component_text(&snapshot.title, component_text)
    }

    /// Resolve an explicit file list, no text matching.
    pub fn match_files(&self, files: &[String], strategy: MatchStrategy) -> MatchResult {
        let mut filenames: Vec<String> = files.to_vec();
        filenames.sort_unstable();
        filenames.dedup();
        let records = filenames
            .iter()
            .map(|f| self.table.record_for(f))
            .collect();
        MatchResult {
            records,
            strategies: vec![strategy],
        }
    }

    /// Match declared free-text component lines against the repository.
    pub fn match_component_text(&self, title: &str, component_text: &str) -> MatchResult {
        let cleaned = clean_text(component_text);
        if self.config.blacklist.contains(&cleaned) {
            debug!(component = %cleaned, "blacklisted component text");
            return MatchResult::default();
        }

        let pieces = split_components(component_text);
        let mut filenames: Vec<String> = Vec::new();
        let mut strategies: Vec<MatchStrategy> = Vec::new();

        for piece in pieces {
            match self.match_text(title, &piece) {
                StrategyOutcome::Matched(strategy, files) => {
                    filenames.extend(files);
                    strategies.push(strategy);
                }
                StrategyOutcome::Blacklisted => {
                    debug!(piece = %piece, "blacklisted match short-circuits issue");
                    return MatchResult::default();
                }
                StrategyOutcome::NoMatch => {}
            }
        }

        filenames.extend(self.expand_test_targets(&filenames));
        let filenames = reduce_filepaths(filenames);

        let mut filenames = filenames;
        filenames.sort_unstable();
        filenames.dedup();

        let records = filenames
            .iter()
            .map(|f| self.table.record_for(f))
            .collect();
        MatchResult {
            records,
            strategies,
        }
    }

    fn match_text(&self, title: &str, component: &str) -> StrategyOutcome {
        let mut component = component.trim().to_string();

        // Source-blob URLs pasted as the component reduce to their path.
        if component.starts_with("http") {
            if let Some((_, tail)) = component.split_once("/blob/") {
                if let Some((_, path)) = tail.split_once('/') {
                    component = path.to_string();
                }
            }
        }

        if self.table.contains(component.trim()) {
            return StrategyOutcome::Matched(
                MatchStrategy::FilepathExact,
                vec![component.trim().to_string()],
            );
        }

        let cleaned = clean_text(&component);
        if cleaned.is_empty() || self.config.stopwords.contains(&cleaned) {
            return StrategyOutcome::NoMatch;
        }

        if let Some(target) = self.table.keyword_target(&cleaned) {
            return StrategyOutcome::Matched(MatchStrategy::KeywordExact, vec![target.to_string()]);
        }

        let urls = url_paths(&component, self.table);
        if !urls.is_empty() {
            return StrategyOutcome::Matched(MatchStrategy::UrlDerived, urls);
        }

        let tracebacks = traceback_paths(&component, self.table);
        if !tracebacks.is_empty() {
            return StrategyOutcome::Matched(MatchStrategy::TracebackDerived, tracebacks);
        }

        let (context, component) = self.narrow_context(title, &component);

        let exact = self.search_by_filepath(&component, false, context.as_deref());
        if !exact.is_empty() {
            return StrategyOutcome::Matched(MatchStrategy::FilepathExact, exact);
        }

        let partial = self.search_by_filepath(&component, true, None);
        if !partial.is_empty() {
            return StrategyOutcome::Matched(MatchStrategy::FilepathPartial, partial);
        }

        self.search_by_keywords_loose(&cleaned)
    }

    /// Hint words in the title or component narrow the search window to
    /// one subtree.
    fn narrow_context(&self, title: &str, component: &str) -> (Option<String>, String) {
        let layout = self.table.layout();
        let title = title.to_lowercase();
        let lowered = component.to_lowercase();
        let has = |needle: &str| title.contains(needle) || lowered.contains(needle);

        if has("module_util") || has("module util") {
            (Some(layout.module_utils_root.clone()), component.to_string())
        } else if has("integration test") {
            let stripped = lowered.replace("integration test", "");
            (
                Some(layout.test_target_root.clone()),
                stripped.trim().to_string(),
            )
        } else if has("module") {
            (Some(layout.module_root.clone()), component.to_string())
        } else {
            (None, component.to_string())
        }
    }

    fn search_by_filepath(&self, text: &str, partial: bool, context: Option<&str>) -> Vec<String> {
        let mut body = clean_text(text);
        if body.len() < 2 || self.config.stopwords.contains(&body) {
            return Vec::new();
        }

        // "inventory manager" is usually "inventory/manager".
        if partial && body.contains(' ') {
            body = body.replace(' ', "/");
        }
        if let Some(idx) = body.find("site-packages/") {
            body = body[idx + "site-packages/".len()..].to_string();
        }

        let body_tokens: Vec<&str> = if body.contains('/') {
            body.split('/').filter(|t| !t.is_empty()).collect()
        } else {
            body.split_whitespace().collect()
        };

        // Bare module names resolve through the module index before any
        // path walking.
        let under_module_root = context.map_or(true, |c| c == self.table.layout().module_root);
        if under_module_root && !body.contains('/') {
            let modules = self.table.modules_named(&body);
            if !modules.is_empty() {
                return modules.iter().map(|m| m.to_string()).collect();
            }
        }

        if self.table.contains(&body) {
            return vec![body];
        }

        let mut matches: Vec<String> = Vec::new();
        for file in self.table.files() {
            if context.is_some_and(|c| !file.starts_with(c)) {
                continue;
            }

            if file.ends_with(&body)
                || file.ends_with(&format!("{body}.py"))
                || file.ends_with(&format!("{body}.ps1"))
            {
                // ios_config must not match test_ios_config.
                let body_base = body.rsplit('/').next().unwrap_or(&body);
                let file_base = file.rsplit('/').next().unwrap_or(file);
                if file_base.starts_with(body_base) {
                    matches = vec![file.clone()];
                    break;
                }
            }

            if partial {
                let mut file_tokens: Vec<&str> = file.split('/').collect();
                let stem = file_stem(file);
                file_tokens.push(stem);

                let present = body_tokens
                    .iter()
                    .filter(|t| file_tokens.contains(t))
                    .count();

                if present == body_tokens.len() {
                    matches = vec![file.clone()];
                    break;
                }
                if present > 1
                    && (present as f64 / body_tokens.len() as f64) >= (2.0 / 3.0)
                    && !matches.contains(file)
                {
                    matches.push(file.clone());
                }
            }
        }

        let mut matches = reduce_filepaths(matches);
        matches.sort_unstable();
        matches.dedup();
        matches
    }

    fn search_by_keywords_loose(&self, component: &str) -> StrategyOutcome {
        if self
            .config
            .blacklist
            .iter()
            .any(|b| component.contains(b.as_str()))
        {
            return StrategyOutcome::Blacklisted;
        }

        let mut matches = Vec::new();
        for (keyword, target) in self.table.keywords() {
            let mid = format!(" {keyword} ");
            let tagged = format!(" {keyword}:");
            let trailing = format!(" {keyword}");
            if component.contains(&mid)
                || component.contains(&tagged)
                || component.ends_with(&trailing)
            {
                matches.push(target.to_string());
            }
        }

        if matches.is_empty() {
            StrategyOutcome::NoMatch
        } else {
            StrategyOutcome::Matched(MatchStrategy::KeywordLoose, matches)
        }
    }

    /// Matched integration-test targets pull in the modules they
    /// exercise.
    fn expand_test_targets(&self, filenames: &[String]) -> Vec<String> {
        let root = format!("{}/", self.table.layout().test_target_root);
        let mut extra = Vec::new();
        for file in filenames {
            let Some(rest) = file.strip_prefix(&root) else {
                continue;
            };
            let Some(target) = rest.split('/').next().filter(|t| !t.is_empty()) else {
                continue;
            };
            for module in self.table.modules_named(target) {
                extra.push(module.to_string());
            }
        }
        extra
    }
}

/// Lowercase, trim, and peel stop characters off both ends.
fn clean_text(text: &str) -> String {
    let mut body = text.trim().to_lowercase();
    loop {
        let before = body.len();
        body = body
            .trim_matches(|c| STOP_CHARS.contains(&c))
            .trim()
            .to_string();
        if body.len() == before {
            return body;
        }
    }
}

/// Split multi-component declarations on the first delimiter present.
fn split_components(text: &str) -> Vec<String> {
    for delimiter in ["\n", ",", " + ", " & "] {
        if text.contains(delimiter) {
            return text
                .split(delimiter)
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
        }
    }
    vec![text.trim().to_string()]
}

/// Drop paths subsumed by a longer, more specific match.
fn reduce_filepaths(matches: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(matches.len());
    for m in matches {
        if !unique.contains(&m) {
            unique.push(m);
        }
    }

    let subsumed: Vec<String> = unique
        .iter()
        .filter(|short| {
            unique.iter().any(|long| {
                long != *short
                    && ((short.len() < long.len() && long.starts_with(short.as_str()))
                        || long.ends_with(short.as_str()))
            })
        })
        .cloned()
        .collect();

    unique.retain(|m| !subsumed.contains(m));
    unique
}
