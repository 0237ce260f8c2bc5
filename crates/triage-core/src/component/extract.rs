//! Path extraction from free text: documentation URLs and tracebacks.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::metadata::{file_stem, ComponentTable};

static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://[A-Za-z0-9$\-_.+!*'(),%/:@&=#~?]+")
        .unwrap_or_else(|e| unreachable!("static pattern: {e}"))
});

static TRACEBACK_FILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"File "([^"]+)""#).unwrap_or_else(|e| unreachable!("static pattern: {e}"))
});

const TRACEBACK_MARKER: &str = "Traceback (most recent call last)";

/// Characters stripped from free text before path comparison.
pub(crate) const STOP_CHARS: &[char] = &['"', '\'', '(', ')', '?', '*', '`', ',', ':', '-'];

/// Map documentation and source-blob URLs in `text` back to repository
/// paths.
///
/// Two URL shapes resolve: `.../blob/<ref>/<path>` source links, and
/// `.../<name>_module.html` documentation pages. Doc pages with more
/// than one candidate file are disambiguated by preferring the
/// extension-exact spelling; still-ambiguous pages yield nothing.
pub fn url_paths(text: &str, table: &ComponentTable) -> Vec<String> {
    let mut matches = Vec::new();
    for url in URL_RE.find_iter(text) {
        let url = url.as_str().trim_end_matches(')');
        if url.contains("/blob/") && url.ends_with(".py") {
            let parts: Vec<&str> = url.split('/').collect();
            if let Some(bindex) = parts.iter().position(|p| *p == "blob") {
                if parts.len() > bindex + 2 {
                    matches.push(parts[bindex + 2..].join("/"));
                }
            }
        } else if let Some(page) = url.rsplit('/').next() {
            let Some(name) = page.strip_suffix("_module.html") else {
                continue;
            };
            if let Some(path) = doc_page_to_module(name, table) {
                matches.push(path);
            }
        }
    }
    debug!(count = matches.len(), "url-derived paths");
    matches
}

fn doc_page_to_module(name: &str, table: &ComponentTable) -> Option<String> {
    let plain = format!("/{name}");
    let deprecated = format!("/_{name}");
    let module_root = &table.layout().module_root;
    let mut candidates: Vec<&String> = table
        .files()
        .iter()
        .filter(|f| f.starts_with(module_root))
        .filter(|f| f.contains(&plain) || f.contains(&deprecated))
        .collect();

    if candidates.len() > 1 {
        let exact = [
            format!("/{name}.py"),
            format!("/{name}.ps1"),
            format!("/_{name}.py"),
        ];
        candidates.retain(|f| exact.iter().any(|e| f.ends_with(e)));
    }

    match candidates.as_slice() {
        [single] => Some((*single).to_string()),
        _ => None,
    }
}

/// Map `File "<path>"` lines of a traceback back to repository paths.
///
/// Loader-mangled module copies are resolved by stripping the loader
/// prefix and matching the module name; site-packages and other
/// installation prefixes are dropped by suffix-matching against the
/// known file list.
pub fn traceback_paths(text: &str, table: &ComponentTable) -> Vec<String> {
    if !text.contains(TRACEBACK_MARKER) {
        return Vec::new();
    }

    let layout = table.layout();
    let module_utils_needle = format!(
        "{}/",
        layout
            .module_utils_root
            .rsplit('/')
            .next()
            .unwrap_or(&layout.module_utils_root)
    );

    let mut matches = Vec::new();
    for capture in TRACEBACK_FILE_RE.captures_iter(text) {
        let raw: String = capture[1].chars().filter(|c| !STOP_CHARS.contains(c)).collect();

        let base = raw.rsplit('/').next().unwrap_or(&raw);
        if let Some(module) = base.strip_prefix(&layout.loader_prefix) {
            let name = file_stem(module).to_string();
            for path in table.modules_named(&name) {
                matches.push(path.to_string());
            }
            continue;
        }

        if let Some(idx) = raw.find(&module_utils_needle) {
            let tail = &raw[idx + module_utils_needle.len()..];
            let candidate = format!("{}/{}", layout.module_utils_root, tail);
            if table.contains(&candidate) {
                matches.push(candidate);
                continue;
            }
        }

        // Installed copies carry a site prefix; the repo path is a
        // suffix of the traceback path.
        if let Some(known) = table.files().iter().find(|f| raw.ends_with(f.as_str())) {
            matches.push(known.to_string());
        }
    }

    debug!(count = matches.len(), "traceback-derived paths");
    matches
}
