//! `!component` override commands issued in issue comments.

use tracing::debug;

use crate::history::History;

use super::matcher::{MatchResult, MatchStrategy, Matcher};

/// Comment token that introduces a component override line.
pub const COMPONENT_COMMAND: &str = "!component";

/// Apply `!component` override commands on top of an automatic match.
///
/// Commands are replayed in comment order. Each line carries an action
/// prefix on its path argument: `+path` appends, `-path` removes, and
/// `=path` replaces the working set (the first `=` in a comment clears
/// it; later ones in the same comment append). Unknown actions and
/// empty paths are dropped.
///
/// Returns `None` when no override comments exist, so callers can keep
/// the automatic result untouched.
pub fn reconcile_component_commands(
    history: &History,
    matcher: &Matcher,
    current: &MatchResult,
) -> Option<MatchResult> {
    let bodies = history.get_command_comments(COMPONENT_COMMAND);
    if bodies.is_empty() {
        return None;
    }

    let mut working: Vec<String> = current
        .filenames()
        .into_iter()
        .map(str::to_string)
        .collect();

    for body in bodies {
        let mut cleared = false;
        for line in body.lines() {
            let line = line.trim();
            if !line.starts_with(COMPONENT_COMMAND) {
                continue;
            }
            let Some(arg) = line.split_whitespace().nth(1) else {
                continue;
            };
            let Some(action) = arg.chars().next() else {
                continue;
            };
            let path = &arg[action.len_utf8()..];
            if path.is_empty() {
                continue;
            }
            match action {
                '+' => {
                    if !working.iter().any(|p| p == path) {
                        working.push(path.to_string());
                    }
                }
                '-' => working.retain(|p| p != path),
                '=' => {
                    if !cleared {
                        working.clear();
                        cleared = true;
                    }
                    if !working.iter().any(|p| p == path) {
                        working.push(path.to_string());
                    }
                }
                _ => debug!(%arg, "ignoring unknown component command action"),
            }
        }
    }

    debug!(count = working.len(), "component override applied");
    Some(matcher.match_files(&working, MatchStrategy::OverrideCommand))
}
