//! Temporal queries over a built timeline.
//!
//! [`History`] borrows a [`Timeline`] and answers the questions the
//! policy layers ask: label churn, notification recency, maintainer
//! commands, generated-comment bookkeeping. None of the queries mutate
//! the timeline or cache their answers.

use chrono::{DateTime, Utc};
use tracing::trace;

use triage_domain::{Event, EventKind, Timeline, TriageConfig};

/// Comments starting with this marker quote an earlier message and are
/// never scanned for commands.
const REPLY_QUOTE_PREFIX: &str = "_From @";

/// Tag line marker in generated comments.
const BOILERPLATE_MARKER: &str = "boilerplate:";

/// One generated comment found by [`History::get_boilerplate_comments`].
#[derive(Debug, Clone, PartialEq)]
pub struct BoilerplateComment<'a> {
    pub created_at: DateTime<Utc>,
    pub tag: &'a str,
    pub body: &'a str,
}

/// Read-only query view over one issue's timeline.
pub struct History<'a> {
    timeline: &'a Timeline,
    config: &'a TriageConfig,
}

impl<'a> History<'a> {
    pub fn new(timeline: &'a Timeline, config: &'a TriageConfig) -> Self {
        History { timeline, config }
    }

    pub fn timeline(&self) -> &'a Timeline {
        self.timeline
    }

    // -----------------------------------------------------------------------
    // Label history
    // -----------------------------------------------------------------------

    /// Whether `label` was ever applied by an actor outside `excluding`.
    pub fn was_labeled(&self, label: &str, excluding: &[&str]) -> bool {
        self.timeline.iter().any(|e| {
            matches!(&e.kind, EventKind::Labeled { label: l } if l == label)
                && !excluding.contains(&e.actor.as_str())
        })
    }

    /// Whether `label` was ever removed by an actor outside `excluding`.
    pub fn was_unlabeled(&self, label: &str, excluding: &[&str]) -> bool {
        self.timeline.iter().any(|e| {
            matches!(&e.kind, EventKind::Unlabeled { label: l } if l == label)
                && !excluding.contains(&e.actor.as_str())
        })
    }

    /// When `label` was most recently applied, by any actor.
    pub fn label_last_applied(&self, label: &str) -> Option<DateTime<Utc>> {
        self.timeline
            .iter()
            .rev()
            .find(|e| matches!(&e.kind, EventKind::Labeled { label: l } if l == label))
            .map(|e| e.created_at)
    }

    /// When `label` was most recently removed, by any actor.
    pub fn label_last_removed(&self, label: &str) -> Option<DateTime<Utc>> {
        self.timeline
            .iter()
            .rev()
            .find(|e| matches!(&e.kind, EventKind::Unlabeled { label: l } if l == label))
            .map(|e| e.created_at)
    }

    /// Labels that were ever applied or removed by actors outside
    /// `excluding`, optionally restricted to a name prefix. Sorted and
    /// deduplicated.
    pub fn get_changed_labels(&self, prefix: Option<&str>, excluding: &[&str]) -> Vec<String> {
        let mut labels: Vec<String> = self
            .timeline
            .iter()
            .filter(|e| !excluding.contains(&e.actor.as_str()))
            .filter_map(Event::label)
            .filter(|l| prefix.map_or(true, |p| l.starts_with(p)))
            .map(str::to_string)
            .collect();
        labels.sort_unstable();
        labels.dedup();
        labels
    }

    /// Whether `label` has flipped on/off at least `threshold` times.
    ///
    /// Pure frequency count over the whole timeline; ordering of the
    /// flips is irrelevant. `None` uses the configured default.
    pub fn label_is_waffling(&self, label: &str, threshold: Option<usize>) -> bool {
        let limit = threshold.unwrap_or(self.config.waffling_threshold);
        let flips = self
            .timeline
            .iter()
            .filter(|e| e.label() == Some(label))
            .count();
        flips >= limit
    }

    // -----------------------------------------------------------------------
    // Comment history
    // -----------------------------------------------------------------------

    /// Latest comment that mentions `@actor`.
    pub fn last_notified(&self, actor: &str) -> Option<DateTime<Utc>> {
        let mention = format!("@{actor}");
        self.timeline
            .iter()
            .rev()
            .find(|e| {
                matches!(&e.kind, EventKind::Commented { body } if body.contains(&mention))
            })
            .map(|e| e.created_at)
    }

    /// Latest comment authored by `actor`, with its body.
    pub fn last_comment(&self, actor: &str) -> Option<(DateTime<Utc>, &'a str)> {
        self.timeline.iter().rev().find_map(|e| match &e.kind {
            EventKind::Commented { body } if e.actor == actor => Some((e.created_at, body.as_str())),
            _ => None,
        })
    }

    /// Generated comments carrying a `boilerplate:` tag line, oldest
    /// first, optionally filtered to one tag. Only comments from the
    /// configured bot identities are considered.
    pub fn get_boilerplate_comments(&self, tag: Option<&str>) -> Vec<BoilerplateComment<'a>> {
        let mut found = Vec::new();
        for event in self.timeline {
            if !self.config.is_bot(&event.actor) {
                continue;
            }
            let EventKind::Commented { body } = &event.kind else {
                continue;
            };
            let Some(found_tag) = extract_boilerplate_tag(body) else {
                continue;
            };
            if tag.is_some_and(|t| t != found_tag) {
                continue;
            }
            found.push(BoilerplateComment {
                created_at: event.created_at,
                tag: found_tag,
                body,
            });
        }
        found
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Collect command tokens issued by `permitted` actors, in timeline
    /// order, restricted to `valid_commands`.
    ///
    /// Comment bodies are matched token-by-token so a command never
    /// fires as a prefix of a longer word. Reply-quoted comments are
    /// skipped outright, and a body containing the suspension token
    /// yields nothing but that token. Label events whose name is itself
    /// a valid command count as `command` (applied) or `!command`
    /// (removed). A trailing negation pass cancels each `!x` against the
    /// most recent uncancelled `x`; unpaired negations survive so
    /// callers can see an explicit "off" with no prior "on".
    pub fn get_commands(&self, permitted: &[&str], valid_commands: &[&str]) -> Vec<String> {
        let mut raw: Vec<String> = Vec::new();

        for event in self.timeline {
            if self.config.is_bot(&event.actor) || !permitted.contains(&event.actor.as_str()) {
                continue;
            }
            match &event.kind {
                EventKind::Commented { body } => {
                    if body.starts_with(REPLY_QUOTE_PREFIX) {
                        continue;
                    }
                    let tokens: Vec<&str> = body.split_whitespace().collect();
                    let suspended = tokens.iter().any(|t| *t == self.config.suspend_token);
                    for command in valid_commands {
                        if suspended && *command != self.config.suspend_token {
                            continue;
                        }
                        let negated = format!("!{command}");
                        if tokens.iter().any(|t| *t == negated) {
                            raw.push(negated);
                        } else if tokens.iter().any(|t| t == command) {
                            raw.push((*command).to_string());
                        }
                    }
                }
                EventKind::Labeled { label } if valid_commands.contains(&label.as_str()) => {
                    raw.push(label.clone());
                }
                EventKind::Unlabeled { label } if valid_commands.contains(&label.as_str()) => {
                    raw.push(format!("!{label}"));
                }
                _ => {}
            }
        }

        let commands = cancel_negations(raw);
        trace!(commands = ?commands, "collected commands");
        commands
    }

    /// Bodies of non-bot comments containing at least one line that
    /// starts with `command_key`, in timeline order.
    pub fn get_command_comments(&self, command_key: &str) -> Vec<&'a str> {
        self.timeline
            .iter()
            .filter(|e| !self.config.is_bot(&e.actor))
            .filter_map(|e| match &e.kind {
                EventKind::Commented { body } => Some(body.as_str()),
                _ => None,
            })
            .filter(|body| body.lines().any(|l| l.trim().starts_with(command_key)))
            .collect()
    }

    /// On/off state of a single-word toggle command.
    ///
    /// The last permitted comment whose whole trimmed body is exactly
    /// `command` or `!command` decides; anything else leaves the state
    /// untouched. `None` means the command was never issued.
    pub fn command_status(&self, command: &str, permitted: &[&str]) -> Option<bool> {
        let negated = format!("!{command}");
        let mut status = None;
        for event in self.timeline {
            if self.config.is_bot(&event.actor) || !permitted.contains(&event.actor.as_str()) {
                continue;
            }
            let EventKind::Commented { body } = &event.kind else {
                continue;
            };
            let body = body.trim();
            if body == command {
                status = Some(true);
            } else if body == negated {
                status = Some(false);
            }
        }
        status
    }
}

/// Pull the tag out of the first `boilerplate:` line of a comment body.
fn extract_boilerplate_tag(body: &str) -> Option<&str> {
    let line = body.lines().find(|l| l.contains(BOILERPLATE_MARKER))?;
    let mut tokens = line.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == BOILERPLATE_MARKER {
            return tokens.next();
        }
    }
    None
}

/// Cancel each `!x` against the most recent uncancelled `x`.
fn cancel_negations(raw: Vec<String>) -> Vec<String> {
    let mut resolved: Vec<String> = Vec::with_capacity(raw.len());
    for token in raw {
        if let Some(positive) = token.strip_prefix('!') {
            if let Some(idx) = resolved.iter().rposition(|t| t == positive) {
                resolved.remove(idx);
                continue;
            }
        }
        resolved.push(token);
    }
    resolved
}
