//! Triage pass configuration.
//!
//! All policy knobs are passed by value into the engines so that
//! concurrent passes with different policies never share mutable state.

use serde::{Deserialize, Serialize};

/// Configuration for one triage pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageConfig {
    /// Bot identities excluded from all actor-classification logic.
    pub botnames: Vec<String>,
    /// Core-team logins, the highest command/approval authority.
    pub core_team: Vec<String>,
    /// Label whose presence requires a matching `labeled` cache event.
    pub needs_info_label: String,
    /// Label toggled by the needs-revision state machine.
    pub revision_label: String,
    /// Comment phrases counted as approvals.
    pub approval_phrases: Vec<String>,
    /// Token that suspends all other commands in the same comment.
    pub suspend_token: String,
    /// Label flip count at which a label counts as waffling.
    pub waffling_threshold: usize,
    /// Days after which an unanswered change request goes stale.
    pub stale_review_days: i64,
}

impl Default for TriageConfig {
    fn default() -> Self {
        TriageConfig {
            botnames: Vec::new(),
            core_team: Vec::new(),
            needs_info_label: "needs_info".to_string(),
            revision_label: "needs_revision".to_string(),
            approval_phrases: vec![
                "shipit".to_string(),
                "+1".to_string(),
                "LGTM".to_string(),
            ],
            suspend_token: "bot_broken".to_string(),
            waffling_threshold: 20,
            stale_review_days: 7,
        }
    }
}

impl TriageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_botnames(mut self, botnames: Vec<String>) -> Self {
        self.botnames = botnames;
        self
    }

    pub fn with_core_team(mut self, core_team: Vec<String>) -> Self {
        self.core_team = core_team;
        self
    }

    pub fn with_waffling_threshold(mut self, threshold: usize) -> Self {
        self.waffling_threshold = threshold;
        self
    }

    pub fn with_stale_review_days(mut self, days: i64) -> Self {
        self.stale_review_days = days;
        self
    }

    /// Whether the actor is one of the configured bots.
    pub fn is_bot(&self, actor: &str) -> bool {
        self.botnames.iter().any(|b| b == actor)
    }

    /// Whether the actor is on the core team (bots never qualify).
    pub fn is_core_team(&self, actor: &str) -> bool {
        !self.is_bot(actor) && self.core_team.iter().any(|c| c == actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TriageConfig::default();
        assert_eq!(config.waffling_threshold, 20);
        assert_eq!(config.revision_label, "needs_revision");
        assert!(config.approval_phrases.contains(&"shipit".to_string()));
    }

    #[test]
    fn test_bot_never_core_team() {
        let config = TriageConfig::new()
            .with_botnames(vec!["triagebot".to_string()])
            .with_core_team(vec!["triagebot".to_string(), "alice".to_string()]);
        assert!(config.is_bot("triagebot"));
        assert!(!config.is_core_team("triagebot"));
        assert!(config.is_core_team("alice"));
    }
}
