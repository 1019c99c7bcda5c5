//! The action keyword map published to clients.
//!
//! The UI maps user-typed words to canonical actions using this table; the
//! server accepts the action tag directly and treats unknown words as
//! `proceed` for robustness. Clients may cache the map for an hour.

use serde::{Deserialize, Serialize};

use crate::jobs::model::HitlAction;

/// Client cache TTL for the keyword map, in seconds.
pub const KEYWORDS_CACHE_TTL_SECS: u64 = 60 * 60;

/// Canonical action to keyword-list mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionKeywords {
    pub proceed: Vec<String>,
    pub revise: Vec<String>,
    pub cancel: Vec<String>,
}

impl Default for ActionKeywords {
    fn default() -> Self {
        fn words(list: &[&str]) -> Vec<String> {
            list.iter().map(|w| w.to_string()).collect()
        }
        Self {
            proceed: words(&["proceed", "yes", "ok", "continue", "approve", "accept", "go"]),
            revise: words(&["revise", "change", "edit", "modify", "rework", "feedback"]),
            cancel: words(&["cancel", "stop", "abort", "quit", "discard"]),
        }
    }
}

impl ActionKeywords {
    /// Map a user-typed word to an action. Unknown words map to `Proceed`.
    pub fn action_for(&self, word: &str) -> HitlAction {
        let lowered = word.trim().to_lowercase();
        if self.cancel.iter().any(|w| *w == lowered) {
            HitlAction::Cancel
        } else if self.revise.iter().any(|w| *w == lowered) {
            HitlAction::Revise
        } else {
            HitlAction::Proceed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_words_map_to_their_action() {
        let keywords = ActionKeywords::default();
        assert_eq!(keywords.action_for("proceed"), HitlAction::Proceed);
        assert_eq!(keywords.action_for("revise"), HitlAction::Revise);
        assert_eq!(keywords.action_for("cancel"), HitlAction::Cancel);
    }

    #[test]
    fn matching_ignores_case_and_whitespace() {
        let keywords = ActionKeywords::default();
        assert_eq!(keywords.action_for("  STOP "), HitlAction::Cancel);
        assert_eq!(keywords.action_for("Edit"), HitlAction::Revise);
    }

    #[test]
    fn unknown_words_default_to_proceed() {
        let keywords = ActionKeywords::default();
        assert_eq!(keywords.action_for("banana"), HitlAction::Proceed);
        assert_eq!(keywords.action_for(""), HitlAction::Proceed);
    }

    #[test]
    fn map_serializes_per_action() {
        let json = serde_json::to_string(&ActionKeywords::default()).unwrap();
        assert!(json.contains("\"proceed\""));
        assert!(json.contains("\"revise\""));
        assert!(json.contains("\"cancel\""));
    }
}
