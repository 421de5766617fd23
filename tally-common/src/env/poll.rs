//! poll.rs
//!
//! The locally reduced view of the currently known poll.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Title, options and tally of the poll as seen by this peer.
///
/// Only the reducer produces new values of this type; everyone else receives
/// clones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollState {
    pub title: String,
    /// Proposer's order. Duplicates are kept as proposed.
    pub options: Vec<String>,
    /// Option -> count. Options without a counter have zero votes.
    pub votes: BTreeMap<String, u64>,
}

/// One row of the results view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionResult {
    pub option: String,
    pub count: u64,
    /// Rounded share of the total, 0 when nobody voted.
    pub percentage: u8,
}

impl PollState {
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.options.is_empty() && self.votes.is_empty()
    }

    pub fn count(&self, option: &str) -> u64 {
        self.votes.get(option).copied().unwrap_or(0)
    }

    /// Sum of every counter, including counters for options that are not part
    /// of the current option list.
    pub fn total_votes(&self) -> u64 {
        self.votes.values().sum()
    }

    pub fn results(&self) -> Vec<OptionResult> {
        let total = self.total_votes();
        self.options
            .iter()
            .map(|option| {
                let count = self.count(option);
                let percentage = if total == 0 {
                    0
                } else {
                    ((count as f64 / total as f64) * 100.0).round() as u8
                };
                OptionResult {
                    option: option.clone(),
                    count,
                    percentage,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_include_options_without_votes() {
        let mut state = PollState {
            title: "Lunch".into(),
            options: vec!["Pizza".into(), "Tacos".into(), "Salad".into()],
            votes: BTreeMap::new(),
        };
        state.votes.insert("Pizza".into(), 2);
        state.votes.insert("Tacos".into(), 1);

        let results = state.results();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].count, 2);
        assert_eq!(results[0].percentage, 67);
        assert_eq!(results[1].percentage, 33);
        assert_eq!(results[2].count, 0);
        assert_eq!(results[2].percentage, 0);
    }

    #[test]
    fn test_empty_state_has_no_total() {
        let state = PollState::default();
        assert!(state.is_empty());
        assert_eq!(state.total_votes(), 0);
        assert!(state.results().is_empty());
    }
}
