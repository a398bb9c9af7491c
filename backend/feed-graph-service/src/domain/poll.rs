//! Poll window, ballot validation and result aggregation.
//!
//! Nothing here is persisted: the window is derived from `created_at` and
//! `duration`, results are recounted from every VOTED edge on each read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use super::post::{PollDuration, PollOptionResult, VotingType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PollState {
    Open,
    Closed,
}

/// OPEN while `now < created_at + duration`
pub fn poll_state(created_at: DateTime<Utc>, duration: PollDuration, now: DateTime<Utc>) -> PollState {
    if now < created_at + duration.as_chrono() {
        PollState::Open
    } else {
        PollState::Closed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("Single vote type requires exactly one option to be selected.")]
    SingleVoteCardinality,
    #[error("Multi-vote type requires at least one option to be selected.")]
    MultiVoteCardinality,
    #[error("Option '{0}' is selected more than once.")]
    DuplicateOption(String),
    #[error("Option '{0}' does not exist in this poll.")]
    UnknownOption(String),
}

impl SelectionError {
    /// Label for the rejected-votes metric
    pub fn reason(&self) -> &'static str {
        match self {
            SelectionError::SingleVoteCardinality | SelectionError::MultiVoteCardinality => {
                "cardinality"
            }
            SelectionError::DuplicateOption(_) => "duplicate_option",
            SelectionError::UnknownOption(_) => "unknown_option",
        }
    }
}

/// Cardinality first, then membership of every selected title.
pub fn validate_selection(
    voting_type: VotingType,
    poll_options: &[String],
    selected: &[String],
) -> Result<(), SelectionError> {
    match voting_type {
        VotingType::SingleVote if selected.len() != 1 => {
            return Err(SelectionError::SingleVoteCardinality)
        }
        VotingType::MultiVote if selected.is_empty() => {
            return Err(SelectionError::MultiVoteCardinality)
        }
        _ => {}
    }

    let declared: HashSet<&str> = poll_options.iter().map(String::as_str).collect();
    let mut seen = HashSet::with_capacity(selected.len());
    for option in selected {
        if !seen.insert(option.as_str()) {
            return Err(SelectionError::DuplicateOption(option.clone()));
        }
        if !declared.contains(option.as_str()) {
            return Err(SelectionError::UnknownOption(option.clone()));
        }
    }
    Ok(())
}

/// Every ballot cast on a poll plus the viewer's own selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollBallots {
    pub ballots: Vec<Vec<String>>,
    pub chosen: Option<Vec<String>>,
}

impl PollBallots {
    /// Count per declared option, in declaration order. Titles that are no
    /// longer declared (poll edited after voting) are ignored.
    pub fn tally(&self, options: &[String]) -> Vec<PollOptionResult> {
        let mut counts: HashMap<&str, i64> = HashMap::new();
        for ballot in &self.ballots {
            for option in ballot {
                *counts.entry(option.as_str()).or_insert(0) += 1;
            }
        }

        let chosen: HashSet<&str> = self
            .chosen
            .iter()
            .flatten()
            .map(String::as_str)
            .collect();

        options
            .iter()
            .map(|title| PollOptionResult {
                title: title.clone(),
                count: counts.get(title.as_str()).copied().unwrap_or(0),
                chosen: chosen.contains(title.as_str()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn options() -> Vec<String> {
        vec!["red".into(), "green".into(), "blue".into()]
    }

    fn sel(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_poll_window_boundaries() {
        let now = Utc::now();
        let duration = PollDuration::ThreeDays;

        let expired = now - duration.as_chrono() - Duration::days(1);
        assert_eq!(poll_state(expired, duration, now), PollState::Closed);

        let almost = now - duration.as_chrono() + Duration::hours(1);
        assert_eq!(poll_state(almost, duration, now), PollState::Open);

        let exact = now - duration.as_chrono();
        assert_eq!(poll_state(exact, duration, now), PollState::Closed);
    }

    #[test]
    fn test_single_vote_cardinality() {
        assert_eq!(
            validate_selection(VotingType::SingleVote, &options(), &sel(&["red", "blue"])),
            Err(SelectionError::SingleVoteCardinality)
        );
        assert_eq!(
            validate_selection(VotingType::SingleVote, &options(), &[]),
            Err(SelectionError::SingleVoteCardinality)
        );
        assert!(validate_selection(VotingType::SingleVote, &options(), &sel(&["red"])).is_ok());
    }

    #[test]
    fn test_multi_vote_rules() {
        assert_eq!(
            validate_selection(VotingType::MultiVote, &options(), &[]),
            Err(SelectionError::MultiVoteCardinality)
        );
        assert_eq!(
            validate_selection(VotingType::MultiVote, &options(), &sel(&["red", "purple"])),
            Err(SelectionError::UnknownOption("purple".into()))
        );
        assert_eq!(
            validate_selection(VotingType::MultiVote, &options(), &sel(&["red", "red"])),
            Err(SelectionError::DuplicateOption("red".into()))
        );
        assert!(
            validate_selection(VotingType::MultiVote, &options(), &sel(&["red", "green", "blue"]))
                .is_ok()
        );
    }

    #[test]
    fn test_tally_counts_and_chosen_flags() {
        let ballots = PollBallots {
            ballots: vec![sel(&["red"]), sel(&["red", "blue"]), sel(&["green"])],
            chosen: Some(sel(&["red", "blue"])),
        };
        let results = ballots.tally(&options());

        assert_eq!(results[0].title, "red");
        assert_eq!(results[0].count, 2);
        assert!(results[0].chosen);
        assert_eq!(results[1].count, 1);
        assert!(!results[1].chosen);
        assert_eq!(results[2].count, 1);
        assert!(results[2].chosen);
        assert_eq!(ballots.ballots.len(), 3);
    }

    #[test]
    fn test_tally_ignores_undeclared_titles() {
        let ballots = PollBallots {
            ballots: vec![sel(&["orange"])],
            chosen: None,
        };
        let results = ballots.tally(&options());
        assert!(results.iter().all(|r| r.count == 0 && !r.chosen));
    }
}
