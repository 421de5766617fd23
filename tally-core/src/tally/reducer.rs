//! reducer.rs
//!
//! Pure state transition `(PollState, Record) -> PollState`.
//!
//! Only `votingPoll` and `votingVote` records with a payload change the state.
//! Anything else, including payloads of the wrong shape, leaves it untouched.
//! The function never suspends and never fails.

use serde::Deserialize;
use tally_common::{utils::time::current_time_millis, AccountId, Domain, PollData, PollState, Record, Vote};

/// What a record changed, for the notification layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Poll,
    Vote(Vote),
}

/// Votes written by older clients may omit the voter; the record author is
/// used instead.
#[derive(Deserialize)]
struct VotePayload {
    option: String,
    #[serde(default)]
    voter: Option<AccountId>,
}

/// Applies one record. `ingest_time` stamps the vote projection.
pub fn step(mut state: PollState, record: &Record, ingest_time: i64) -> (PollState, Option<Change>) {
    match record.domain {
        Domain::Poll => {
            let Some(poll) = record.payload::<PollData>() else {
                return (state, None);
            };
            // Last delivered wins, tally is kept
            state.title = poll.title;
            state.options = poll.options;
            (state, Some(Change::Poll))
        }
        Domain::Vote => {
            let Some(payload) = record.payload::<VotePayload>() else {
                return (state, None);
            };
            // No per-voter dedup: every vote record counts
            *state.votes.entry(payload.option.clone()).or_insert(0) += 1;
            let vote = Vote {
                option: payload.option,
                voter: payload.voter.unwrap_or_else(|| record.author.clone()),
                timestamp: ingest_time,
            };
            (state, Some(Change::Vote(vote)))
        }
        _ => (state, None),
    }
}

pub fn reduce(state: PollState, record: &Record) -> PollState {
    step(state, record, current_time_millis()).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tally_common::RecordId;

    fn poll(id: &str, title: &str, options: &[&str]) -> Record {
        Record {
            id: RecordId::from(id),
            domain: Domain::Poll,
            data: Some(json!({ "title": title, "options": options, "creator": "alice" })),
            author: AccountId::from("alice"),
        }
    }

    fn vote(id: &str, option: &str, voter: &str) -> Record {
        Record {
            id: RecordId::from(id),
            domain: Domain::Vote,
            data: Some(json!({ "option": option, "voter": voter, "timestamp": 1 })),
            author: AccountId::from(voter),
        }
    }

    fn fold(records: &[Record]) -> PollState {
        records.iter().fold(PollState::default(), reduce)
    }

    #[test]
    fn test_no_records_yields_empty_state() {
        let state = fold(&[]);
        assert_eq!(state.title, "");
        assert!(state.options.is_empty());
        assert!(state.votes.is_empty());
    }

    #[test]
    fn test_lunch_replay() {
        let state = fold(&[
            poll("p1", "Lunch", &["Pizza", "Tacos"]),
            vote("v1", "Pizza", "alice"),
            vote("v2", "Tacos", "bob"),
            vote("v3", "Pizza", "carol"),
        ]);
        assert_eq!(state.title, "Lunch");
        assert_eq!(state.options, vec!["Pizza", "Tacos"]);
        assert_eq!(state.count("Pizza"), 2);
        assert_eq!(state.count("Tacos"), 1);
        assert_eq!(state.votes.len(), 2);
    }

    #[test]
    fn test_same_record_twice_counts_twice() {
        let v = vote("v1", "Pizza", "alice");
        let state = fold(&[v.clone(), v]);
        assert_eq!(state.count("Pizza"), 2);
    }

    #[test]
    fn test_repeat_voter_is_not_deduplicated() {
        let state = fold(&[
            vote("v1", "Pizza", "alice"),
            vote("v2", "Pizza", "alice"),
            vote("v3", "Tacos", "alice"),
        ]);
        assert_eq!(state.count("Pizza"), 2);
        assert_eq!(state.count("Tacos"), 1);
    }

    #[test]
    fn test_vote_count_matches_occurrences_in_any_order() {
        let options = ["A", "B", "C"];
        let mut records = Vec::new();
        for i in 0..30 {
            let option = options[(i * 7 + i / 3) % 3];
            records.push(vote(&format!("v{i}"), option, "x"));
        }
        let forward = fold(&records);
        records.reverse();
        let backward = fold(&records);

        for option in options {
            let expected = records
                .iter()
                .filter(|r| r.data.as_ref().unwrap()["option"] == option)
                .count() as u64;
            assert_eq!(forward.count(option), expected);
            assert_eq!(backward.count(option), expected);
        }
    }

    #[test]
    fn test_latest_delivered_poll_wins_and_keeps_votes() {
        let state = fold(&[
            poll("p1", "Lunch", &["Pizza", "Tacos"]),
            vote("v1", "Pizza", "alice"),
            poll("p2", "Dinner", &["Sushi", "Sushi"]),
        ]);
        assert_eq!(state.title, "Dinner");
        assert_eq!(state.options, vec!["Sushi", "Sushi"]);
        assert_eq!(state.count("Pizza"), 1);
    }

    #[test]
    fn test_ignored_records() {
        let base = fold(&[poll("p1", "Lunch", &["Pizza"])]);

        let no_data = Record { data: None, ..vote("v1", "Pizza", "alice") };
        let profile = Record {
            id: RecordId::from("pr1"),
            domain: Domain::Profile,
            data: Some(json!({ "name": "Alice" })),
            author: AccountId::from("alice"),
        };
        let bad_shape = Record {
            data: Some(json!({ "choice": "Pizza" })),
            ..vote("v2", "Pizza", "alice")
        };

        for record in [no_data, profile, bad_shape] {
            let (next, change) = step(base.clone(), &record, 0);
            assert_eq!(next, base);
            assert!(change.is_none());
        }
    }

    #[test]
    fn test_vote_projection_uses_ingest_time_and_author_fallback() {
        let record = Record {
            id: RecordId::from("v9"),
            domain: Domain::Vote,
            data: Some(json!({ "option": "Tacos" })),
            author: AccountId::from("dave"),
        };
        let (_, change) = step(PollState::default(), &record, 1234);
        assert_eq!(
            change,
            Some(Change::Vote(Vote {
                option: "Tacos".into(),
                voter: AccountId::from("dave"),
                timestamp: 1234,
            }))
        );
    }
}
