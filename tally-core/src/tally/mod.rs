pub mod reducer;

use std::sync::Arc;

use tally_common::{utils::time::current_time_millis, PollState, Record};
use tokio::sync::{broadcast, watch};
use tracing::info;

use crate::events::{PollUpdate, SessionEvent, VoteUpdate};
use reducer::Change;

/// Sole owner of the session's poll state.
///
/// Every accepted record produces a fresh snapshot on the watch channel and a
/// push notification on the event channel. Observers only ever see whole
/// states.
pub struct Tally {
    state: PollState,
    snapshots: watch::Sender<Arc<PollState>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Tally {
    pub fn new(
        snapshots: watch::Sender<Arc<PollState>>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            state: PollState::default(),
            snapshots,
            events,
        }
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    pub fn apply(&mut self, record: Record) {
        let (next, change) = reducer::step(std::mem::take(&mut self.state), &record, current_time_millis());
        self.state = next;
        let Some(change) = change else {
            return;
        };

        self.snapshots.send_replace(Arc::new(self.state.clone()));

        let event = match change {
            Change::Poll => {
                info!(target: "tally", "EVENT:POLL id={} title={:?} options={:?}", record.id, self.state.title, self.state.options);
                SessionEvent::PollUpdate(PollUpdate {
                    title: self.state.title.clone(),
                    options: self.state.options.clone(),
                    votes: self.state.votes.clone(),
                })
            }
            Change::Vote(vote) => {
                info!(target: "tally", "EVENT:VOTE id={} option={:?} voter={}", record.id, vote.option, vote.voter);
                SessionEvent::VoteUpdate(VoteUpdate {
                    option: vote.option,
                    voter: vote.voter,
                    votes: self.state.votes.clone(),
                })
            }
        };
        // No subscriber yet is not an error
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tally_common::{AccountId, Domain, RecordId};

    #[test]
    fn test_apply_publishes_snapshot_and_event() {
        let (snap_tx, snap_rx) = watch::channel(Arc::new(PollState::default()));
        let (evt_tx, mut evt_rx) = broadcast::channel(8);
        let mut tally = Tally::new(snap_tx, evt_tx);

        tally.apply(Record {
            id: RecordId::from("p1"),
            domain: Domain::Poll,
            data: Some(json!({ "title": "Lunch", "options": ["Pizza"] })),
            author: AccountId::from("alice"),
        });
        tally.apply(Record {
            id: RecordId::from("v1"),
            domain: Domain::Vote,
            data: Some(json!({ "option": "Pizza", "voter": "bob" })),
            author: AccountId::from("bob"),
        });

        let snapshot = snap_rx.borrow().clone();
        assert_eq!(snapshot.title, "Lunch");
        assert_eq!(snapshot.count("Pizza"), 1);

        match evt_rx.try_recv().unwrap() {
            SessionEvent::PollUpdate(update) => {
                assert_eq!(update.title, "Lunch");
                assert!(update.votes.is_empty());
            }
            other => panic!("unexpected event {other:?}"),
        }
        match evt_rx.try_recv().unwrap() {
            SessionEvent::VoteUpdate(update) => {
                assert_eq!(update.option, "Pizza");
                assert_eq!(update.voter, AccountId::from("bob"));
                assert_eq!(update.votes.get("Pizza"), Some(&1));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_ignored_record_publishes_nothing() {
        let (snap_tx, snap_rx) = watch::channel(Arc::new(PollState::default()));
        let (evt_tx, mut evt_rx) = broadcast::channel(8);
        let mut tally = Tally::new(snap_tx, evt_tx);

        tally.apply(Record {
            id: RecordId::from("x1"),
            domain: Domain::Profile,
            data: Some(json!({ "name": "Alice" })),
            author: AccountId::from("alice"),
        });

        assert!(!snap_rx.has_changed().unwrap());
        assert!(evt_rx.try_recv().is_err());
        assert!(tally.state().is_empty());
    }
}
