use std::collections::BTreeMap;

use serde::Serialize;
use tally_common::{AccountId, Connection};

/// Pushed whenever a `votingPoll` record replaces the current poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollUpdate {
    pub title: String,
    pub options: Vec<String>,
    pub votes: BTreeMap<String, u64>,
}

/// Pushed for every counted vote, carrying the tally after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteUpdate {
    pub option: String,
    pub voter: AccountId,
    pub votes: BTreeMap<String, u64>,
}

/// Notifications a session pushes upward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "channel", content = "payload", rename_all = "camelCase")]
pub enum SessionEvent {
    PollUpdate(PollUpdate),
    VoteUpdate(VoteUpdate),
    Connections(Vec<Connection>),
}
