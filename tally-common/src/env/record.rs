//! record.rs
//!
//! Entries of the append-only replicated log and the payloads of the two
//! voting domains.
//!
//! Records are immutable once observed. The `data` payload is kept as raw JSON
//! so records of domains this crate does not know about still flow through
//! the stream untouched.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::AccountId;

/// Log-assigned record identifier. Unique within the local view of the log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId(value.to_string())
    }
}

/// Classifies the purpose of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Domain {
    Profile,
    Poll,
    Vote,
    Hubs,
    Other(String),
}

impl Domain {
    pub fn as_str(&self) -> &str {
        match self {
            Domain::Profile => "profile",
            Domain::Poll => "votingPoll",
            Domain::Vote => "votingVote",
            Domain::Hubs => "hubs",
            Domain::Other(s) => s,
        }
    }
}

impl From<&str> for Domain {
    fn from(value: &str) -> Self {
        match value {
            "profile" => Domain::Profile,
            "votingPoll" => Domain::Poll,
            "votingVote" => Domain::Vote,
            "hubs" => Domain::Hubs,
            other => Domain::Other(other.to_string()),
        }
    }
}

impl From<String> for Domain {
    fn from(value: String) -> Self {
        Domain::from(value.as_str())
    }
}

impl From<Domain> for String {
    fn from(value: Domain) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the append-only log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub domain: Domain,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    pub author: AccountId,
}

impl Record {
    /// Decodes the payload as `T`.
    ///
    /// Returns `None` when the payload is absent or does not have the shape
    /// of `T`.
    pub fn payload<T: for<'de> Deserialize<'de>>(&self) -> Option<T> {
        let data = self.data.as_ref()?;
        serde_json::from_value(data.clone()).ok()
    }
}

/// Payload of a `votingPoll` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollData {
    pub title: String,
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<AccountId>,
}

/// Payload of a `votingVote` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteData {
    pub option: String,
    pub voter: AccountId,
    #[serde(default)]
    pub timestamp: i64,
}
