use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use tally_common::{AccountId, Connection, Domain, Profile, Record};

use crate::error::PeerError;
use crate::scope::ScopeSet;

pub type RecordStream = BoxStream<'static, Record>;
pub type ConnectionStream = BoxStream<'static, Vec<Connection>>;

/// A record about to be appended to the local feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDraft {
    pub account: AccountId,
    pub domain: Domain,
    pub data: serde_json::Value,
}

/// Arguments of an invite issued to a friend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteRequest {
    /// How many hubs the invite should point at.
    pub hubs: usize,
    /// Account the invitee should follow.
    pub id: AccountId,
}

/// Raised when a secret-handshake connection with a remote peer completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectEvent {
    pub pubkey: String,
    pub multiaddr: String,
}

/// Untyped command as produced by the invite grammar. Always carries `type`;
/// the remaining fields depend on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl CommandDescriptor {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: serde_json::Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: serde_json::Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }
}

/// Everything the voting core needs from the local peer: the record log,
/// replication control, invites and the connection table.
#[async_trait]
pub trait PeerNode: Send + Sync + 'static {
    /// Identity the node signs its records with.
    fn local_account(&self) -> AccountId;

    async fn read_profile(&self, account: &AccountId) -> Result<Option<Profile>, PeerError>;

    async fn update_profile(&self, profile: Profile) -> Result<(), PeerError>;

    /// Full history in log order. Finite; every call starts from the beginning.
    fn records(&self) -> RecordStream;

    /// Live appends from now on. The receiver buffers until read.
    fn subscribe_records(&self) -> mpsc::UnboundedReceiver<Record>;

    async fn publish(&self, draft: RecordDraft) -> Result<Record, PeerError>;

    fn parse_invite(&self, uri: &str) -> Result<Vec<CommandDescriptor>, PeerError>;

    /// Returns the invite url.
    async fn create_invite(&self, request: InviteRequest) -> Result<String, PeerError>;

    async fn add_hub(&self, multiaddr: &str) -> Result<(), PeerError>;

    async fn add_to_set(&self, set: &str, value: &str) -> Result<(), PeerError>;

    async fn claim_follow_promise(
        &self,
        issuer_pubkey: &str,
        token: &str,
        account: &AccountId,
    ) -> Result<(), PeerError>;

    fn subscribe_connects(&self) -> broadcast::Receiver<ConnectEvent>;

    /// Full connection list, re-emitted on every change.
    fn peers(&self) -> ConnectionStream;

    async fn start_conductor(
        &self,
        account: &AccountId,
        scopes: &[ScopeSet],
        byte_budget: u64,
    ) -> Result<(), PeerError>;
}
