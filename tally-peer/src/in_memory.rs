use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::StreamExt;
use rand::RngCore;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use tally_common::{
    utils::percent::encode_component, AccountId, Connection, ConnectionState, Domain, Profile,
    Record, RecordId,
};

use crate::error::PeerError;
use crate::invite;
use crate::ports::{
    CommandDescriptor, ConnectEvent, ConnectionStream, InviteRequest, PeerNode, RecordDraft,
    RecordStream,
};
use crate::scope::ScopeSet;

/// Operations that can be told to fail, to exercise degraded paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct Faults {
    pub add_hub: bool,
    pub add_to_set: bool,
    pub claim: bool,
    pub conductor: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromiseClaim {
    pub issuer_pubkey: String,
    pub token: String,
    pub account: AccountId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConductorRun {
    pub account: AccountId,
    pub scopes: Vec<ScopeSet>,
    pub byte_budget: u64,
}

#[derive(Debug, Clone)]
struct HubInfo {
    address: String,
    pubkey: String,
}

#[derive(Default)]
struct PeerState {
    log: Vec<Record>,
    seq: u64,
    live: Vec<mpsc::UnboundedSender<Record>>,
    profiles: HashMap<AccountId, Profile>,
    sets: HashMap<String, BTreeSet<String>>,
    hubs: Vec<String>,
    claims: Vec<PromiseClaim>,
    conductor_runs: Vec<ConductorRun>,
    issued_promises: Vec<String>,
    /// Side effects in call order, e.g. `add_hub:<multiaddr>`.
    operations: Vec<String>,
    faults: Faults,
}

impl PeerState {
    fn fan_out(&mut self, record: &Record) {
        self.live.retain(|tx| tx.send(record.clone()).is_ok());
    }
}

/// Single-process peer node: keeps the log, the dicts and sets in memory and
/// lets the caller drive the network side (remote records, connections).
pub struct InMemoryPeer {
    account: AccountId,
    pubkey: String,
    hub: Option<HubInfo>,
    invite_base: Option<String>,
    state: Mutex<PeerState>,
    connects: broadcast::Sender<ConnectEvent>,
    connections: watch::Sender<Vec<Connection>>,
}

fn random_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bs58::encode(bytes).into_string()
}

fn random_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

impl InMemoryPeer {
    pub fn new(account: impl Into<AccountId>) -> Self {
        let (connects, _) = broadcast::channel(64);
        let (connections, _) = watch::channel(Vec::new());
        Self {
            account: account.into(),
            pubkey: random_key(),
            hub: None,
            invite_base: None,
            state: Mutex::new(PeerState::default()),
            connects,
            connections,
        }
    }

    /// Fresh identity with a random account id.
    pub fn generate() -> Self {
        Self::new(AccountId(random_key()))
    }

    /// Hub advertised in issued invites. `address` is `host:port`, or a bare
    /// host when the hub listens on the default port.
    pub fn with_hub(mut self, address: impl Into<String>, pubkey: impl Into<String>) -> Self {
        self.hub = Some(HubInfo {
            address: address.into(),
            pubkey: pubkey.into(),
        });
        self
    }

    /// Wraps issued invites as `<base>/invite#<escaped pzp uri>`.
    pub fn with_invite_base(mut self, base: impl Into<String>) -> Self {
        self.invite_base = Some(base.into().trim_end_matches('/').to_string());
        self
    }

    /// Reuses a pubkey from an earlier run instead of a fresh one.
    pub fn with_pubkey(mut self, pubkey: impl Into<String>) -> Self {
        self.pubkey = pubkey.into();
        self
    }

    pub fn pubkey(&self) -> &str {
        &self.pubkey
    }

    fn lock(&self) -> MutexGuard<'_, PeerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_faults(&self, faults: Faults) {
        self.lock().faults = faults;
    }

    /// Appends a record replicated from elsewhere. Returns false if its id is
    /// already in the log.
    pub fn ingest(&self, record: Record) -> bool {
        let mut state = self.lock();
        if state.log.iter().any(|r| r.id == record.id) {
            return false;
        }
        debug!(id = %record.id, domain = %record.domain, "ingested remote record");
        state.log.push(record.clone());
        state.fan_out(&record);
        true
    }

    /// Pushes an already logged record to live subscribers again, as a
    /// replication layer racing with a history read would.
    pub fn redeliver(&self, record: &Record) {
        self.lock().fan_out(record);
    }

    /// Simulates a completed handshake with `pubkey` reachable at `multiaddr`.
    pub fn connect(&self, pubkey: &str, multiaddr: &str) {
        self.connections.send_modify(|list| {
            match list.iter_mut().find(|c| c.multiaddr == multiaddr) {
                Some(c) => c.state = ConnectionState::Connected,
                None => list.push(Connection::new(multiaddr, ConnectionState::Connected)),
            }
        });
        // Nobody listening is fine
        let _ = self.connects.send(ConnectEvent {
            pubkey: pubkey.to_string(),
            multiaddr: multiaddr.to_string(),
        });
    }

    pub fn disconnect(&self, multiaddr: &str) {
        self.connections.send_modify(|list| {
            if let Some(c) = list.iter_mut().find(|c| c.multiaddr == multiaddr) {
                c.state = ConnectionState::Disconnected;
            }
        });
    }

    pub fn log(&self) -> Vec<Record> {
        self.lock().log.clone()
    }

    pub fn hubs(&self) -> Vec<String> {
        self.lock().hubs.clone()
    }

    pub fn set_members(&self, set: &str) -> Vec<String> {
        self.lock()
            .sets
            .get(set)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn claims(&self) -> Vec<PromiseClaim> {
        self.lock().claims.clone()
    }

    pub fn conductor_runs(&self) -> Vec<ConductorRun> {
        self.lock().conductor_runs.clone()
    }

    pub fn issued_promises(&self) -> Vec<String> {
        self.lock().issued_promises.clone()
    }

    pub fn operations(&self) -> Vec<String> {
        self.lock().operations.clone()
    }

    fn append(&self, domain: Domain, data: serde_json::Value) -> Record {
        let mut state = self.lock();
        state.seq += 1;
        let record = Record {
            id: RecordId(format!("{}#{}", self.account, state.seq)),
            domain,
            data: Some(data),
            author: self.account.clone(),
        };
        state.log.push(record.clone());
        state.fan_out(&record);
        record
    }
}

#[async_trait]
impl PeerNode for InMemoryPeer {
    fn local_account(&self) -> AccountId {
        self.account.clone()
    }

    async fn read_profile(&self, account: &AccountId) -> Result<Option<Profile>, PeerError> {
        Ok(self.lock().profiles.get(account).cloned())
    }

    async fn update_profile(&self, profile: Profile) -> Result<(), PeerError> {
        let data = serde_json::to_value(&profile)?;
        self.lock().profiles.insert(self.account.clone(), profile);
        self.append(Domain::Profile, data);
        Ok(())
    }

    fn records(&self) -> RecordStream {
        let snapshot = self.lock().log.clone();
        futures::stream::iter(snapshot).boxed()
    }

    fn subscribe_records(&self) -> mpsc::UnboundedReceiver<Record> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().live.push(tx);
        rx
    }

    async fn publish(&self, draft: RecordDraft) -> Result<Record, PeerError> {
        if draft.account != self.account {
            return Err(PeerError::InvalidAccount(format!(
                "cannot publish as {} from {}",
                draft.account, self.account
            )));
        }
        let record = self.append(draft.domain, draft.data);
        debug!(id = %record.id, domain = %record.domain, "published record");
        Ok(record)
    }

    fn parse_invite(&self, uri: &str) -> Result<Vec<CommandDescriptor>, PeerError> {
        invite::parse(uri)
    }

    async fn create_invite(&self, request: InviteRequest) -> Result<String, PeerError> {
        let join_token = random_token();
        let hub = match (&self.hub, request.hubs) {
            (_, 0) => None,
            (Some(hub), _) => Some((hub.address.as_str(), hub.pubkey.as_str(), join_token.as_str())),
            (None, n) => {
                return Err(PeerError::Transport(format!("asked for {n} hub(s) but none is known")));
            }
        };

        let promise_token = random_token();
        let uri = invite::build_friend_invite(hub, request.id.as_str(), &self.pubkey, &promise_token);
        self.lock().issued_promises.push(promise_token);

        Ok(match &self.invite_base {
            Some(base) => format!("{base}/invite#{}", encode_component(&uri)),
            None => uri,
        })
    }

    async fn add_hub(&self, multiaddr: &str) -> Result<(), PeerError> {
        let mut state = self.lock();
        state.operations.push(format!("add_hub:{multiaddr}"));
        if state.faults.add_hub {
            return Err(PeerError::HubUnreachable(multiaddr.to_string()));
        }
        if !state.hubs.iter().any(|h| h == multiaddr) {
            state.hubs.push(multiaddr.to_string());
        }
        info!(%multiaddr, "hub added");
        Ok(())
    }

    async fn add_to_set(&self, set: &str, value: &str) -> Result<(), PeerError> {
        let mut state = self.lock();
        state.operations.push(format!("add_to_set:{set}:{value}"));
        if state.faults.add_to_set {
            return Err(PeerError::Transport(format!("set '{set}' is not writable")));
        }
        state.sets.entry(set.to_string()).or_default().insert(value.to_string());
        Ok(())
    }

    async fn claim_follow_promise(
        &self,
        issuer_pubkey: &str,
        token: &str,
        account: &AccountId,
    ) -> Result<(), PeerError> {
        let mut state = self.lock();
        state.operations.push(format!("claim:{issuer_pubkey}:{token}"));
        if state.faults.claim {
            return Err(PeerError::PromiseRejected(format!("token {token} refused by {issuer_pubkey}")));
        }
        state.claims.push(PromiseClaim {
            issuer_pubkey: issuer_pubkey.to_string(),
            token: token.to_string(),
            account: account.clone(),
        });
        Ok(())
    }

    fn subscribe_connects(&self) -> broadcast::Receiver<ConnectEvent> {
        self.connects.subscribe()
    }

    fn peers(&self) -> ConnectionStream {
        let rx = self.connections.subscribe();
        futures::stream::unfold((rx, true), |(mut rx, first)| async move {
            if !first && rx.changed().await.is_err() {
                return None;
            }
            let snapshot = rx.borrow_and_update().clone();
            Some((snapshot, (rx, false)))
        })
        .boxed()
    }

    async fn start_conductor(
        &self,
        account: &AccountId,
        scopes: &[ScopeSet],
        byte_budget: u64,
    ) -> Result<(), PeerError> {
        let mut state = self.lock();
        state.operations.push("start_conductor".to_string());
        if scopes.is_empty() {
            return Err(PeerError::InvalidScope("no scope set given".into()));
        }
        if state.faults.conductor {
            warn!("conductor refused to start");
            return Err(PeerError::Transport("conductor refused to start".into()));
        }
        state.conductor_runs.push(ConductorRun {
            account: account.clone(),
            scopes: scopes.to_vec(),
            byte_budget,
        });
        Ok(())
    }
}
