//! session
//!
//! The context object a UI or IPC layer drives. One `Session` wraps one peer
//! node and owns everything the voting core keeps per process: the cached
//! account, the poll state (through its [`Tally`]), the push channel and the
//! one-shot guards that keep each subscription unique.

mod loopback;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use tally_common::{
    utils::time::current_time_millis, Account, Domain, PollData, PollState, Profile, Record, Result,
    TallyError, VoteData,
};
use tally_peer::{InviteRequest, PeerNode, RecordDraft, ScopeSet};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::SessionEvent;
use crate::invite::dispatcher::{CommandDispatcher, DispatchReport};
use crate::invite::parser::parse_invite;
use crate::replication::controller::{default_scope_sets, ReplicationController};
use crate::stream::consumer::RecordStreamConsumer;
use crate::tally::Tally;

pub use loopback::rewrite_loopback;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Pause between attaching the record listener and starting replication.
    pub replication_delay: Duration,
    pub byte_budget: u64,
    pub scope_sets: Vec<ScopeSet>,
    /// How long `consume_invite` waits for the account to load.
    pub invite_ready_timeout: Duration,
    /// Port given to the `0.0.0.0` placeholder in issued invites.
    pub loopback_hub_port: u16,
    pub event_capacity: usize,
    /// Hubs an issued invite points at.
    pub invite_hubs: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            replication_delay: Duration::from_millis(32),
            byte_budget: 64_000,
            scope_sets: default_scope_sets(),
            invite_ready_timeout: Duration::from_secs(10),
            loopback_hub_port: 3000,
            event_capacity: 256,
            invite_hubs: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPoll {
    pub title: String,
    pub options: Vec<String>,
}

impl NewPoll {
    pub fn new<S: Into<String>>(title: impl Into<String>, options: impl IntoIterator<Item = S>) -> Self {
        Self {
            title: title.into(),
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    fn validated(self) -> Result<Self> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(TallyError::Validation("poll title is empty".into()));
        }
        let options: Vec<String> = self
            .options
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if options.is_empty() {
            return Err(TallyError::Validation("poll has no options".into()));
        }
        Ok(Self { title, options })
    }
}

pub struct Session<P: PeerNode> {
    peer: Arc<P>,
    config: SessionConfig,
    account: watch::Sender<Option<Account>>,
    events: broadcast::Sender<SessionEvent>,
    poll: watch::Receiver<Arc<PollState>>,
    /// Taken by the first `subscribe_to_voting`.
    tally: Mutex<Option<Tally>>,
    consumer: RecordStreamConsumer<P>,
    replication: ReplicationController<P>,
    dispatcher: CommandDispatcher<P>,
    connections_subscribed: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<P: PeerNode> Session<P> {
    pub fn new(peer: Arc<P>, config: SessionConfig) -> Self {
        let (account, _) = watch::channel(None);
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (snapshots, poll) = watch::channel(Arc::new(PollState::default()));
        let tally = Tally::new(snapshots, events.clone());

        Self {
            consumer: RecordStreamConsumer::new(Arc::clone(&peer)),
            replication: ReplicationController::new(Arc::clone(&peer)),
            dispatcher: CommandDispatcher::new(Arc::clone(&peer)),
            peer,
            config,
            account,
            events,
            poll,
            tally: Mutex::new(Some(tally)),
            connections_subscribed: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn peer(&self) -> &Arc<P> {
        &self.peer
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The loaded account, if any.
    pub fn account(&self) -> Option<Account> {
        self.account.borrow().clone()
    }

    fn require_account(&self) -> Result<Account> {
        self.account()
            .ok_or_else(|| TallyError::Validation("account not loaded".into()))
    }

    /// Reads the local identity and its profile name. Later calls return the
    /// cached account.
    pub async fn load_account(&self) -> Result<Account> {
        if let Some(account) = self.account() {
            return Ok(account);
        }

        let id = self.peer.local_account();
        let name = self
            .peer
            .read_profile(&id)
            .await?
            .map(|p| p.name)
            .unwrap_or_default();
        let account = Account { id, name };

        info!(account = %account.id, name = %account.name, "👤 account loaded");
        self.account.send_replace(Some(account.clone()));
        Ok(account)
    }

    pub async fn set_profile_name(&self, name: &str) -> Result<()> {
        self.require_account()?;
        let name = name.trim().to_string();
        self.peer.update_profile(Profile { name: name.clone() }).await?;
        self.account.send_modify(|account| {
            if let Some(account) = account {
                account.name = name;
            }
        });
        Ok(())
    }

    /// Publishes a `votingPoll` record. The tally changes only once the
    /// record comes back through the stream.
    pub async fn create_poll(&self, poll: NewPoll) -> Result<Record> {
        let account = self.require_account()?;
        let poll = poll.validated()?;
        let data = PollData {
            title: poll.title,
            options: poll.options,
            creator: Some(account.id.clone()),
        };

        let record = self
            .peer
            .publish(RecordDraft {
                account: account.id,
                domain: Domain::Poll,
                data: serde_json::to_value(&data)?,
            })
            .await?;
        info!(id = %record.id, title = %data.title, "🗳️ poll published");
        Ok(record)
    }

    pub async fn cast_vote(&self, option: &str) -> Result<Record> {
        let account = self.require_account()?;
        let option = option.trim();
        if option.is_empty() {
            return Err(TallyError::Validation("vote has no option".into()));
        }
        let data = VoteData {
            option: option.to_string(),
            voter: account.id.clone(),
            timestamp: current_time_millis(),
        };

        let record = self
            .peer
            .publish(RecordDraft {
                account: account.id,
                domain: Domain::Vote,
                data: serde_json::to_value(&data)?,
            })
            .await?;
        info!(id = %record.id, option = %data.option, "✅ vote published");
        Ok(record)
    }

    /// Issues an invite for a friend to join our hub and follow us.
    pub async fn create_invite(&self) -> Result<String> {
        let account = self.require_account()?;
        let url = self
            .peer
            .create_invite(InviteRequest {
                hubs: self.config.invite_hubs,
                id: account.id,
            })
            .await?;
        let url = rewrite_loopback(&url, self.config.loopback_hub_port);
        info!(target: "tally", "EVENT:INVITE issued url={}", url);
        Ok(url)
    }

    async fn wait_for_account(&self) -> Result<Account> {
        let timeout = self.config.invite_ready_timeout;
        let mut ready = self.account.subscribe();
        let loaded = match tokio::time::timeout(timeout, ready.wait_for(|a| a.is_some())).await {
            Ok(Ok(account)) => account.clone(),
            Ok(Err(_)) | Err(_) => None,
        };
        loaded.ok_or(TallyError::AccountNotReady(timeout))
    }

    /// Parses and runs an invite. Waits for the account to load first, up to
    /// `invite_ready_timeout`.
    ///
    /// A rejected invite is not an error: the report is simply empty.
    pub async fn consume_invite(&self, input: &str) -> Result<DispatchReport> {
        let account = match self.wait_for_account().await {
            Ok(account) => account,
            Err(e) => {
                warn!("Invite not handled: {}", e);
                return Err(e);
            }
        };

        let commands = parse_invite(self.peer.as_ref(), input);
        info!(target: "tally", "EVENT:INVITE consumed commands={}", commands.len());
        self.dispatcher.dispatch(commands, &account.id).await
    }

    /// Starts feeding the record log into the tally, then replication.
    /// Calling it again has no effect.
    pub fn subscribe_to_voting(&self) -> Result<()> {
        let account = self.require_account()?;
        let Some(mut tally) = lock(&self.tally).take() else {
            debug!("already subscribed to voting");
            return Ok(());
        };

        if let Some(handle) = self.consumer.consume(move |record| tally.apply(record)) {
            lock(&self.tasks).push(handle.into_task());
        }

        let started = self.replication.start(
            account.id,
            self.config.scope_sets.clone(),
            self.config.byte_budget,
            self.config.replication_delay,
            |e| warn!("Replication unavailable, continuing with local data: {}", e),
        );
        if let Some(handle) = started {
            lock(&self.tasks).push(handle);
        }
        Ok(())
    }

    /// Forwards every connection list the peer reports as
    /// [`SessionEvent::Connections`]. Calling it again has no effect.
    pub fn subscribe_to_connections(&self) {
        if self.connections_subscribed.swap(true, Ordering::SeqCst) {
            debug!("already subscribed to connections");
            return;
        }

        let mut peers = self.peer.peers();
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            while let Some(list) = peers.next().await {
                debug!(count = list.len(), "connections changed");
                let _ = events.send(SessionEvent::Connections(list));
            }
        });
        lock(&self.tasks).push(task);
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn poll_snapshot(&self) -> Arc<PollState> {
        self.poll.borrow().clone()
    }

    pub fn watch_poll(&self) -> watch::Receiver<Arc<PollState>> {
        self.poll.clone()
    }
}

impl<P: PeerNode> Drop for Session<P> {
    fn drop(&mut self) {
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_peer::InMemoryPeer;

    fn session(peer: InMemoryPeer) -> Session<InMemoryPeer> {
        Session::new(Arc::new(peer), SessionConfig::default())
    }

    #[tokio::test]
    async fn test_load_account_reads_profile_once() {
        let s = session(InMemoryPeer::new("alice"));
        assert!(s.account().is_none());

        let account = s.load_account().await.unwrap();
        assert_eq!(account.id.as_str(), "alice");
        assert_eq!(account.name, "");

        s.set_profile_name("  Alice ").await.unwrap();
        assert_eq!(s.load_account().await.unwrap().name, "Alice");
    }

    #[tokio::test]
    async fn test_publishing_requires_account() {
        let s = session(InMemoryPeer::new("alice"));
        let err = s.cast_vote("Pizza").await.unwrap_err();
        assert!(matches!(err, TallyError::Validation(_)));
        let err = s.create_poll(NewPoll::new("Lunch", ["Pizza"])).await.unwrap_err();
        assert!(matches!(err, TallyError::Validation(_)));
        assert!(s.subscribe_to_voting().is_err());
        assert!(s.peer().log().is_empty());
    }

    #[tokio::test]
    async fn test_poll_validation() {
        let s = session(InMemoryPeer::new("alice"));
        s.load_account().await.unwrap();

        assert!(s.create_poll(NewPoll::new("  ", ["Pizza"])).await.is_err());
        assert!(s.create_poll(NewPoll::new("Lunch", [" ", ""])).await.is_err());
        assert!(s.cast_vote(" ").await.is_err());

        let record = s.create_poll(NewPoll::new(" Lunch ", ["Pizza", " ", "Tacos"])).await.unwrap();
        let data: PollData = record.payload().unwrap();
        assert_eq!(data.title, "Lunch");
        assert_eq!(data.options, vec!["Pizza", "Tacos"]);
        assert_eq!(data.creator.unwrap().as_str(), "alice");
    }

    #[tokio::test]
    async fn test_invite_placeholder_gets_loopback_port() {
        let peer = InMemoryPeer::new("alice").with_hub("0.0.0.0", "HUB");
        let s = session(peer);
        s.load_account().await.unwrap();

        let url = s.create_invite().await.unwrap();
        assert!(url.starts_with("pzp://invite/join/0.0.0.0:3000/HUB/"));
        assert!(url.contains("/follow/alice/"));
    }
}
