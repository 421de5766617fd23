use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tally_common::{AccountId, Domain};
use tally_peer::{PeerError, PeerNode, RetentionPolicy, Scope, ScopeSet};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Scope-sets tried by default: with hub discovery first, then without.
pub fn default_scope_sets() -> Vec<ScopeSet> {
    let base = vec![
        Scope::new(Domain::Profile, RetentionPolicy::Dict),
        Scope::new(Domain::Poll, RetentionPolicy::Newest(100)),
        Scope::new(Domain::Vote, RetentionPolicy::Newest(1000)),
    ];
    let mut with_hubs = base.clone();
    with_hubs.push(Scope::new(Domain::Hubs, RetentionPolicy::Set));
    vec![ScopeSet(with_hubs), ScopeSet(base)]
}

/// Starts the peer's conductor at most once per session.
pub struct ReplicationController<P: PeerNode> {
    peer: Arc<P>,
    started: AtomicBool,
}

impl<P: PeerNode> ReplicationController<P> {
    pub fn new(peer: Arc<P>) -> Self {
        Self {
            peer,
            started: AtomicBool::new(false),
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Starts replication after `delay`, in the background. The delay gives
    /// local listeners time to attach before the first remote records land.
    ///
    /// Failure goes to `on_error` and is not retried. Returns `None` if
    /// replication was already started.
    pub fn start<F>(
        &self,
        account: AccountId,
        scopes: Vec<ScopeSet>,
        byte_budget: u64,
        delay: Duration,
        on_error: F,
    ) -> Option<JoinHandle<()>>
    where
        F: FnOnce(PeerError) + Send + 'static,
    {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("replication already started, ignoring");
            return None;
        }

        let peer = Arc::clone(&self.peer);
        Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let described: Vec<String> = scopes.iter().map(|s| s.to_string()).collect();
            info!(%account, byte_budget, scopes = ?described, "🔄 starting conductor");

            match peer.start_conductor(&account, &scopes, byte_budget).await {
                Ok(()) => info!("✅ conductor running"),
                Err(e) => {
                    error!("Starting conductor failed: {}", e);
                    on_error(e);
                }
            }
        }))
    }
}
