use std::fmt;
use std::sync::Arc;

use tally_common::AccountId;
use tally_peer::{PeerError, PeerNode};
use tokio::sync::{broadcast::error::RecvError, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A follow promise waiting for its issuer to connect.
///
/// The claim runs in the background. Its outcome is delivered through
/// [`PendingClaim::wait`]; dropping the handle leaves the listener running and
/// the outcome is only logged.
pub struct PendingClaim {
    pub issuer_pubkey: String,
    result: oneshot::Receiver<Result<(), PeerError>>,
    task: JoinHandle<()>,
}

impl fmt::Debug for PendingClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingClaim")
            .field("issuer_pubkey", &self.issuer_pubkey)
            .finish_non_exhaustive()
    }
}

impl PendingClaim {
    /// Resolves once the claim has been attempted. Errors with
    /// `PromiseRejected` if the listener stopped before the issuer connected.
    pub async fn wait(self) -> Result<(), PeerError> {
        match self.result.await {
            Ok(outcome) => outcome,
            Err(_) => Err(PeerError::PromiseRejected(format!(
                "listener for {} ended before the issuer connected",
                self.issuer_pubkey
            ))),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn cancel(self) {
        self.task.abort();
    }
}

/// Waits for the first connection whose pubkey is `issuer_pubkey`, then claims
/// the promise exactly once. The connect subscription is taken before this
/// returns, so a handshake completing right after is not missed.
pub fn spawn_promise_listener<P: PeerNode>(
    peer: Arc<P>,
    issuer_pubkey: String,
    token: String,
    account: AccountId,
) -> PendingClaim {
    let mut connects = peer.subscribe_connects();
    let (tx, rx) = oneshot::channel();
    let issuer = issuer_pubkey.clone();

    let task = tokio::spawn(async move {
        loop {
            match connects.recv().await {
                Ok(event) if event.pubkey == issuer => {
                    debug!(pubkey = %issuer, multiaddr = %event.multiaddr, "promise issuer connected");
                    break;
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "connect events lagged while waiting for promise issuer");
                }
                Err(RecvError::Closed) => {
                    warn!(pubkey = %issuer, "connect events closed before promise issuer connected");
                    return;
                }
            }
        }
        // Unregister before claiming so later connects cannot re-trigger
        drop(connects);

        let outcome = peer.claim_follow_promise(&issuer, &token, &account).await;
        match &outcome {
            Ok(()) => info!(pubkey = %issuer, "🤝 follow promise claimed"),
            Err(e) => error!("Claiming follow promise from {} failed: {}", issuer, e),
        }
        let _ = tx.send(outcome);
    });

    PendingClaim {
        issuer_pubkey,
        result: rx,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_peer::in_memory::{Faults, InMemoryPeer};

    #[tokio::test]
    async fn test_claims_once_on_first_matching_connect() {
        let peer = Arc::new(InMemoryPeer::new("carol"));
        let pending = spawn_promise_listener(Arc::clone(&peer), "K".into(), "tok".into(), AccountId::from("carol"));

        peer.connect("K2", "/ip4/1.1.1.1/tcp/3000/shse/K2.x");
        peer.connect("K", "/ip4/2.2.2.2/tcp/3000/shse/K.x");
        pending.wait().await.unwrap();

        peer.connect("K", "/ip4/2.2.2.2/tcp/3000/shse/K.x");
        tokio::task::yield_now().await;

        let claims = peer.claims();
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].issuer_pubkey, "K");
        assert_eq!(claims[0].token, "tok");
        assert_eq!(claims[0].account, AccountId::from("carol"));
    }

    #[tokio::test]
    async fn test_listener_pending_until_issuer_connects() {
        let peer = Arc::new(InMemoryPeer::new("carol"));
        let pending = spawn_promise_listener(Arc::clone(&peer), "K".into(), "tok".into(), AccountId::from("carol"));

        peer.connect("K2", "/ip4/1.1.1.1/tcp/3000/shse/K2.x");
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(!pending.is_finished());
        assert!(peer.claims().is_empty());

        peer.connect("K", "/ip4/2.2.2.2/tcp/3000/shse/K.x");
        for _ in 0..200 {
            if pending.is_finished() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert!(pending.is_finished());
        pending.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_claim_failure_reaches_waiter() {
        let peer = Arc::new(InMemoryPeer::new("carol"));
        peer.set_faults(Faults { claim: true, ..Default::default() });
        let pending = spawn_promise_listener(Arc::clone(&peer), "K".into(), "tok".into(), AccountId::from("carol"));

        peer.connect("K", "/ip4/2.2.2.2/tcp/3000/shse/K.x");
        let err = pending.wait().await.unwrap_err();
        assert!(matches!(err, PeerError::PromiseRejected(_)));
    }

    #[tokio::test]
    async fn test_cancelled_listener_never_claims() {
        let peer = Arc::new(InMemoryPeer::new("carol"));
        let pending = spawn_promise_listener(Arc::clone(&peer), "K".into(), "tok".into(), AccountId::from("carol"));
        pending.cancel();
        tokio::task::yield_now().await;

        peer.connect("K", "/ip4/2.2.2.2/tcp/3000/shse/K.x");
        tokio::task::yield_now().await;
        assert!(peer.claims().is_empty());
    }
}
