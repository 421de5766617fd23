//! dispatcher.rs
//!
//! Runs parsed invite commands against the peer node, one at a time and in
//! link order. A command only starts once the previous one has finished, so a
//! hub is joined before anything that needs its connection.
//!
//! Failure policy per command:
//!
//! | command          | on failure                                   |
//! |------------------|----------------------------------------------|
//! | `join`           | logged, dispatch continues                   |
//! | `follow`         | returned to the caller, dispatch stops       |
//! | `promise.follow` | unsupported issuer: recorded, continues      |
//! | unknown          | logged, skipped                              |

use std::sync::Arc;

use tally_common::{AccountId, Result, TallyError};
use tally_peer::PeerNode;
use tracing::{error, info, warn};

use super::command::InviteCommand;
use super::promise::{spawn_promise_listener, PendingClaim};

/// Set that `follow` commands add to.
pub const FOLLOWS_SET: &str = "follows";

const PUBKEY_ISSUER: &str = "pubkey";

/// How one command ended.
#[derive(Debug)]
pub enum CommandOutcome {
    Joined { multiaddr: String },
    JoinFailed { multiaddr: String, reason: String },
    Followed { id: AccountId },
    /// The claim listener is registered; see [`DispatchReport::pending_claims`].
    ClaimPending { issuer_pubkey: String },
    Rejected(TallyError),
    Skipped { kind: String },
}

#[derive(Debug, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<CommandOutcome>,
    pub pending_claims: Vec<PendingClaim>,
}

pub struct CommandDispatcher<P: PeerNode> {
    peer: Arc<P>,
}

impl<P: PeerNode> CommandDispatcher<P> {
    pub fn new(peer: Arc<P>) -> Self {
        Self { peer }
    }

    pub async fn dispatch(&self, commands: Vec<InviteCommand>, account: &AccountId) -> Result<DispatchReport> {
        let mut report = DispatchReport::default();

        for command in commands {
            info!("Executing command {}", command);
            let outcome = match command {
                InviteCommand::Join { multiaddr } => match self.peer.add_hub(&multiaddr).await {
                    Ok(()) => CommandOutcome::Joined { multiaddr },
                    Err(e) => {
                        error!("Joining hub {} failed: {}", multiaddr, e);
                        CommandOutcome::JoinFailed {
                            multiaddr,
                            reason: e.to_string(),
                        }
                    }
                },
                InviteCommand::Follow { id } => {
                    self.peer.add_to_set(FOLLOWS_SET, id.as_str()).await?;
                    CommandOutcome::Followed { id }
                }
                InviteCommand::PromiseFollow { issuer: (kind, pubkey), token } => {
                    if kind != PUBKEY_ISSUER {
                        let err = TallyError::UnsupportedIssuerType(kind);
                        warn!("Skipping promise: {}", err);
                        CommandOutcome::Rejected(err)
                    } else {
                        let pending =
                            spawn_promise_listener(Arc::clone(&self.peer), pubkey.clone(), token, account.clone());
                        report.pending_claims.push(pending);
                        CommandOutcome::ClaimPending { issuer_pubkey: pubkey }
                    }
                }
                InviteCommand::Unknown { kind } => {
                    warn!("Unknown invite command type '{}', skipping", kind);
                    CommandOutcome::Skipped { kind }
                }
            };
            report.outcomes.push(outcome);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_peer::in_memory::{Faults, InMemoryPeer};

    fn join(addr: &str) -> InviteCommand {
        InviteCommand::Join { multiaddr: addr.into() }
    }

    fn follow(id: &str) -> InviteCommand {
        InviteCommand::Follow { id: AccountId::from(id) }
    }

    #[tokio::test]
    async fn test_join_attempted_before_follow() {
        let peer = Arc::new(InMemoryPeer::new("carol"));
        peer.set_faults(Faults { add_hub: true, ..Default::default() });
        let dispatcher = CommandDispatcher::new(Arc::clone(&peer));

        let report = dispatcher
            .dispatch(vec![join("/ip4/1.2.3.4/tcp/3000/shse/A.t"), follow("bob")], &AccountId::from("carol"))
            .await
            .unwrap();

        assert_eq!(
            peer.operations(),
            vec!["add_hub:/ip4/1.2.3.4/tcp/3000/shse/A.t", "add_to_set:follows:bob"]
        );
        assert!(matches!(report.outcomes[0], CommandOutcome::JoinFailed { .. }));
        assert!(matches!(report.outcomes[1], CommandOutcome::Followed { .. }));
        assert!(peer.hubs().is_empty());
        assert_eq!(peer.set_members(FOLLOWS_SET), vec!["bob"]);
    }

    #[tokio::test]
    async fn test_follow_failure_stops_dispatch() {
        let peer = Arc::new(InMemoryPeer::new("carol"));
        peer.set_faults(Faults { add_to_set: true, ..Default::default() });
        let dispatcher = CommandDispatcher::new(Arc::clone(&peer));

        let err = dispatcher
            .dispatch(vec![follow("bob"), join("/ip4/1.2.3.4/tcp/3000/shse/A.t")], &AccountId::from("carol"))
            .await
            .unwrap_err();

        assert!(matches!(err, TallyError::Transport(_)));
        assert_eq!(peer.operations(), vec!["add_to_set:follows:bob"]);
    }

    #[tokio::test]
    async fn test_unsupported_issuer_and_unknown_command_do_not_abort() {
        let peer = Arc::new(InMemoryPeer::new("carol"));
        let dispatcher = CommandDispatcher::new(Arc::clone(&peer));

        let report = dispatcher
            .dispatch(
                vec![
                    InviteCommand::PromiseFollow { issuer: ("email".into(), "x@y".into()), token: "t".into() },
                    InviteCommand::Unknown { kind: "teleport".into() },
                    follow("bob"),
                ],
                &AccountId::from("carol"),
            )
            .await
            .unwrap();

        match &report.outcomes[0] {
            CommandOutcome::Rejected(e) => {
                assert_eq!(e.to_string(), "Don't know how to claim a email promise")
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(matches!(report.outcomes[1], CommandOutcome::Skipped { ref kind } if kind == "teleport"));
        assert!(matches!(report.outcomes[2], CommandOutcome::Followed { .. }));
        assert!(report.pending_claims.is_empty());
    }

    #[tokio::test]
    async fn test_promise_follow_registers_pending_claim() {
        let peer = Arc::new(InMemoryPeer::new("carol"));
        let dispatcher = CommandDispatcher::new(Arc::clone(&peer));

        let mut report = dispatcher
            .dispatch(
                vec![InviteCommand::PromiseFollow { issuer: ("pubkey".into(), "K".into()), token: "t".into() }],
                &AccountId::from("carol"),
            )
            .await
            .unwrap();
        assert!(peer.claims().is_empty());

        peer.connect("K", "/ip4/2.2.2.2/tcp/3000/shse/K.x");
        let pending = report.pending_claims.pop().unwrap();
        pending.wait().await.unwrap();
        assert_eq!(peer.claims().len(), 1);
    }
}
