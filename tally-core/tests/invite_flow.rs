use std::sync::Arc;
use std::time::Duration;

use tally_common::{AccountId, TallyError};
use tally_core::{CommandOutcome, Session, SessionConfig};
use tally_peer::in_memory::{Faults, InMemoryPeer};

#[tokio::test]
async fn test_friend_invite_round_trip() {
    let alice_peer = Arc::new(
        InMemoryPeer::new("alice")
            .with_hub("10.0.0.1:3000", "HUBKEY")
            .with_invite_base("https://hub.example"),
    );
    let alice = Session::new(Arc::clone(&alice_peer), SessionConfig::default());
    alice.load_account().await.unwrap();
    let url = alice.create_invite().await.unwrap();
    assert!(url.starts_with("https://hub.example/invite#pzp%3A%2F%2Finvite%2F"));

    let carol_peer = Arc::new(InMemoryPeer::new("carol"));
    let carol = Session::new(Arc::clone(&carol_peer), SessionConfig::default());
    carol.load_account().await.unwrap();

    let mut report = carol.consume_invite(&url).await.unwrap();
    assert_eq!(report.outcomes.len(), 3);
    assert!(matches!(report.outcomes[0], CommandOutcome::Joined { .. }));
    assert!(matches!(report.outcomes[1], CommandOutcome::Followed { .. }));
    assert!(matches!(
        report.outcomes[2],
        CommandOutcome::ClaimPending { ref issuer_pubkey } if issuer_pubkey == alice_peer.pubkey()
    ));

    let hubs = carol_peer.hubs();
    assert_eq!(hubs.len(), 1);
    assert!(hubs[0].starts_with("/ip4/10.0.0.1/tcp/3000/shse/HUBKEY."));
    assert_eq!(carol_peer.set_members("follows"), vec!["alice"]);
    assert!(carol_peer.claims().is_empty());

    // Handshake with some other peer first, then with alice
    carol_peer.connect("SOMEONE", "/ip4/10.0.0.9/tcp/3000/shse/SOMEONE.x");
    carol_peer.connect(alice_peer.pubkey(), "/ip4/10.0.0.2/tcp/3000/shse/alice.x");
    report.pending_claims.pop().unwrap().wait().await.unwrap();

    let claims = carol_peer.claims();
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].account, AccountId::from("carol"));
    assert_eq!(vec![claims[0].token.clone()], alice_peer.issued_promises());
}

#[tokio::test]
async fn test_hub_failure_does_not_stop_follow() {
    let peer = Arc::new(InMemoryPeer::new("carol"));
    peer.set_faults(Faults { add_hub: true, ..Default::default() });
    let session = Session::new(Arc::clone(&peer), SessionConfig::default());
    session.load_account().await.unwrap();

    let report = session
        .consume_invite("pzp://invite/join/1.2.3.4:3000/HUB/jt/follow/bob")
        .await
        .unwrap();

    assert!(matches!(report.outcomes[0], CommandOutcome::JoinFailed { .. }));
    assert!(matches!(report.outcomes[1], CommandOutcome::Followed { .. }));
    assert_eq!(
        peer.operations(),
        vec!["add_hub:/ip4/1.2.3.4/tcp/3000/shse/HUB.jt", "add_to_set:follows:bob"]
    );
}

#[tokio::test]
async fn test_rejected_invite_runs_nothing() {
    let peer = Arc::new(InMemoryPeer::new("carol"));
    let session = Session::new(Arc::clone(&peer), SessionConfig::default());
    session.load_account().await.unwrap();

    for input in ["ssb://invite/follow/bob", "https://example.com/invite#pzp%3A%2F%2Fabc", "follow bob"] {
        let report = session.consume_invite(input).await.unwrap();
        assert!(report.outcomes.is_empty());
    }
    assert!(peer.operations().is_empty());
}

#[tokio::test]
async fn test_invite_waits_for_account() {
    let peer = Arc::new(InMemoryPeer::new("carol"));
    let session = Session::new(Arc::clone(&peer), SessionConfig::default());

    let (report, account) = tokio::join!(session.consume_invite("pzp://invite/follow/bob"), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.load_account().await
    });

    assert_eq!(account.unwrap().id, AccountId::from("carol"));
    assert!(matches!(report.unwrap().outcomes[0], CommandOutcome::Followed { .. }));
    assert_eq!(peer.set_members("follows"), vec!["bob"]);
}

#[tokio::test]
async fn test_invite_gives_up_when_account_never_loads() {
    let peer = Arc::new(InMemoryPeer::new("carol"));
    let session = Session::new(
        Arc::clone(&peer),
        SessionConfig {
            invite_ready_timeout: Duration::from_millis(30),
            ..Default::default()
        },
    );

    let err = session.consume_invite("pzp://invite/follow/bob").await.unwrap_err();
    assert!(matches!(err, TallyError::AccountNotReady(_)));
    assert!(peer.operations().is_empty());
}

#[tokio::test]
async fn test_follow_failure_reaches_caller() {
    let peer = Arc::new(InMemoryPeer::new("carol"));
    peer.set_faults(Faults { add_to_set: true, ..Default::default() });
    let session = Session::new(Arc::clone(&peer), SessionConfig::default());
    session.load_account().await.unwrap();

    let err = session
        .consume_invite("pzp://invite/follow/bob/promise.follow/pubkey.K/t")
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::Transport(_)));
    assert_eq!(peer.operations(), vec!["add_to_set:follows:bob"]);
}
