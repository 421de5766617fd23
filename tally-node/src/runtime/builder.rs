use std::path::Path;
use std::sync::Arc;

use tally_common::{Account, Result};
use tally_core::Session;
use tally_peer::InMemoryPeer;
use tracing::info;

use crate::config::NodeConfig;
use crate::setup::load_or_generate_identity;

pub struct TallyRuntime {
    pub peer: Arc<InMemoryPeer>,
    pub session: Arc<Session<InMemoryPeer>>,
    pub account: Account,
}

fn build_peer(config: &NodeConfig) -> Result<InMemoryPeer> {
    let identity = load_or_generate_identity(Path::new(&config.data_dir))?;
    let mut peer = InMemoryPeer::new(identity.account.as_str()).with_pubkey(identity.pubkey);
    if let Some(hub) = &config.hub {
        peer = peer.with_hub(hub.address.clone(), hub.pubkey.clone());
    }
    if let Some(base) = &config.invite_base_url {
        peer = peer.with_invite_base(base.clone());
    }
    Ok(peer)
}

/// Wires a peer and a session from `config`, loads the account and starts
/// the voting and connection subscriptions.
pub async fn build_runtime(config: &NodeConfig, name: Option<&str>) -> Result<TallyRuntime> {
    let session_config = config.session_config()?;
    let peer = Arc::new(build_peer(config)?);
    let session = Arc::new(Session::new(Arc::clone(&peer), session_config));

    let mut account = session.load_account().await?;
    if let Some(name) = name.or(config.display_name.as_deref()) {
        if account.name != name {
            session.set_profile_name(name).await?;
            account = session.load_account().await?;
        }
    }
    info!("🔄 Account {} ({}) ready", account.id, account.name);

    session.subscribe_to_voting()?;
    session.subscribe_to_connections();

    Ok(TallyRuntime { peer, session, account })
}
