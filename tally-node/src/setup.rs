use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tally_peer::{InMemoryPeer, PeerNode};
use tracing::info;

use crate::config::NodeConfig;

const IDENTITY_FILE: &str = "identity.json";

/// Writes a default config at `path` if there is none yet, then loads it.
pub fn ensure_config(path: &str) -> io::Result<NodeConfig> {
    if !Path::new(path).exists() {
        info!("⚠️ No config at {}, writing defaults...", path);

        let short = uuid::Uuid::new_v4().simple().to_string();
        let config = NodeConfig {
            display_name: Some(format!("voter-{}", &short[..8])),
            ..Default::default()
        };
        config.save_to_file(path)?;
        info!("✅ Default config written");
    }
    NodeConfig::load_from_file(path)
}

/// The keys a node signs with. Stable across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub account: String,
    pub pubkey: String,
}

/// Loads the identity kept under `data_dir`, or generates and stores a new one.
pub fn load_or_generate_identity(data_dir: &Path) -> io::Result<Identity> {
    let path = data_dir.join(IDENTITY_FILE);
    if path.exists() {
        let data = fs::read_to_string(&path)?;
        return serde_json::from_str(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e));
    }

    let fresh = InMemoryPeer::generate();
    let identity = Identity {
        account: fresh.local_account().to_string(),
        pubkey: fresh.pubkey().to_string(),
    };
    fs::create_dir_all(data_dir)?;
    let json = serde_json::to_string_pretty(&identity).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    fs::write(&path, json)?;
    info!(account = %identity.account, "🔑 generated new identity");
    Ok(identity)
}
