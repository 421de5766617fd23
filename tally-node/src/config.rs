use std::{fs, io, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use tally_common::{Result, TallyError};
use tally_core::SessionConfig;
use tally_peer::ScopeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubConfig {
    /// `host:port`, or the bare `0.0.0.0` placeholder for a local hub.
    pub address: String,
    pub pubkey: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub data_dir: String,
    pub display_name: Option<String>,
    pub replication_delay_ms: u64,
    pub byte_budget: u64,
    /// Alternatives in preference order, each written as `domain@policy`.
    pub scope_sets: Vec<Vec<String>>,
    pub invite_ready_timeout_ms: u64,
    pub loopback_hub_port: u16,
    pub event_capacity: usize,
    pub invite_base_url: Option<String>,
    pub hub: Option<HubConfig>,
    pub log_dir: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            data_dir: "data".to_string(),
            display_name: None,
            replication_delay_ms: session.replication_delay.as_millis() as u64,
            byte_budget: session.byte_budget,
            scope_sets: session
                .scope_sets
                .iter()
                .map(|set| set.0.iter().map(|s| s.to_string()).collect())
                .collect(),
            invite_ready_timeout_ms: session.invite_ready_timeout.as_millis() as u64,
            loopback_hub_port: session.loopback_hub_port,
            event_capacity: session.event_capacity,
            invite_base_url: None,
            hub: None,
            log_dir: "logs".to_string(),
        }
    }
}

impl NodeConfig {
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, json)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let data = fs::read_to_string(path)?;
        serde_json::from_str::<NodeConfig>(&data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Checks the textual scope sets and builds the session settings.
    pub fn session_config(&self) -> Result<SessionConfig> {
        if self.scope_sets.is_empty() {
            return Err(TallyError::Config("scope_sets is empty".into()));
        }
        let scope_sets = self
            .scope_sets
            .iter()
            .map(|set| ScopeSet::parse(set))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(SessionConfig {
            replication_delay: Duration::from_millis(self.replication_delay_ms),
            byte_budget: self.byte_budget,
            scope_sets,
            invite_ready_timeout: Duration::from_millis(self.invite_ready_timeout_ms),
            loopback_hub_port: self.loopback_hub_port,
            event_capacity: self.event_capacity,
            invite_hubs: usize::from(self.hub.is_some()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_session_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.replication_delay_ms, 32);
        assert_eq!(config.byte_budget, 64_000);
        assert_eq!(config.loopback_hub_port, 3000);
        assert_eq!(config.scope_sets[1], vec!["profile@dict", "votingPoll@newest-100", "votingVote@newest-1000"]);

        let session = config.session_config().unwrap();
        assert_eq!(session.scope_sets, SessionConfig::default().scope_sets);
        assert_eq!(session.invite_hubs, 0);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: NodeConfig = serde_json::from_str(r#"{ "byte_budget": 10 }"#).unwrap();
        assert_eq!(config.byte_budget, 10);
        assert_eq!(config.data_dir, "data");
    }

    #[test]
    fn test_bad_scope_is_a_config_error() {
        let config = NodeConfig {
            scope_sets: vec![vec!["votingVote@forever".into()]],
            ..Default::default()
        };
        assert!(matches!(config.session_config(), Err(TallyError::Config(_))));

        let config = NodeConfig { scope_sets: vec![], ..Default::default() };
        assert!(config.session_config().is_err());
    }
}
