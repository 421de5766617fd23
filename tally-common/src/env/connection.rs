//! connection.rs
//!
//! Projection of the peer node's network state.
//!
//! The connection stream always carries the full list; consumers replace
//! their previous view instead of patching it.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConnectionState {
    Connected,
    Disconnected,
    /// Any other transport-defined state, e.g. "connecting".
    Other(String),
}

impl From<String> for ConnectionState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "connected" => ConnectionState::Connected,
            "disconnected" => ConnectionState::Disconnected,
            _ => ConnectionState::Other(value),
        }
    }
}

impl From<ConnectionState> for String {
    fn from(value: ConnectionState) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connected => f.write_str("connected"),
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Other(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub multiaddr: String,
    pub state: ConnectionState,
}

impl Connection {
    pub fn new(multiaddr: impl Into<String>, state: ConnectionState) -> Self {
        Self {
            multiaddr: multiaddr.into(),
            state,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Public key embedded in the `shse` segment of the multiaddr.
    ///
    /// `/ip4/1.2.3.4/tcp/3000/shse/KEY.TOKEN` yields `KEY`.
    pub fn pubkey(&self) -> Option<&str> {
        let mut parts = self.multiaddr.split('/');
        parts.find(|p| *p == "shse")?;
        let segment = parts.next()?;
        segment.split('.').next().filter(|k| !k.is_empty())
    }

    /// Connections that carry an IP address are hubs; peers reached through a
    /// hub tunnel are not.
    pub fn is_hub(&self) -> bool {
        self.multiaddr.contains("/ip4")
    }

    /// Short human label: the first 10 characters of the embedded key.
    pub fn label(&self) -> String {
        match self.pubkey() {
            Some(key) => {
                let short: String = key.chars().take(10).collect();
                if self.is_hub() {
                    format!("{short}... (hub)")
                } else {
                    format!("{short}...")
                }
            }
            None => self.multiaddr.clone(),
        }
    }
}
