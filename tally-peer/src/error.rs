use tally_common::TallyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    #[error("Hub unreachable: {0}")]
    HubUnreachable(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unrecognized invite: {0}")]
    Grammar(String),

    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    #[error("Promise rejected: {0}")]
    PromiseRejected(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<PeerError> for TallyError {
    fn from(err: PeerError) -> Self {
        match err {
            PeerError::InvalidAccount(msg) => TallyError::Validation(msg),
            PeerError::Grammar(msg) => TallyError::Parse(msg),
            PeerError::InvalidScope(msg) => TallyError::Config(msg),
            PeerError::Serialization(e) => TallyError::Serialization(e),
            other => TallyError::Transport(other.to_string()),
        }
    }
}
