// src/error.rs
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TallyError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Don't know how to claim a {0} promise")]
    UnsupportedIssuerType(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invite parse error: {0}")]
    Parse(String),

    #[error("Account not ready after {0:?}")]
    AccountNotReady(Duration),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TallyError>;
