use std::fmt;

use serde::Deserialize;
use tally_common::AccountId;
use tally_peer::CommandDescriptor;

use super::parser::InviteParseError;

/// One unit of work carried by an invite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteCommand {
    /// Add the multiaddr as a sync hub.
    Join { multiaddr: String },
    /// Add the account to the local `follows` set.
    Follow { id: AccountId },
    /// Claim a follow promise once connected to the issuer.
    PromiseFollow { issuer: (String, String), token: String },
    /// Any `type` this node does not understand.
    Unknown { kind: String },
}

#[derive(Deserialize)]
struct JoinArgs {
    multiaddr: String,
}

#[derive(Deserialize)]
struct FollowArgs {
    id: AccountId,
}

#[derive(Deserialize)]
struct PromiseFollowArgs {
    issuer: (String, String),
    token: String,
}

impl InviteCommand {
    pub fn kind(&self) -> &str {
        match self {
            InviteCommand::Join { .. } => "join",
            InviteCommand::Follow { .. } => "follow",
            InviteCommand::PromiseFollow { .. } => "promise.follow",
            InviteCommand::Unknown { kind } => kind,
        }
    }
}

impl fmt::Display for InviteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InviteCommand::Join { multiaddr } => write!(f, "join({multiaddr})"),
            InviteCommand::Follow { id } => write!(f, "follow({id})"),
            InviteCommand::PromiseFollow { issuer, .. } => {
                write!(f, "promise.follow({}:{})", issuer.0, issuer.1)
            }
            InviteCommand::Unknown { kind } => write!(f, "unknown({kind})"),
        }
    }
}

fn args<T: for<'de> Deserialize<'de>>(descriptor: CommandDescriptor) -> Result<T, InviteParseError> {
    let kind = descriptor.kind;
    serde_json::from_value(serde_json::Value::Object(descriptor.fields))
        .map_err(|e| InviteParseError::Malformed { kind, reason: e.to_string() })
}

impl TryFrom<CommandDescriptor> for InviteCommand {
    type Error = InviteParseError;

    fn try_from(descriptor: CommandDescriptor) -> Result<Self, Self::Error> {
        match descriptor.kind.as_str() {
            "join" => {
                let JoinArgs { multiaddr } = args(descriptor)?;
                Ok(InviteCommand::Join { multiaddr })
            }
            "follow" => {
                let FollowArgs { id } = args(descriptor)?;
                Ok(InviteCommand::Follow { id })
            }
            "promise.follow" => {
                let PromiseFollowArgs { issuer, token } = args(descriptor)?;
                Ok(InviteCommand::PromiseFollow { issuer, token })
            }
            _ => Ok(InviteCommand::Unknown { kind: descriptor.kind }),
        }
    }
}
