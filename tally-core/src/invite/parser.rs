//! parser.rs
//!
//! Invite strings arrive either as a raw `pzp://` URI or as a web link whose
//! fragment carries the escaped URI, e.g.
//! `https://host/invite#pzp%3A%2F%2Finvite%2F...`. Both forms reduce to the
//! raw URI before the peer's grammar is applied.
//!
//! Parsing never fails towards the caller: a rejected invite is logged and
//! yields no commands.

use tally_common::utils::percent::decode_component;
use tally_peer::{invite::SCHEME, PeerNode};
use thiserror::Error;
use tracing::{debug, warn};

use super::command::InviteCommand;

const FRAGMENT_MARKER: &str = "/invite#";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InviteParseError {
    #[error("not an invite: {0}")]
    NotAnInvite(String),

    #[error("web link has no '/invite#' fragment")]
    MissingFragment,

    #[error("bad escape in invite fragment: {0}")]
    BadEscape(String),

    #[error("malformed '{kind}' command: {reason}")]
    Malformed { kind: String, reason: String },

    #[error("grammar rejected invite: {0}")]
    Grammar(String),
}

fn is_web_link(input: &str) -> bool {
    input.starts_with("http:") || input.starts_with("https://")
}

/// Reduces an invite string to its raw `pzp://` URI.
pub fn extract_uri(input: &str) -> Result<String, InviteParseError> {
    let input = input.trim();
    let uri = if is_web_link(input) {
        let (_, fragment) = input
            .split_once(FRAGMENT_MARKER)
            .ok_or(InviteParseError::MissingFragment)?;
        decode_component(fragment).map_err(|e| InviteParseError::BadEscape(e.to_string()))?
    } else {
        input.to_string()
    };

    if !uri.starts_with(SCHEME) {
        return Err(InviteParseError::NotAnInvite(uri));
    }
    Ok(uri)
}

/// Full parse. Fails if the invite as a whole is rejected; a single known
/// command with a malformed payload is logged and dropped.
pub fn try_parse_invite<P: PeerNode>(peer: &P, input: &str) -> Result<Vec<InviteCommand>, InviteParseError> {
    let uri = extract_uri(input)?;
    let descriptors = peer
        .parse_invite(&uri)
        .map_err(|e| InviteParseError::Grammar(e.to_string()))?;
    Ok(descriptors
        .into_iter()
        .filter_map(|d| match InviteCommand::try_from(d) {
            Ok(command) => Some(command),
            Err(e) => {
                warn!("Dropping invite command: {}", e);
                None
            }
        })
        .collect())
}

/// Parses an invite into commands in link order. A rejected invite is logged
/// and yields an empty list.
pub fn parse_invite<P: PeerNode>(peer: &P, input: &str) -> Vec<InviteCommand> {
    match try_parse_invite(peer, input) {
        Ok(commands) => {
            debug!(count = commands.len(), "parsed invite");
            commands
        }
        Err(e) => {
            warn!("Rejected invite: {}", e);
            Vec::new()
        }
    }
}
