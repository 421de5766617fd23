//! invite.rs
//!
//! Grammar of `pzp://invite/...` links.
//!
//! An invite is a flat sequence of path segments. Each command starts with its
//! keyword followed by a fixed number of arguments:
//!
//! - `join/<host:port>/<pubkey>/<token>`
//! - `follow/<account id>`
//! - `promise.follow/<issuerType>.<issuerKey>/<token>`
//!
//! Unknown keywords are kept with the segments that follow them, up to the
//! next known keyword, so newer invites still parse on older nodes.

use serde_json::json;

use crate::error::PeerError;
use crate::ports::CommandDescriptor;

pub const SCHEME: &str = "pzp://";
const PREFIX: &str = "pzp://invite/";

const JOIN: &str = "join";
const FOLLOW: &str = "follow";
const PROMISE_FOLLOW: &str = "promise.follow";

fn is_keyword(segment: &str) -> bool {
    matches!(segment, JOIN | FOLLOW | PROMISE_FOLLOW)
}

fn take<'a>(segments: &[&'a str], at: usize, n: usize, cmd: &str) -> Result<Vec<&'a str>, PeerError> {
    let args = segments
        .get(at..at + n)
        .ok_or_else(|| PeerError::Grammar(format!("'{cmd}' expects {n} arguments")))?;
    if let Some(kw) = args.iter().find(|a| is_keyword(a)) {
        return Err(PeerError::Grammar(format!("'{cmd}' is missing arguments before '{kw}'")));
    }
    Ok(args.to_vec())
}

/// Turns `host:port`, the hub pubkey and the join token into a multiaddr.
fn hub_multiaddr(address: &str, pubkey: &str, token: &str) -> Result<String, PeerError> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| PeerError::Grammar(format!("hub address '{address}' has no port")))?;
    let port: u16 = port
        .parse()
        .map_err(|_| PeerError::Grammar(format!("hub address '{address}' has a bad port")))?;
    Ok(format!("/ip4/{host}/tcp/{port}/shse/{pubkey}.{token}"))
}

pub fn parse(uri: &str) -> Result<Vec<CommandDescriptor>, PeerError> {
    let rest = uri
        .strip_prefix(PREFIX)
        .ok_or_else(|| PeerError::Grammar(format!("not an invite: {uri}")))?;
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Err(PeerError::Grammar("invite carries no commands".into()));
    }

    let mut commands = Vec::new();
    let mut i = 0;
    while i < segments.len() {
        let keyword = segments[i];
        i += 1;
        match keyword {
            JOIN => {
                let args = take(&segments, i, 3, JOIN)?;
                let multiaddr = hub_multiaddr(args[0], args[1], args[2])?;
                commands.push(CommandDescriptor::new(JOIN).with("multiaddr", json!(multiaddr)));
                i += 3;
            }
            FOLLOW => {
                let args = take(&segments, i, 1, FOLLOW)?;
                commands.push(CommandDescriptor::new(FOLLOW).with("id", json!(args[0])));
                i += 1;
            }
            PROMISE_FOLLOW => {
                let args = take(&segments, i, 2, PROMISE_FOLLOW)?;
                let (issuer_type, issuer_key) = args[0].split_once('.').ok_or_else(|| {
                    PeerError::Grammar(format!("issuer '{}' is not type.key", args[0]))
                })?;
                commands.push(
                    CommandDescriptor::new(PROMISE_FOLLOW)
                        .with("issuer", json!([issuer_type, issuer_key]))
                        .with("token", json!(args[1])),
                );
                i += 2;
            }
            other => {
                let start = i;
                while i < segments.len() && !is_keyword(segments[i]) {
                    i += 1;
                }
                commands.push(CommandDescriptor::new(other).with("args", json!(segments[start..i])));
            }
        }
    }
    Ok(commands)
}

/// Builds the `pzp://` link a friend consumes: join the hub, follow `account`,
/// and claim a follow promise issued by `issuer_pubkey`.
pub fn build_friend_invite(
    hub: Option<(&str, &str, &str)>,
    account: &str,
    issuer_pubkey: &str,
    promise_token: &str,
) -> String {
    let mut uri = String::from(PREFIX);
    if let Some((address, hub_pubkey, join_token)) = hub {
        uri.push_str(&format!("{JOIN}/{address}/{hub_pubkey}/{join_token}/"));
    }
    uri.push_str(&format!("{FOLLOW}/{account}/"));
    uri.push_str(&format!("{PROMISE_FOLLOW}/pubkey.{issuer_pubkey}/{promise_token}"));
    uri
}
