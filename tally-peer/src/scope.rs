//! Replication scopes: which domains the conductor keeps in sync and how much
//! of each it retains. Written as `domain@policy`, e.g. `votingVote@newest-1000`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tally_common::Domain;

use crate::error::PeerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetentionPolicy {
    /// Only the latest value per key.
    Dict,
    /// The most recent N records.
    Newest(usize),
    /// The full unordered set.
    Set,
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetentionPolicy::Dict => f.write_str("dict"),
            RetentionPolicy::Newest(n) => write!(f, "newest-{n}"),
            RetentionPolicy::Set => f.write_str("set"),
        }
    }
}

impl FromStr for RetentionPolicy {
    type Err = PeerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dict" => Ok(RetentionPolicy::Dict),
            "set" => Ok(RetentionPolicy::Set),
            _ => {
                let n = s
                    .strip_prefix("newest-")
                    .ok_or_else(|| PeerError::InvalidScope(format!("unknown policy '{s}'")))?;
                let n = n
                    .parse::<usize>()
                    .map_err(|e| PeerError::InvalidScope(format!("bad count in '{s}': {e}")))?;
                if n == 0 {
                    return Err(PeerError::InvalidScope(format!("'{s}' keeps nothing")));
                }
                Ok(RetentionPolicy::Newest(n))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Scope {
    pub domain: Domain,
    pub policy: RetentionPolicy,
}

impl Scope {
    pub fn new(domain: Domain, policy: RetentionPolicy) -> Self {
        Self { domain, policy }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.domain, self.policy)
    }
}

impl FromStr for Scope {
    type Err = PeerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (domain, policy) = s
            .split_once('@')
            .ok_or_else(|| PeerError::InvalidScope(format!("'{s}' is not domain@policy")))?;
        if domain.is_empty() {
            return Err(PeerError::InvalidScope(format!("'{s}' has no domain")));
        }
        Ok(Scope {
            domain: Domain::from(domain),
            policy: policy.parse()?,
        })
    }
}

impl TryFrom<String> for Scope {
    type Error = PeerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Scope> for String {
    fn from(value: Scope) -> Self {
        value.to_string()
    }
}

/// One alternative the conductor may run with. Alternatives are tried in
/// order until one is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeSet(pub Vec<Scope>);

impl ScopeSet {
    pub fn parse<S: AsRef<str>>(items: &[S]) -> Result<Self, PeerError> {
        items
            .iter()
            .map(|s| s.as_ref().parse())
            .collect::<Result<Vec<_>, _>>()
            .map(ScopeSet)
    }

    pub fn domains(&self) -> impl Iterator<Item = &Domain> {
        self.0.iter().map(|s| &s.domain)
    }

    pub fn contains(&self, domain: &Domain) -> bool {
        self.domains().any(|d| d == domain)
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|s| s.to_string()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}
