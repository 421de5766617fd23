use serde::{Deserialize, Serialize};

use crate::utils::AccountId;

/// Projection of a single `votingVote` record as it passes through the
/// reducer. Never stored; only its effect on the tally is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub option: String,
    pub voter: AccountId,
    /// Ingest time in milliseconds, not the time the vote was cast.
    pub timestamp: i64,
}
