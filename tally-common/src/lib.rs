pub mod env;
pub mod error;
pub mod utils;

pub use env::{
    account::{Account, Profile},
    connection::{Connection, ConnectionState},
    poll::{OptionResult, PollState},
    record::{Domain, PollData, Record, RecordId, VoteData},
    vote::Vote,
};
pub use error::{Result, TallyError};
pub use utils::AccountId;
