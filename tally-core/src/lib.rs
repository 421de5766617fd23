pub mod events;
pub mod invite;
pub mod replication;
pub mod session;
pub mod stream;
pub mod tally;

pub use events::{PollUpdate, SessionEvent, VoteUpdate};
pub use invite::{
    command::InviteCommand,
    dispatcher::{CommandDispatcher, CommandOutcome, DispatchReport},
    parser::{extract_uri, parse_invite, InviteParseError},
    promise::PendingClaim,
};
pub use replication::controller::{default_scope_sets, ReplicationController};
pub use session::{NewPoll, Session, SessionConfig};
pub use stream::consumer::{ConsumerHandle, RecordStreamConsumer};
pub use tally::{reducer, Tally};
