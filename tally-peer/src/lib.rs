pub mod error;
pub mod in_memory;
pub mod invite;
pub mod ports;
pub mod scope;

pub use error::PeerError;
pub use in_memory::InMemoryPeer;
pub use ports::{CommandDescriptor, ConnectEvent, InviteRequest, PeerNode, RecordDraft};
pub use scope::{RetentionPolicy, Scope, ScopeSet};
