//! invite
//!
//! Invite handling in two stages: a pure parse of the invite string into
//! typed commands, then sequential dispatch of those commands against the
//! peer node.

pub mod command;
pub mod dispatcher;
pub mod parser;
pub mod promise;
