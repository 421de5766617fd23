//! env
//!
//! Domain model shared by every tally crate: log records and their payloads,
//! the reduced poll view, vote projections, account profiles and connection
//! snapshots.

pub mod account;
pub mod connection;
pub mod poll;
pub mod record;
pub mod vote;
