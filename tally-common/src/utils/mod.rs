//! utils.rs
//!
//! Common types and helper implementations shared across tally.
//!
//! This module provides the account identifier newtype and time helpers.

pub mod account_id;
pub use account_id::AccountId;

pub mod percent;
pub mod time;
