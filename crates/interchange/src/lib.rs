//! texter-interchange: typed session-load payload and its deserialization.
//!
//! A texting session starts from one read of everything the engine needs
//! about a contact: the interaction-step tree with any persisted answers,
//! the prior message history, and the script context (contact, texter and
//! campaign custom fields). This crate turns that JSON document into plain
//! structs; the engine crates convert them into their own representations.

pub mod deserialize;
pub mod types;

pub use deserialize::{from_json, InterchangeError};
pub use types::*;
