//! Core engine for the tally chat bot.
//!
//! This crate is transport-agnostic: the chat platform lives behind the
//! [`ports::ChatTransport`] port, implemented by adapter crates. Everything
//! with invariants lives here: the user registry, the event table and its
//! sweep, the command router and the persistence writer.

pub mod bot;
pub mod chatters;
pub mod commands;
pub mod config;
pub mod dice;
pub mod domain;
pub mod errors;
pub mod events;
pub mod logging;
pub mod persistence;
pub mod ports;
pub mod registry;
pub mod router;
pub mod util;

pub use errors::{Error, Result};
