//! # mailroom-cli
//!
//! Argument parsing, config loading and logging setup for the `mailroom` binary.

pub mod cli;
pub mod logger;

pub use cli::{read_message, search_query, Cli, Commands, DEFAULT_DATABASE_URL};
pub use logger::init_tracing;
