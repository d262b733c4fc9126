//! Subcommand implementations.

pub mod find;
pub mod list;
pub mod watch;
