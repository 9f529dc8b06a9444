//! Pulse agent CLI library.
//!
//! This crate provides the `pulse` binary: one invocation per file-activity
//! event, which resolves the project, attempts delivery, and falls back to
//! the offline queue.

mod cli;
pub mod commands;
mod config;

pub use cli::Cli;
pub use config::{Config, ProjectMapEntry, SubmodulesDisabled};
