//! Command-line host for the bootstrapper.
//!
//! - [`args`] - Argument definitions using clap derive macros
//! - [`commands`] - Command implementations

pub mod args;
pub mod commands;

pub use args::{Cli, Commands, ConfigArgs, EnsureArgs, StatusArgs};
pub use commands::{Command, CommandContext, CommandDispatcher, CommandResult};
