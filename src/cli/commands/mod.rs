//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results. Commands are
//! dispatched via [`CommandDispatcher`].

pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod ensure;
pub mod status;

pub use dispatcher::{Command, CommandContext, CommandDispatcher, CommandResult, Output};
pub use ensure::EnsureMode;
