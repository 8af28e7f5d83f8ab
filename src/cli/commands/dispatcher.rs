//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandContext`] for what every command shares
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::cli::args::{Cli, Commands, EnsureArgs};
use crate::config::{BootstrapConfig, SettingsStack};
use crate::error::Result;
use crate::process::ProcessRunner;

use super::cache::ClearCacheCommand;
use super::config::ConfigCommand;
use super::ensure::{EnsureCommand, EnsureMode};
use super::status::StatusCommand;

/// Output sink for command text.
pub type Output<'a> = &'a mut (dyn Write + Send);

/// Trait for command implementations.
#[async_trait]
pub trait Command: Send + Sync {
    /// Execute the command, writing user-facing text to `out`.
    async fn execute(&self, ctx: &CommandContext, out: Output<'_>) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug, PartialEq, Eq)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Shared state handed to every command.
pub struct CommandContext {
    pub settings: SettingsStack,
    pub config: BootstrapConfig,
    pub runner: Arc<dyn ProcessRunner>,
    pub cancel: CancellationToken,
}

impl CommandContext {
    /// Build a context from loaded settings.
    pub fn new(
        settings: SettingsStack,
        runner: Arc<dyn ProcessRunner>,
        cancel: CancellationToken,
    ) -> Self {
        let config = BootstrapConfig::from_settings(&settings);
        Self {
            settings,
            config,
            runner,
            cancel,
        }
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    ctx: CommandContext,
}

impl CommandDispatcher {
    pub fn new(ctx: CommandContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &CommandContext {
        &self.ctx
    }

    /// Dispatch and execute a command.
    ///
    /// Without a subcommand, `ensure` runs.
    pub async fn dispatch(&self, cli: &Cli, out: Output<'_>) -> Result<CommandResult> {
        let command: Box<dyn Command> = match &cli.command {
            None => Box::new(EnsureCommand::new(EnsureArgs::default(), EnsureMode::Memoized)),
            Some(Commands::Ensure(args)) => {
                Box::new(EnsureCommand::new(args.clone(), EnsureMode::Memoized))
            }
            Some(Commands::Rebootstrap(args)) => {
                Box::new(EnsureCommand::new(args.clone(), EnsureMode::Force))
            }
            Some(Commands::Status(args)) => Box::new(StatusCommand::new(args.clone())),
            Some(Commands::ClearCache) => Box::new(ClearCacheCommand),
            Some(Commands::Config(args)) => Box::new(ConfigCommand::new(args.clone())),
        };
        command.execute(&self.ctx, out).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_overrides;
    use crate::process::MockRunner;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn command_result_success() {
        let result = CommandResult::success();
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn command_result_failure() {
        let result = CommandResult::failure(2);
        assert!(!result.success);
        assert_eq!(result.exit_code, 2);
    }

    #[tokio::test]
    async fn dispatches_status() {
        let temp = TempDir::new().unwrap();
        let settings = SettingsStack::single(
            parse_overrides(&[format!("runtime-root={}", temp.path().display())]).unwrap(),
        );
        let dispatcher = CommandDispatcher::new(CommandContext::new(
            settings,
            Arc::new(MockRunner::new()),
            CancellationToken::new(),
        ));

        let cli = Cli::try_parse_from(["voxenv", "status"]).unwrap();
        let mut out = Vec::new();
        let result = dispatcher.dispatch(&cli, &mut out).await.unwrap();
        assert_eq!(result, CommandResult::success());
        assert!(String::from_utf8(out).unwrap().contains("Runtime root:"));
    }
}
