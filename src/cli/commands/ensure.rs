//! Ensure and rebootstrap command implementation.
//!
//! Provides `voxenv ensure` and `voxenv rebootstrap`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::bootstrap::{BootstrapResult, Bootstrapper, StatusCenter};
use crate::cli::args::EnsureArgs;
use crate::error::{BootstrapError, Result};

use super::dispatcher::{Command, CommandContext, CommandResult, Output};

/// How long to wait for the status printer to drain after a run.
const PRINTER_DRAIN: Duration = Duration::from_secs(1);

/// Which bootstrapper entry point to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureMode {
    Memoized,
    Force,
}

/// The ensure command implementation.
pub struct EnsureCommand {
    args: EnsureArgs,
    mode: EnsureMode,
}

impl EnsureCommand {
    pub fn new(args: EnsureArgs, mode: EnsureMode) -> Self {
        Self { args, mode }
    }
}

#[async_trait]
impl Command for EnsureCommand {
    async fn execute(&self, ctx: &CommandContext, out: Output<'_>) -> Result<CommandResult> {
        let center = Arc::new(StatusCenter::new());
        let printer = (!self.args.quiet).then(|| {
            let mut rx = center.subscribe();
            tokio::spawn(async move {
                while rx.changed().await.is_ok() {
                    let status = rx.borrow_and_update().clone();
                    eprintln!("[{}] {}", status.state, status.message);
                }
            })
        });

        let bootstrapper =
            Bootstrapper::new(ctx.config.clone(), Arc::clone(&ctx.runner), center.clone());
        let result = match self.mode {
            EnsureMode::Memoized => bootstrapper.ensure_ready(ctx.cancel.clone()).await,
            EnsureMode::Force => bootstrapper.force_rebootstrap(ctx.cancel.clone()).await,
        };

        drop(bootstrapper);
        drop(center);
        if let Some(printer) = printer {
            if tokio::time::timeout(PRINTER_DRAIN, printer).await.is_err() {
                tracing::debug!("status printer did not finish");
            }
        }

        write_result(&result, self.args.json, out)?;
        Ok(if result.is_ready() {
            CommandResult::success()
        } else {
            CommandResult::failure(1)
        })
    }
}

fn write_result(result: &BootstrapResult, json: bool, out: Output<'_>) -> Result<()> {
    if json {
        let text =
            serde_json::to_string_pretty(result).map_err(|e| BootstrapError::Other(e.into()))?;
        writeln!(out, "{}", text)?;
    } else if result.is_ready() {
        writeln!(
            out,
            "Ready: {} ({})",
            result.interpreter().display(),
            result.message()
        )?;
    } else {
        writeln!(out, "Not ready: {}", result.message())?;
        writeln!(out, "Interpreter: {}", result.interpreter().display())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_overrides, SettingsStack};
    use crate::process::MockRunner;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn context(temp: &TempDir, extra: &[&str]) -> CommandContext {
        let mut pairs = vec![format!("runtime-root={}", temp.path().display())];
        pairs.extend(extra.iter().map(|s| s.to_string()));
        CommandContext::new(
            SettingsStack::single(parse_overrides(&pairs).unwrap()),
            Arc::new(MockRunner::new()),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn not_ready_exits_one() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, &["auto-bootstrap=false"]);
        let cmd = EnsureCommand::new(
            EnsureArgs {
                json: false,
                quiet: true,
            },
            EnsureMode::Memoized,
        );

        let mut out = Vec::new();
        let result = cmd.execute(&ctx, &mut out).await.unwrap();
        assert_eq!(result, CommandResult::failure(1));
        assert!(String::from_utf8(out)
            .unwrap()
            .contains("Not ready: auto-bootstrap-disabled"));
    }

    #[tokio::test]
    async fn json_output() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, &["auto-bootstrap=false"]);
        let cmd = EnsureCommand::new(
            EnsureArgs {
                json: true,
                quiet: false,
            },
            EnsureMode::Force,
        );

        let mut out = Vec::new();
        cmd.execute(&ctx, &mut out).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["ready"], false);
        assert_eq!(value["message"], "auto-bootstrap-disabled");
    }
}
