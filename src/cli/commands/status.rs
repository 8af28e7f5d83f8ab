//! Status command implementation.
//!
//! The `voxenv status` command shows persisted runtime state without
//! running anything.

use async_trait::async_trait;

use crate::bootstrap::RuntimeReport;
use crate::cli::args::StatusArgs;
use crate::error::{BootstrapError, Result};

use super::dispatcher::{Command, CommandContext, CommandResult, Output};

/// The status command implementation.
pub struct StatusCommand {
    args: StatusArgs,
}

impl StatusCommand {
    pub fn new(args: StatusArgs) -> Self {
        Self { args }
    }
}

#[async_trait]
impl Command for StatusCommand {
    async fn execute(&self, ctx: &CommandContext, out: Output<'_>) -> Result<CommandResult> {
        let report = RuntimeReport::collect(&ctx.config);

        if self.args.json {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| BootstrapError::Other(e.into()))?;
            writeln!(out, "{}", json)?;
        } else {
            for line in report.lines() {
                writeln!(out, "{}", line)?;
            }
        }

        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_overrides, SettingsStack};
    use crate::process::MockRunner;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn json_status_has_signature() {
        let temp = TempDir::new().unwrap();
        let ctx = CommandContext::new(
            SettingsStack::single(
                parse_overrides(&[
                    format!("runtime-root={}", temp.path().display()),
                    "packages=funasr torch".to_string(),
                ])
                .unwrap(),
            ),
            Arc::new(MockRunner::new()),
            CancellationToken::new(),
        );

        let mut out = Vec::new();
        StatusCommand::new(StatusArgs { json: true })
            .execute(&ctx, &mut out)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["expected_signature"], "packages=funasr torch");
        assert_eq!(value["venv_exists"], false);
    }
}
