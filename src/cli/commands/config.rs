//! Config command implementation.
//!
//! The `voxenv config` command shows resolved settings and where each
//! value came from.

use async_trait::async_trait;

use crate::cli::args::ConfigArgs;
use crate::config::keys;
use crate::error::{BootstrapError, Result};

use super::dispatcher::{Command, CommandContext, CommandResult, Output};

/// The config command implementation.
pub struct ConfigCommand {
    args: ConfigArgs,
}

impl ConfigCommand {
    pub fn new(args: ConfigArgs) -> Self {
        Self { args }
    }
}

#[async_trait]
impl Command for ConfigCommand {
    async fn execute(&self, ctx: &CommandContext, out: Output<'_>) -> Result<CommandResult> {
        if self.args.json {
            let json = serde_json::to_string_pretty(&ctx.config)
                .map_err(|e| BootstrapError::Other(e.into()))?;
            writeln!(out, "{}", json)?;
            return Ok(CommandResult::success());
        }

        let yaml =
            serde_yaml::to_string(&ctx.config).map_err(|e| BootstrapError::Other(e.into()))?;
        write!(out, "{}", yaml)?;

        let overridden: Vec<_> = keys::ALL
            .iter()
            .filter_map(|key| ctx.settings.lookup(key).map(|setting| (key, setting.source)))
            .collect();
        if !overridden.is_empty() {
            writeln!(out)?;
            for (key, source) in overridden {
                writeln!(out, "# {} from {}", key, source)?;
            }
        }
        Ok(CommandResult::success())
    }
}
