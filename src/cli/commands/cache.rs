//! Clear-cache command implementation.
//!
//! Provides `voxenv clear-cache`, which forgets the install marker, health
//! cache and failure cache so the next run re-validates from scratch. The
//! environment itself is left in place.

use async_trait::async_trait;

use crate::cache::StateFiles;
use crate::error::Result;
use crate::layout::RuntimeLayout;

use super::dispatcher::{Command, CommandContext, CommandResult, Output};

/// The clear-cache command implementation.
pub struct ClearCacheCommand;

#[async_trait]
impl Command for ClearCacheCommand {
    async fn execute(&self, ctx: &CommandContext, out: Output<'_>) -> Result<CommandResult> {
        let layout = RuntimeLayout::new(&ctx.config.runtime_root);
        let removed = StateFiles::new(&layout).clear_all()?;
        tracing::info!(removed, root = %layout.root().display(), "state files cleared");

        if removed == 0 {
            writeln!(out, "No state files to remove")?;
        } else {
            writeln!(out, "Removed {} state file(s)", removed)?;
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
    async fn removes_marker_and_caches() {
        let temp = TempDir::new().unwrap();
        let ctx = CommandContext::new(
            SettingsStack::single(
                parse_overrides(&[format!("runtime-root={}", temp.path().display())]).unwrap(),
            ),
            Arc::new(MockRunner::new()),
            CancellationToken::new(),
        );
        let layout = RuntimeLayout::new(temp.path());
        let files = StateFiles::new(&layout);
        files.marker.write("packages=funasr").unwrap();
        files.failure.record("packages=funasr", &layout.venv_python(), "boom");

        let mut out = Vec::new();
        ClearCacheCommand.execute(&ctx, &mut out).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Removed 2 state file(s)\n");
        assert!(files.marker.read().is_none());
        assert!(files.failure.load().is_none());

        let mut again = Vec::new();
        ClearCacheCommand.execute(&ctx, &mut again).await.unwrap();
        assert_eq!(String::from_utf8(again).unwrap(), "No state files to remove\n");
    }
}
