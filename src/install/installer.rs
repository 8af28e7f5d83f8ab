//! Multi-strategy dependency installer.
//!
//! Strategy ladder, each step only reached when the previous one failed:
//!
//! 1. No-deps first (when enabled): base dependencies, then the primary
//!    package with `--no-deps`, then an import probe
//! 2. Standard install of the full package set
//! 3. On a native build failure: pinned binary-only versions of the
//!    failing package, then the standard install once more
//! 4. On a native build failure: no-deps as a last resort, unless step 1
//!    already ran
//!
//! Process failures are data here. Only cancellation propagates as an error.

use std::fmt;

use crate::config::BootstrapConfig;
use crate::error::Result;
use crate::process::{Exec, ProcessResult};

use super::classify::{is_native_build_failure, package_names, PINNED_COMPATIBLE};
use super::pip::Pip;

/// The strategy that produced a working install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    NoDepsFirst,
    Standard,
    PinnedRetry,
    NoDepsLastResort,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::NoDepsFirst => "no-deps-first",
            Strategy::Standard => "standard",
            Strategy::PinnedRetry => "pinned-retry",
            Strategy::NoDepsLastResort => "no-deps-last-resort",
        };
        f.write_str(name)
    }
}

/// Result of [`Installer::install`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed(Strategy),
    /// Every applicable strategy failed; carries the last failure summary.
    Failed(String),
}

/// Installs and verifies the runtime's packages in one environment.
pub struct Installer<'a> {
    exec: Exec<'a>,
    pip: Pip,
    config: &'a BootstrapConfig,
}

impl<'a> Installer<'a> {
    pub fn new(exec: Exec<'a>, pip: Pip, config: &'a BootstrapConfig) -> Self {
        Self { exec, pip, config }
    }

    /// Run the full strategy ladder.
    pub async fn install(&self) -> Result<InstallOutcome> {
        tracing::info!(packages = %self.config.packages, "installing packages");
        self.upgrade_tooling().await?;

        let mut no_deps_tried = false;
        if self.config.use_no_deps_strategy {
            no_deps_tried = true;
            if self.install_no_deps().await? {
                return Ok(InstallOutcome::Installed(Strategy::NoDepsFirst));
            }
        }

        let mut last = self.install_standard().await?;
        if last.is_success() {
            return Ok(InstallOutcome::Installed(Strategy::Standard));
        }

        if is_native_build_failure(&last) {
            tracing::info!("native wheel build failure detected, trying pinned compatible wheels");
            if self.install_pinned().await? {
                let retry = self.install_standard().await?;
                if retry.is_success() {
                    return Ok(InstallOutcome::Installed(Strategy::PinnedRetry));
                }
                last = retry;
            }

            if !no_deps_tried {
                tracing::info!("trying no-deps install as last resort");
                if self.install_no_deps().await? {
                    return Ok(InstallOutcome::Installed(Strategy::NoDepsLastResort));
                }
            }
        }

        Ok(InstallOutcome::Failed(last.summary()))
    }

    /// Upgrade installer tooling. Failure is logged and ignored.
    pub async fn upgrade_tooling(&self) -> Result<()> {
        let result = self
            .exec
            .run(self.pip.upgrade_tooling(self.config.install_timeout()))
            .await?;
        if !result.is_success() {
            tracing::info!(summary = %result.summary(), "pip upgrade failed, continuing");
        }
        Ok(())
    }

    /// Standard install of the full package set.
    pub async fn install_standard(&self) -> Result<ProcessResult> {
        self.exec
            .run(
                self.pip
                    .install_spec(&self.config.packages, self.config.install_timeout()),
            )
            .await
    }

    /// Base dependencies, then the primary package without dependencies,
    /// then an import probe.
    pub async fn install_no_deps(&self) -> Result<bool> {
        let timeout = self.config.install_timeout();
        tracing::info!(base = %self.config.base_dependencies, "no-deps strategy start");

        let deps = self
            .exec
            .run(self.pip.install_spec(&self.config.base_dependencies, timeout))
            .await?;
        if !deps.is_success() {
            tracing::info!(summary = %deps.summary(), "no-deps strategy: base dependency install failed");
            return Ok(false);
        }

        let primary = self
            .exec
            .run(self.pip.install_no_deps(&self.config.primary_package, timeout))
            .await?;
        if !primary.is_success() {
            tracing::info!(summary = %primary.summary(), "no-deps strategy: primary package install failed");
            return Ok(false);
        }

        let probe = self
            .exec
            .run(
                self.pip
                    .import_probe(&self.config.probe_modules, self.config.import_probe_timeout()),
            )
            .await?;
        if !probe.is_success() {
            tracing::info!(summary = %probe.summary(), "no-deps strategy: import probe failed");
            return Ok(false);
        }

        let ok = probe.stdout.to_lowercase().contains("ok");
        if ok {
            tracing::info!("no-deps strategy completed");
        }
        Ok(ok)
    }

    /// Try each pinned compatible version until one installs.
    pub async fn install_pinned(&self) -> Result<bool> {
        for pin in PINNED_COMPATIBLE {
            let result = self
                .exec
                .run(self.pip.install_binary_only(pin, self.config.install_timeout()))
                .await?;
            if result.is_success() {
                tracing::info!(pin, "installed pinned compatible wheel");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Upgrade the package set in place. Returns the failure summary.
    pub async fn repair(&self) -> Result<std::result::Result<(), String>> {
        tracing::info!(packages = %self.config.packages, "repairing packages");
        let result = self
            .exec
            .run(self.pip.repair(&self.config.packages, self.config.install_timeout()))
            .await?;
        if result.is_success() {
            Ok(Ok(()))
        } else {
            Ok(Err(result.summary()))
        }
    }

    /// Lightweight dependency probe using `pip show`.
    ///
    /// Passes when pip exits 0 and lists every probe module.
    pub async fn verify(&self) -> Result<bool> {
        if !self.pip.python().is_file() {
            return Ok(false);
        }
        let names = package_names(&self.config.packages);
        let result = self
            .exec
            .run(self.pip.show(&names, self.config.health_probe_timeout()))
            .await?;
        if !result.is_success() {
            tracing::info!(summary = %result.summary(), "dependency probe failed");
            return Ok(false);
        }

        let output = result.stdout.to_lowercase();
        Ok(self
            .config
            .probe_modules
            .split_whitespace()
            .all(|m| output.contains(&format!("name: {}", m.to_lowercase()))))
    }
}
