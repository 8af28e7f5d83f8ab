//! Bootstrap results and failure reasons.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::prebuilt::PrebuiltError;

/// Final outcome of one bootstrap run.
///
/// Constructed only through [`BootstrapResult::ready`] and
/// [`BootstrapResult::not_ready`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapResult {
    ready: bool,
    interpreter: PathBuf,
    message: String,
}

impl BootstrapResult {
    /// A usable runtime at `interpreter`.
    pub fn ready(interpreter: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            ready: true,
            interpreter: interpreter.into(),
            message: message.into(),
        }
    }

    /// No usable runtime. `interpreter` is the best fallback known.
    pub fn not_ready(interpreter: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self {
            ready: false,
            interpreter: interpreter.into(),
            message: reason.to_string(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    /// `"ok"`, `"prebuilt:<bundle>"`, or a [`FailureReason`] rendering.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Why a bootstrap run ended without a usable runtime.
///
/// `Display` renders a stable, machine-readable prefix followed by detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    AutoBootstrapDisabled,
    PrebuiltNotReady(PrebuiltError),
    PythonNotFound,
    PythonVersionUnsupported(String),
    VenvCreateFailed(String),
    InstallCooldown { remaining_secs: i64, detail: String },
    PipInstallFailed(String),
    PipRepairFailed(String),
    DependencyHealthCheckFailed,
    Cancelled,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::AutoBootstrapDisabled => f.write_str("auto-bootstrap-disabled"),
            FailureReason::PrebuiltNotReady(inner) => {
                write!(f, "prebuilt-runtime-not-ready:{}", inner)
            }
            FailureReason::PythonNotFound => f.write_str("python-not-found"),
            FailureReason::PythonVersionUnsupported(version) => {
                write!(f, "python-version-unsupported:{}", version)
            }
            FailureReason::VenvCreateFailed(stderr) => write!(f, "venv-create-failed: {}", stderr),
            FailureReason::InstallCooldown {
                remaining_secs,
                detail,
            } => write!(
                f,
                "install-cooldown:retry-after-sec={};detail={}",
                remaining_secs, detail
            ),
            FailureReason::PipInstallFailed(summary) => {
                write!(f, "pip-install-failed: {}", summary)
            }
            FailureReason::PipRepairFailed(summary) => write!(f, "pip-repair-failed: {}", summary),
            FailureReason::DependencyHealthCheckFailed => {
                f.write_str("dependency-health-check-failed")
            }
            FailureReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factories() {
        let ok = BootstrapResult::ready("/rt/venv/bin/python", "ok");
        assert!(ok.is_ready());
        assert_eq!(ok.message(), "ok");

        let no = BootstrapResult::not_ready("python", FailureReason::PythonNotFound);
        assert!(!no.is_ready());
        assert_eq!(no.interpreter(), Path::new("python"));
        assert_eq!(no.message(), "python-not-found");
    }

    #[test]
    fn reason_prefixes_are_stable() {
        assert_eq!(
            FailureReason::PrebuiltNotReady(PrebuiltError::BundleNotFound).to_string(),
            "prebuilt-runtime-not-ready:bundle-not-found"
        );
        assert_eq!(
            FailureReason::PythonVersionUnsupported("3.13".into()).to_string(),
            "python-version-unsupported:3.13"
        );
        assert_eq!(
            FailureReason::InstallCooldown {
                remaining_secs: 42,
                detail: "pip-install-failed".into()
            }
            .to_string(),
            "install-cooldown:retry-after-sec=42;detail=pip-install-failed"
        );
        assert_eq!(
            FailureReason::PipInstallFailed("code=1".into()).to_string(),
            "pip-install-failed: code=1"
        );
        assert_eq!(
            FailureReason::VenvCreateFailed("boom".into()).to_string(),
            "venv-create-failed: boom"
        );
    }
}
