//! Pip command construction.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::process::ProcessRequest;

/// Flags shared by every install.
const INSTALL_FLAGS: &[&str] = &["--disable-pip-version-check", "--no-input"];

/// Builds pip invocations for one interpreter.
#[derive(Debug, Clone)]
pub struct Pip {
    python: PathBuf,
}

impl Pip {
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
        }
    }

    pub fn python(&self) -> &Path {
        &self.python
    }

    fn module(&self, timeout: Duration) -> ProcessRequest {
        ProcessRequest::new(self.python.to_string_lossy(), timeout).args(["-m", "pip"])
    }

    fn install(&self, timeout: Duration, extra: &[&str], spec: &str) -> ProcessRequest {
        self.module(timeout)
            .arg("install")
            .args(INSTALL_FLAGS.iter().copied())
            .args(extra.iter().copied())
            .args(spec.split_whitespace())
            .with_progress()
    }

    /// Upgrade pip, setuptools and wheel.
    pub fn upgrade_tooling(&self, timeout: Duration) -> ProcessRequest {
        self.install(timeout, &["--upgrade"], "pip setuptools wheel")
    }

    /// Standard install preferring binary wheels.
    pub fn install_spec(&self, spec: &str, timeout: Duration) -> ProcessRequest {
        self.install(timeout, &["--prefer-binary"], spec)
    }

    /// Install without resolving dependencies.
    pub fn install_no_deps(&self, spec: &str, timeout: Duration) -> ProcessRequest {
        self.install(timeout, &["--prefer-binary", "--no-deps"], spec)
    }

    /// Install from binary wheels only.
    pub fn install_binary_only(&self, spec: &str, timeout: Duration) -> ProcessRequest {
        self.install(timeout, &["--prefer-binary", "--only-binary=:all:"], spec)
    }

    /// Upgrade in place to repair a broken install.
    pub fn repair(&self, spec: &str, timeout: Duration) -> ProcessRequest {
        self.install(timeout, &["--prefer-binary", "--upgrade"], spec)
    }

    /// `pip show` for the given distribution names.
    pub fn show(&self, names: &[String], timeout: Duration) -> ProcessRequest {
        self.module(timeout)
            .arg("show")
            .args(names.iter().cloned())
    }

    /// `python -c "import a,b,c;print('ok')"`.
    pub fn import_probe(&self, modules: &str, timeout: Duration) -> ProcessRequest {
        let modules: Vec<&str> = modules.split_whitespace().collect();
        ProcessRequest::new(self.python.to_string_lossy(), timeout)
            .arg("-c")
            .arg(format!("import {};print('ok')", modules.join(",")))
    }
}
