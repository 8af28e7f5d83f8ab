//! Isolated environment creation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::layout::venv_python;
use crate::process::{Exec, ProcessRequest, ProcessResult};

/// Outcome of [`ensure_venv`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VenvOutcome {
    /// The environment interpreter already existed.
    Existing(PathBuf),
    /// The environment was created by this call.
    Created(PathBuf),
    /// Creation failed; carries the creation result.
    Failed(ProcessResult),
}

/// Create `venv_dir` with `base_python` unless its interpreter already exists.
pub async fn ensure_venv(
    exec: &Exec<'_>,
    base_python: &Path,
    venv_dir: &Path,
    timeout: Duration,
) -> Result<VenvOutcome> {
    let python = venv_python(venv_dir);
    if python.is_file() {
        return Ok(VenvOutcome::Existing(python));
    }

    tracing::info!(path = %venv_dir.display(), "creating virtual environment");
    let request = ProcessRequest::new(base_python.to_string_lossy(), timeout)
        .args(["-m", "venv"])
        .arg(venv_dir.to_string_lossy());
    let result = exec.run(request).await?;

    if result.is_success() && python.is_file() {
        Ok(VenvOutcome::Created(python))
    } else {
        Ok(VenvOutcome::Failed(result))
    }
}
