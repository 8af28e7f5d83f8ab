//! Compatible-interpreter provisioning through conda.
//!
//! When the resolved interpreter is too new (or too old), a conda
//! environment pinned to a known-good version is created under the runtime
//! root and reused on later runs.

use std::path::{Path, PathBuf};

use crate::config::BootstrapConfig;
use crate::error::Result;
use crate::layout::{conda_python, RuntimeLayout};
use crate::process::{Exec, ProcessRequest};

/// Well-known conda install locations for this platform.
pub fn well_known_conda_paths() -> Vec<PathBuf> {
    if cfg!(windows) {
        [
            r"D:\tools\miniconda3\Scripts\conda.exe",
            r"C:\ProgramData\miniconda3\Scripts\conda.exe",
            r"C:\ProgramData\Anaconda3\Scripts\conda.exe",
        ]
        .iter()
        .map(PathBuf::from)
        .collect()
    } else {
        let mut paths = Vec::new();
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join("miniconda3").join("bin").join("conda"));
            paths.push(home.join("anaconda3").join("bin").join("conda"));
            paths.push(home.join("miniforge3").join("bin").join("conda"));
        }
        paths.push(PathBuf::from("/opt/conda/bin/conda"));
        paths
    }
}

/// Locate conda: the configured path if it exists, else a well-known one.
pub fn locate_conda(configured: Option<&Path>, well_known: &[PathBuf]) -> Option<PathBuf> {
    if let Some(path) = configured.filter(|p| p.is_file()) {
        return Some(path.to_path_buf());
    }
    well_known.iter().find(|p| p.is_file()).cloned()
}

/// Provision (or reuse) a compatible interpreter.
///
/// Returns `None` when provisioning is disabled, conda cannot be found, or
/// environment creation fails. Failures are logged, never raised.
pub async fn provision(
    exec: &Exec<'_>,
    layout: &RuntimeLayout,
    config: &BootstrapConfig,
) -> Result<Option<PathBuf>> {
    if !config.auto_provision_conda {
        return Ok(None);
    }

    let Some(conda) = locate_conda(config.conda_exe.as_deref(), &well_known_conda_paths()) else {
        tracing::info!("conda not found, skipping compatible interpreter provisioning");
        return Ok(None);
    };

    let env_dir = layout.conda_env_dir(&config.conda_python_version);
    let env_python = conda_python(&env_dir);
    if env_python.is_file() {
        tracing::debug!(path = %env_python.display(), "reusing provisioned interpreter");
        return Ok(Some(env_python));
    }

    tracing::info!(
        env = %env_dir.display(),
        python = %config.conda_python_version,
        "creating conda environment"
    );
    let request = ProcessRequest::new(conda.to_string_lossy(), config.install_timeout())
        .args(["create", "-y", "-p"])
        .arg(env_dir.to_string_lossy())
        .arg(format!("python={}", config.conda_python_version));
    let result = exec.run(request).await?;

    if !result.is_success() || !env_python.is_file() {
        tracing::warn!(summary = %result.summary(), "conda environment creation failed");
        return Ok(None);
    }
    Ok(Some(env_python))
}
