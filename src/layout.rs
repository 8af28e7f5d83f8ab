//! On-disk layout of the runtime root.
//!
//! ```text
//! <runtime-root>/
//!   venv/                  isolated environment
//!   install.ok             installation signature marker
//!   health.json            last verified-good record (key=value lines)
//!   install.fail           last failure record (key=value lines)
//!   prebuilt/              extracted bundle
//!     .bundle.marker       bundle signature
//!   conda-py311/           provisioned compatible interpreter
//! ```

use std::path::{Path, PathBuf};

/// Paths under one runtime root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeLayout {
    root: PathBuf,
}

impl RuntimeLayout {
    /// Create a layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn venv_dir(&self) -> PathBuf {
        self.root.join("venv")
    }

    /// Interpreter inside the isolated environment.
    pub fn venv_python(&self) -> PathBuf {
        venv_python(&self.venv_dir())
    }

    pub fn install_marker(&self) -> PathBuf {
        self.root.join("install.ok")
    }

    pub fn health_file(&self) -> PathBuf {
        self.root.join("health.json")
    }

    pub fn failure_file(&self) -> PathBuf {
        self.root.join("install.fail")
    }

    pub fn prebuilt_dir(&self) -> PathBuf {
        self.root.join("prebuilt")
    }

    pub fn bundle_marker(&self) -> PathBuf {
        self.prebuilt_dir().join(".bundle.marker")
    }

    /// Directory of a provisioned environment, e.g. `conda-py311` for "3.11".
    pub fn conda_env_dir(&self, python_version: &str) -> PathBuf {
        let digits: String = python_version.chars().filter(char::is_ascii_digit).collect();
        self.root.join(format!("conda-py{}", digits))
    }
}

/// Interpreter path inside a virtual environment directory.
pub fn venv_python(venv: &Path) -> PathBuf {
    if cfg!(windows) {
        venv.join("Scripts").join("python.exe")
    } else {
        venv.join("bin").join("python")
    }
}

/// Interpreter path inside a conda environment prefix.
pub fn conda_python(prefix: &Path) -> PathBuf {
    if cfg!(windows) {
        prefix.join("python.exe")
    } else {
        prefix.join("bin").join("python")
    }
}

/// Interpreter file name for this platform.
pub fn python_file_name() -> &'static str {
    if cfg!(windows) {
        "python.exe"
    } else {
        "python"
    }
}

/// Whether two interpreter paths refer to the same location.
///
/// Comparison is case-insensitive on Windows.
pub fn same_path(a: &Path, b: &Path) -> bool {
    if cfg!(windows) {
        a.to_string_lossy().eq_ignore_ascii_case(&b.to_string_lossy())
    } else {
        a == b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_live_under_root() {
        let layout = RuntimeLayout::new("/rt");
        assert_eq!(layout.install_marker(), PathBuf::from("/rt/install.ok"));
        assert_eq!(layout.health_file(), PathBuf::from("/rt/health.json"));
        assert_eq!(layout.failure_file(), PathBuf::from("/rt/install.fail"));
        assert_eq!(
            layout.bundle_marker(),
            PathBuf::from("/rt/prebuilt/.bundle.marker")
        );
    }

    #[test]
    fn conda_dir_keeps_only_digits() {
        let layout = RuntimeLayout::new("/rt");
        assert_eq!(layout.conda_env_dir("3.11"), PathBuf::from("/rt/conda-py311"));
        assert_eq!(layout.conda_env_dir(" 3.10.4 "), PathBuf::from("/rt/conda-py3104"));
    }

    #[cfg(unix)]
    #[test]
    fn unix_interpreter_paths() {
        let layout = RuntimeLayout::new("/rt");
        assert_eq!(layout.venv_python(), PathBuf::from("/rt/venv/bin/python"));
        assert_eq!(
            conda_python(Path::new("/rt/conda-py311")),
            PathBuf::from("/rt/conda-py311/bin/python")
        );
        assert!(!same_path(Path::new("/A/python"), Path::new("/a/python")));
    }
}
