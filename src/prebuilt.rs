//! Prebuilt runtime bundle loader.
//!
//! A bundle is a zip of an already-installed interpreter environment. It
//! is extracted into `<runtime-root>/prebuilt/` and re-extracted only when
//! the bundle file's signature (path, size, modification time) changes.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::cache::kv::{format_timestamp, write_atomic};
use crate::error::Result;
use crate::layout::{python_file_name, RuntimeLayout};

/// Why a prebuilt runtime could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrebuiltError {
    #[error("bundle-not-found")]
    BundleNotFound,

    #[error("prebuilt-python-not-found")]
    PythonNotFound,

    /// Extraction or marker I/O failed; the detail is only logged.
    #[error("prebuilt-prepare-failed")]
    PrepareFailed(String),
}

/// Identity of a bundle file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSignature {
    pub source: PathBuf,
    pub length: u64,
    pub modified: DateTime<Utc>,
}

impl BundleSignature {
    /// Read the signature of an existing bundle.
    pub fn of(path: &Path) -> Result<Self> {
        let meta = fs::metadata(path)?;
        Ok(Self {
            source: path.to_path_buf(),
            length: meta.len(),
            modified: DateTime::<Utc>::from(meta.modified()?),
        })
    }
}

impl fmt::Display for BundleSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}",
            self.source.display(),
            self.length,
            format_timestamp(self.modified)
        )
    }
}

/// A usable prebuilt runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrebuiltRuntime {
    pub interpreter: PathBuf,
    pub bundle: PathBuf,
    /// Whether this call extracted the bundle.
    pub extracted: bool,
}

/// Locates, extracts and inspects the prebuilt bundle.
#[derive(Debug, Clone)]
pub struct PrebuiltLoader {
    layout: RuntimeLayout,
    bundle_setting: String,
    search_roots: Vec<PathBuf>,
}

impl PrebuiltLoader {
    /// Create a loader searching the default base directories.
    pub fn new(layout: RuntimeLayout, bundle_setting: impl Into<String>) -> Self {
        Self {
            layout,
            bundle_setting: bundle_setting.into(),
            search_roots: default_search_roots(),
        }
    }

    /// Replace the base directories a relative bundle path is resolved
    /// against. The runtime root is always searched last.
    pub fn with_search_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.search_roots = roots;
        self
    }

    /// Candidate bundle paths, de-duplicated, in search order.
    pub fn bundle_candidates(&self) -> Vec<PathBuf> {
        let setting = self.bundle_setting.trim();
        if setting.is_empty() {
            return Vec::new();
        }
        let configured = Path::new(setting);
        if configured.is_absolute() {
            return vec![configured.to_path_buf()];
        }

        let mut list: Vec<PathBuf> = Vec::new();
        let roots = self
            .search_roots
            .iter()
            .map(PathBuf::as_path)
            .chain(std::iter::once(self.layout.root()));
        for root in roots {
            let candidate = root.join(configured);
            if !list.contains(&candidate) {
                list.push(candidate);
            }
        }
        list
    }

    /// The first existing bundle candidate.
    pub fn locate_bundle(&self) -> Option<PathBuf> {
        self.bundle_candidates().into_iter().find(|p| p.is_file())
    }

    /// Make the prebuilt runtime usable, extracting when stale.
    pub fn prepare(&self) -> std::result::Result<PrebuiltRuntime, PrebuiltError> {
        let bundle = self.locate_bundle().ok_or(PrebuiltError::BundleNotFound)?;
        let extracted = self.sync_extraction(&bundle).map_err(|e| {
            tracing::error!(bundle = %bundle.display(), error = %e, "prebuilt runtime prepare failed");
            PrebuiltError::PrepareFailed(e.to_string())
        })?;

        let interpreter =
            find_interpreter(&self.layout.prebuilt_dir()).ok_or(PrebuiltError::PythonNotFound)?;
        Ok(PrebuiltRuntime {
            interpreter,
            bundle,
            extracted,
        })
    }

    /// Extract `bundle` unless the stored marker matches. Returns whether
    /// extraction happened.
    fn sync_extraction(&self, bundle: &Path) -> Result<bool> {
        let target = self.layout.prebuilt_dir();
        let marker = self.layout.bundle_marker();
        let current = BundleSignature::of(bundle)?.to_string();
        let stored = fs::read_to_string(&marker)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        if target.is_dir() && stored == current {
            return Ok(false);
        }

        if target.exists() {
            if let Err(e) = fs::remove_dir_all(&target) {
                tracing::warn!(path = %target.display(), error = %e, "failed to remove stale extraction");
            }
        }
        fs::create_dir_all(&target)?;

        let file = fs::File::open(bundle)?;
        let mut archive = zip::ZipArchive::new(file)?;
        archive.extract(&target)?;
        write_atomic(&marker, &current)?;

        tracing::info!(
            bundle = %bundle.display(),
            target = %target.display(),
            entries = archive.len(),
            "prebuilt runtime extracted"
        );
        Ok(true)
    }
}

/// Executable directory, its three nearest ancestors, and the working
/// directory.
pub fn default_search_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        roots.extend(dir.ancestors().take(4).map(Path::to_path_buf));
    }
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    roots
}

/// Conventional interpreter locations inside an extracted bundle.
fn conventional_interpreters(root: &Path) -> Vec<PathBuf> {
    if cfg!(windows) {
        vec![
            root.join("python.exe"),
            root.join("Scripts").join("python.exe"),
            root.join("venv").join("Scripts").join("python.exe"),
        ]
    } else {
        vec![
            root.join("python"),
            root.join("bin").join("python"),
            root.join("venv").join("bin").join("python"),
        ]
    }
}

/// Find an interpreter in an extracted bundle, trying conventional paths
/// before a recursive search.
pub fn find_interpreter(root: &Path) -> Option<PathBuf> {
    conventional_interpreters(root)
        .into_iter()
        .find(|p| p.is_file())
        .or_else(|| search_file(root, python_file_name()))
}

fn search_file(dir: &Path, name: &str) -> Option<PathBuf> {
    let mut entries: Vec<_> = fs::read_dir(dir).ok()?.flatten().collect();
    entries.sort_by_key(|e| e.file_name());
    let mut subdirs = Vec::new();
    for entry in entries {
        let path = entry.path();
        match entry.file_type() {
            Ok(t) if t.is_dir() => subdirs.push(path),
            Ok(t) if t.is_file() && entry.file_name() == name => return Some(path),
            _ => {}
        }
    }
    subdirs.into_iter().find_map(|d| search_file(&d, name))
}
