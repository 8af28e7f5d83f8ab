//! Installation signature marker.

use std::fs;
use std::path::{Path, PathBuf};

use super::kv::{remove_if_exists, write_atomic};
use crate::error::Result;

/// Plain-text marker holding the signature of the last successful install.
#[derive(Debug, Clone)]
pub struct InstallMarker {
    path: PathBuf,
}

impl InstallMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored signature, trimmed. Missing or unreadable reads as `None`.
    pub fn read(&self) -> Option<String> {
        fs::read_to_string(&self.path)
            .ok()
            .map(|s| s.trim().to_string())
    }

    /// Whether the stored signature equals `signature` exactly.
    pub fn matches(&self, signature: &str) -> bool {
        self.read().as_deref() == Some(signature)
    }

    pub fn write(&self, signature: &str) -> Result<()> {
        write_atomic(&self.path, signature)
    }

    pub fn clear(&self) -> Result<bool> {
        remove_if_exists(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_then_match() {
        let temp = TempDir::new().unwrap();
        let marker = InstallMarker::new(temp.path().join("install.ok"));
        assert!(!marker.matches("packages=funasr"));

        marker.write("packages=funasr").unwrap();
        assert!(marker.matches("packages=funasr"));
        assert!(!marker.matches("packages=funasr torch"));
        assert_eq!(
            fs::read_to_string(marker.path()).unwrap(),
            "packages=funasr"
        );
    }

    #[test]
    fn trailing_whitespace_is_ignored() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("install.ok");
        fs::write(&path, "packages=funasr\r\n").unwrap();
        assert!(InstallMarker::new(&path).matches("packages=funasr"));
    }
}
