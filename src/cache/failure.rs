//! "Last failed" record with a retry cooldown.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::kv::{format_timestamp, parse_timestamp, remove_if_exists, KvRecord};
use crate::layout::same_path;

/// A persisted install failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub signature: String,
    pub interpreter: PathBuf,
    pub failed_at: DateTime<Utc>,
    pub detail: String,
}

/// An active cooldown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cooldown {
    /// Whole seconds until a retry is allowed, at least 1.
    pub remaining_secs: i64,
    /// Failure detail stored with the record.
    pub detail: String,
}

impl FailureRecord {
    pub fn new(
        signature: impl Into<String>,
        interpreter: impl Into<PathBuf>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            signature: signature.into(),
            interpreter: interpreter.into(),
            failed_at: Utc::now(),
            detail: detail.into().replace(['\r', '\n'], " "),
        }
    }

    /// The cooldown still in effect for `signature` and `interpreter` at `now`.
    pub fn cooldown_at(
        &self,
        signature: &str,
        interpreter: &Path,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Option<Cooldown> {
        if self.signature != signature || !same_path(&self.interpreter, interpreter) {
            return None;
        }
        let age = now.signed_duration_since(self.failed_at);
        if age >= window {
            return None;
        }
        let remaining_ms = (window - age).num_milliseconds();
        Some(Cooldown {
            remaining_secs: ((remaining_ms + 999) / 1000).max(1),
            detail: self.detail.clone(),
        })
    }

    fn to_kv(&self) -> KvRecord {
        KvRecord::new()
            .with("signature", self.signature.clone())
            .with("interpreter", self.interpreter.display().to_string())
            .with("failed_at", format_timestamp(self.failed_at))
            .with("detail", self.detail.clone())
    }

    fn from_kv(kv: &KvRecord) -> Option<Self> {
        Some(Self {
            signature: kv.get("signature")?.to_string(),
            interpreter: PathBuf::from(kv.get("interpreter")?),
            failed_at: parse_timestamp(kv.get("failed_at")?)?,
            detail: kv.get("detail").unwrap_or_default().to_string(),
        })
    }
}

/// Failure cache file.
#[derive(Debug, Clone)]
pub struct FailureCache {
    path: PathBuf,
}

impl FailureCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Option<FailureRecord> {
        FailureRecord::from_kv(&KvRecord::load(&self.path)?)
    }

    /// The active cooldown for this signature and interpreter, if any.
    pub fn active_cooldown(
        &self,
        signature: &str,
        interpreter: &Path,
        window: Duration,
    ) -> Option<Cooldown> {
        self.load()?
            .cooldown_at(signature, interpreter, window, Utc::now())
    }

    /// Record a failure. Write errors are logged and ignored.
    pub fn record(&self, signature: &str, interpreter: &Path, detail: &str) {
        let record = FailureRecord::new(signature, interpreter, detail);
        if let Err(e) = record.to_kv().save(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to write failure cache");
        }
    }

    /// Remove the record. Errors are logged and ignored.
    pub fn clear(&self) {
        if let Err(e) = remove_if_exists(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to clear failure cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SIG: &str = "packages=funasr";

    #[test]
    fn cooldown_rounds_up_remaining_seconds() {
        let now = Utc::now();
        let record = FailureRecord {
            failed_at: now - Duration::minutes(10) - Duration::milliseconds(500),
            ..FailureRecord::new(SIG, "/py", "boom")
        };
        let cooldown = record
            .cooldown_at(SIG, Path::new("/py"), Duration::minutes(30), now)
            .unwrap();
        assert_eq!(cooldown.remaining_secs, 20 * 60);
        assert_eq!(cooldown.detail, "boom");
    }

    #[test]
    fn cooldown_expires() {
        let now = Utc::now();
        let record = FailureRecord {
            failed_at: now - Duration::minutes(31),
            ..FailureRecord::new(SIG, "/py", "boom")
        };
        assert!(record
            .cooldown_at(SIG, Path::new("/py"), Duration::minutes(30), now)
            .is_none());
    }

    #[test]
    fn cooldown_requires_matching_keys() {
        let now = Utc::now();
        let record = FailureRecord::new(SIG, "/py", "boom");
        let window = Duration::minutes(30);
        assert!(record.cooldown_at("packages=x", Path::new("/py"), window, now).is_none());
        assert!(record.cooldown_at(SIG, Path::new("/other"), window, now).is_none());
    }

    #[test]
    fn detail_is_single_line() {
        let record = FailureRecord::new(SIG, "/py", "a\r\nb");
        assert_eq!(record.detail, "a  b");
    }

    #[test]
    fn record_load_clear() {
        let temp = TempDir::new().unwrap();
        let cache = FailureCache::new(temp.path().join("install.fail"));
        let py = temp.path().join("python");

        cache.record(SIG, &py, "pip-install-failed: code=1");
        let cooldown = cache.active_cooldown(SIG, &py, Duration::minutes(30)).unwrap();
        assert!(cooldown.remaining_secs > 0);
        assert_eq!(cooldown.detail, "pip-install-failed: code=1");

        cache.clear();
        assert!(cache.load().is_none());
        cache.clear();
    }
}
