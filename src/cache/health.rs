//! "Last verified working" record.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::kv::{format_timestamp, parse_timestamp, remove_if_exists, KvRecord};
use crate::layout::same_path;

/// A persisted dependency health verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthRecord {
    pub ok: bool,
    pub signature: String,
    pub interpreter: PathBuf,
    pub checked_at: DateTime<Utc>,
}

impl HealthRecord {
    /// A passing record checked now.
    pub fn verified(signature: impl Into<String>, interpreter: impl Into<PathBuf>) -> Self {
        Self {
            ok: true,
            signature: signature.into(),
            interpreter: interpreter.into(),
            checked_at: Utc::now(),
        }
    }

    /// Whether this record vouches for `signature` and `interpreter` at `now`.
    pub fn is_fresh_at(
        &self,
        signature: &str,
        interpreter: &Path,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        self.ok
            && self.signature == signature
            && same_path(&self.interpreter, interpreter)
            && now.signed_duration_since(self.checked_at) < ttl
    }

    fn to_kv(&self) -> KvRecord {
        KvRecord::new()
            .with("ok", self.ok.to_string())
            .with("signature", self.signature.clone())
            .with("interpreter", self.interpreter.display().to_string())
            .with("checked_at", format_timestamp(self.checked_at))
    }

    fn from_kv(kv: &KvRecord) -> Option<Self> {
        Some(Self {
            ok: kv.get("ok")?.eq_ignore_ascii_case("true"),
            signature: kv.get("signature")?.to_string(),
            interpreter: PathBuf::from(kv.get("interpreter")?),
            checked_at: parse_timestamp(kv.get("checked_at")?)?,
        })
    }
}

/// Health cache file.
#[derive(Debug, Clone)]
pub struct HealthCache {
    path: PathBuf,
}

impl HealthCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the record. Malformed files read as absent.
    pub fn load(&self) -> Option<HealthRecord> {
        HealthRecord::from_kv(&KvRecord::load(&self.path)?)
    }

    /// Whether a fresh record exists for this signature and interpreter.
    pub fn is_fresh(&self, signature: &str, interpreter: &Path, ttl: Duration) -> bool {
        self.load()
            .is_some_and(|r| r.is_fresh_at(signature, interpreter, ttl, Utc::now()))
    }

    /// Record a successful verification. Write errors are logged and ignored.
    pub fn record_success(&self, signature: &str, interpreter: &Path) {
        let record = HealthRecord::verified(signature, interpreter);
        if let Err(e) = record.to_kv().save(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to write health cache");
        }
    }

    /// Remove the record.
    pub fn clear(&self) -> crate::error::Result<bool> {
        remove_if_exists(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SIG: &str = "packages=funasr modelscope torch torchaudio";

    fn record(age: Duration) -> HealthRecord {
        HealthRecord {
            ok: true,
            signature: SIG.to_string(),
            interpreter: PathBuf::from("/rt/venv/bin/python"),
            checked_at: Utc::now() - age,
        }
    }

    #[test]
    fn fresh_within_ttl() {
        let now = Utc::now();
        let py = Path::new("/rt/venv/bin/python");
        assert!(record(Duration::hours(1)).is_fresh_at(SIG, py, Duration::hours(72), now));
        assert!(!record(Duration::hours(73)).is_fresh_at(SIG, py, Duration::hours(72), now));
    }

    #[test]
    fn stale_on_mismatch_or_not_ok() {
        let now = Utc::now();
        let py = Path::new("/rt/venv/bin/python");
        let ttl = Duration::hours(72);
        let r = record(Duration::zero());
        assert!(!r.is_fresh_at("packages=funasr", py, ttl, now));
        assert!(!r.is_fresh_at(SIG, Path::new("/other/python"), ttl, now));
        let failed = HealthRecord { ok: false, ..r };
        assert!(!failed.is_fresh_at(SIG, py, ttl, now));
    }

    #[test]
    fn persists_and_reloads() {
        let temp = TempDir::new().unwrap();
        let cache = HealthCache::new(temp.path().join("health.json"));
        let py = temp.path().join("python");

        assert!(cache.load().is_none());
        cache.record_success(SIG, &py);

        let loaded = cache.load().unwrap();
        assert!(loaded.ok);
        assert_eq!(loaded.signature, SIG);
        assert_eq!(loaded.interpreter, py);
        assert!(cache.is_fresh(SIG, &py, Duration::hours(1)));

        assert!(cache.clear().unwrap());
        assert!(cache.load().is_none());
    }

    #[test]
    fn malformed_file_reads_as_absent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("health.json");
        std::fs::write(&path, "ok=true\nchecked_at=not-a-date\n").unwrap();
        assert!(HealthCache::new(&path).load().is_none());
    }
}
