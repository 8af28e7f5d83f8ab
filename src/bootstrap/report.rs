//! Read-only view of a runtime root's persisted state.

use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;

use crate::cache::{FailureRecord, HealthRecord, StateFiles};
use crate::config::BootstrapConfig;
use crate::layout::RuntimeLayout;

/// Snapshot of everything a bootstrap run would consult on disk.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeReport {
    pub runtime_root: PathBuf,
    pub venv_python: PathBuf,
    pub venv_exists: bool,
    pub expected_signature: String,
    pub installed_signature: Option<String>,
    pub signature_matches: bool,
    pub health: Option<HealthRecord>,
    pub health_fresh: bool,
    pub failure: Option<FailureRecord>,
    pub cooldown_remaining_secs: Option<i64>,
    pub bundle_marker: Option<String>,
}

impl RuntimeReport {
    /// Collect the report for `config`'s runtime root.
    pub fn collect(config: &BootstrapConfig) -> Self {
        let layout = RuntimeLayout::new(&config.runtime_root);
        let files = StateFiles::new(&layout);
        let venv_python = layout.venv_python();
        let expected = config.installation_signature();
        let installed = files.marker.read();
        let now = Utc::now();

        let health = files.health.load();
        let health_fresh = health.as_ref().is_some_and(|h| {
            h.is_fresh_at(&expected, &venv_python, config.health_ttl(), now)
        });

        let failure = files.failure.load();
        let cooldown_remaining_secs = failure.as_ref().and_then(|f| {
            f.cooldown_at(&expected, &venv_python, config.failure_cooldown(), now)
                .map(|c| c.remaining_secs)
        });

        let bundle_marker = fs::read_to_string(layout.bundle_marker())
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Self {
            runtime_root: layout.root().to_path_buf(),
            venv_exists: venv_python.is_file(),
            venv_python,
            signature_matches: installed.as_deref() == Some(expected.as_str()),
            expected_signature: expected,
            installed_signature: installed,
            health,
            health_fresh,
            failure,
            cooldown_remaining_secs,
            bundle_marker,
        }
    }

    /// Human-readable lines for terminal output.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Runtime root: {}", self.runtime_root.display()),
            format!(
                "Environment:  {} ({})",
                self.venv_python.display(),
                if self.venv_exists { "present" } else { "missing" }
            ),
            format!("Expected:     {}", self.expected_signature),
        ];

        match &self.installed_signature {
            Some(sig) if self.signature_matches => lines.push(format!("Installed:    {}", sig)),
            Some(sig) => lines.push(format!("Installed:    {} (stale)", sig)),
            None => lines.push("Installed:    none".to_string()),
        }

        match &self.health {
            Some(h) => lines.push(format!(
                "Health:       checked {} ({})",
                h.checked_at.to_rfc3339(),
                if self.health_fresh { "fresh" } else { "expired" }
            )),
            None => lines.push("Health:       never verified".to_string()),
        }

        match (&self.failure, self.cooldown_remaining_secs) {
            (Some(f), Some(secs)) => lines.push(format!(
                "Last failure: {} (retry in {}s)",
                f.detail, secs
            )),
            (Some(f), None) => lines.push(format!("Last failure: {}", f.detail)),
            (None, _) => lines.push("Last failure: none".to_string()),
        }

        if let Some(marker) = &self.bundle_marker {
            lines.push(format!("Bundle:       {}", marker));
        }
        lines
    }
}
