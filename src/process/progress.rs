//! Throttled logging of installer progress lines.
//!
//! Package installs print thousands of lines. Only a few kinds are worth
//! logging, and "downloading" lines are limited to one every two seconds.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use regex::Regex;

/// Minimum spacing between logged "downloading" lines.
pub const DOWNLOAD_LOG_INTERVAL: Duration = Duration::from_secs(2);

fn interesting_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)(collecting |downloading |building wheel|installing collected packages|successfully installed|error:|failed)",
        )
        .expect("progress pattern is valid")
    })
}

/// Kind of installer output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Not worth logging.
    Noise,
    /// A "downloading" line, subject to throttling.
    Download,
    /// Any other notable line.
    Notable,
}

/// Classify a single output line.
pub fn classify_line(line: &str) -> LineKind {
    if line.trim().is_empty() || !interesting_pattern().is_match(line) {
        return LineKind::Noise;
    }
    if line.to_lowercase().contains("downloading ") {
        LineKind::Download
    } else {
        LineKind::Notable
    }
}

/// Rate limiter shared by all output readers of a runner.
#[derive(Debug, Default)]
pub struct ProgressThrottle {
    last_logged: Mutex<Option<Instant>>,
}

impl ProgressThrottle {
    /// Create a throttle that has not logged anything yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a line should be logged at `now`.
    pub fn admit(&self, line: &str, now: Instant) -> bool {
        let kind = classify_line(line);
        if kind == LineKind::Noise {
            return false;
        }

        let mut last = self.last_logged.lock();
        if kind == LineKind::Download {
            if let Some(prev) = *last {
                if now.saturating_duration_since(prev) < DOWNLOAD_LOG_INTERVAL {
                    return false;
                }
            }
        }
        *last = Some(now);
        true
    }

    /// Log the line if admitted.
    pub fn observe(&self, line: &str) {
        if self.admit(line, Instant::now()) {
            tracing::info!(target: "voxenv::pip", "pip-progress: {}", line.trim());
        }
    }
}
