//! Coarse-grained status publishing.
//!
//! The bootstrapper reports each stage transition to a [`StatusSink`].
//! [`StatusCenter`] keeps the latest snapshot and broadcasts changes to any
//! number of watchers; a slow or absent watcher never affects bootstrap.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;

/// Number of progress steps in a full bootstrap.
pub const TOTAL_STEPS: u32 = 7;

/// Listener state shown to the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListenerState {
    #[default]
    Unknown,
    Installing,
    Loading,
    Unavailable,
    Ready,
}

impl std::fmt::Display for ListenerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ListenerState::Unknown => "unknown",
            ListenerState::Installing => "installing",
            ListenerState::Loading => "loading",
            ListenerState::Unavailable => "unavailable",
            ListenerState::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// A published status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub state: ListenerState,
    pub message: String,
    pub updated_at: DateTime<Utc>,
}

impl StatusSnapshot {
    pub fn new(state: ListenerState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
            updated_at: Utc::now(),
        }
    }
}

/// Receiver of status transitions.
pub trait StatusSink: Send + Sync {
    fn publish(&self, state: ListenerState, message: &str);
}

/// Format a progress message for `step` of `total`.
pub fn progress_message(step: u32, total: u32, detail: &str) -> String {
    let percent = (f64::from(step) * 100.0 / f64::from(total.max(1)))
        .round()
        .clamp(0.0, 100.0) as u32;
    format!(
        "Voice setup progress {}% ({}/{}): {}",
        percent, step, total, detail
    )
}

/// Latest-status holder with change broadcasting.
#[derive(Debug)]
pub struct StatusCenter {
    tx: watch::Sender<StatusSnapshot>,
}

impl Default for StatusCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusCenter {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(StatusSnapshot::new(
            ListenerState::Unknown,
            "Voice status unknown",
        ));
        Self { tx }
    }

    /// The latest published status.
    pub fn current(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }

    /// Watch future status changes.
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }
}

impl StatusSink for StatusCenter {
    fn publish(&self, state: ListenerState, message: &str) {
        tracing::debug!(%state, message, "status");
        self.tx.send_replace(StatusSnapshot::new(state, message));
    }
}

/// Sink that records every transition, for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(ListenerState, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded transitions, in order.
    pub fn events(&self) -> Vec<(ListenerState, String)> {
        self.events.lock().clone()
    }

    /// The last recorded transition.
    pub fn last(&self) -> Option<(ListenerState, String)> {
        self.events.lock().last().cloned()
    }

    /// Recorded states, in order.
    pub fn states(&self) -> Vec<ListenerState> {
        self.events.lock().iter().map(|(s, _)| *s).collect()
    }
}

impl StatusSink for RecordingSink {
    fn publish(&self, state: ListenerState, message: &str) {
        self.events.lock().push((state, message.to_string()));
    }
}
