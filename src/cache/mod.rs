//! Persistent bootstrap state.
//!
//! Three small files under the runtime root remember what happened last
//! time so a run can skip expensive work:
//!
//! - [`InstallMarker`]: signature of the last successful install
//! - [`HealthCache`]: last time the dependencies were verified working
//! - [`FailureCache`]: last failed install, with a retry cooldown
//!
//! Health and failure writes are best-effort; a failed write is logged and
//! the bootstrap continues.

pub mod failure;
pub mod health;
pub mod kv;
pub mod marker;

pub use failure::{Cooldown, FailureCache, FailureRecord};
pub use health::{HealthCache, HealthRecord};
pub use kv::{write_atomic, KvRecord};
pub use marker::InstallMarker;

use crate::layout::RuntimeLayout;

/// The three state files of one runtime root.
#[derive(Debug, Clone)]
pub struct StateFiles {
    pub marker: InstallMarker,
    pub health: HealthCache,
    pub failure: FailureCache,
}

impl StateFiles {
    pub fn new(layout: &RuntimeLayout) -> Self {
        Self {
            marker: InstallMarker::new(layout.install_marker()),
            health: HealthCache::new(layout.health_file()),
            failure: FailureCache::new(layout.failure_file()),
        }
    }

    /// Remove all three files. Returns how many existed.
    pub fn clear_all(&self) -> crate::error::Result<usize> {
        let mut removed = 0;
        if self.marker.clear()? {
            removed += 1;
        }
        if self.health.clear()? {
            removed += 1;
        }
        if kv::remove_if_exists(self.failure.path())? {
            removed += 1;
        }
        Ok(removed)
    }
}
