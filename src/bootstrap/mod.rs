//! Bootstrap orchestration.
//!
//! - [`orchestrator`] - the single-flight [`Bootstrapper`] and its stages
//! - [`result`] - [`BootstrapResult`] and the [`FailureReason`] taxonomy
//! - [`status`] - status sinks and progress messages
//! - [`report`] - read-only view of persisted state

pub mod orchestrator;
pub mod report;
pub mod result;
pub mod status;

pub use orchestrator::{BootstrapFuture, Bootstrapper};
pub use report::RuntimeReport;
pub use result::{BootstrapResult, FailureReason};
pub use status::{
    progress_message, ListenerState, RecordingSink, StatusCenter, StatusSink,
    StatusSnapshot, TOTAL_STEPS,
};
