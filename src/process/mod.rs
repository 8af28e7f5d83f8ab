//! External process execution.
//!
//! All interaction with interpreters, package managers and environment
//! managers goes through the [`ProcessRunner`] trait, so tests can script
//! responses with [`MockRunner`].

pub mod command;
pub mod mock;
pub mod progress;

pub use command::{
    compact_args, truncate_chars, Exec, ProcessRequest, ProcessResult, ProcessRunner,
    TokioProcessRunner, FAILURE_EXIT_CODE, MIN_TIMEOUT,
};
pub use mock::MockRunner;
pub use progress::{classify_line, LineKind, ProgressThrottle};
