//! Voxenv - idempotent bootstrap of the speech-recognition Python runtime.
//!
//! Voxenv provisions, validates and heals the isolated Python environment a
//! FunASR speech backend needs, without blocking or failing its host. A run
//! either yields a ready interpreter or a `NotReady` result with a stable,
//! machine-readable reason.
//!
//! # Modules
//!
//! - [`bootstrap`] - Single-flight orchestrator, results and status sinks
//! - [`cache`] - Install marker, health cache and failure cache files
//! - [`cli`] - Command-line host
//! - [`config`] - Layered settings and the resolved [`config::BootstrapConfig`]
//! - [`error`] - Error types and result aliases
//! - [`install`] - Multi-strategy pip installer and failure classification
//! - [`layout`] - Paths under the runtime root
//! - [`prebuilt`] - Prebuilt runtime bundle extraction
//! - [`process`] - External process execution with timeouts and cancellation
//! - [`python`] - Interpreter discovery, provisioning and virtual environments
//!
//! # Example
//!
//! ```
//! use voxenv::bootstrap::{progress_message, FailureReason};
//! use voxenv::config::BootstrapConfig;
//!
//! let config = BootstrapConfig::default();
//! assert_eq!(
//!     config.installation_signature(),
//!     "packages=funasr modelscope torch torchaudio"
//! );
//! assert_eq!(FailureReason::PythonNotFound.to_string(), "python-not-found");
//! assert_eq!(
//!     progress_message(2, 7, "Checking Python version"),
//!     "Voice setup progress 29% (2/7): Checking Python version"
//! );
//! ```
//!
//! For full bootstrap runs against a scripted runner, see the integration
//! tests.

pub mod bootstrap;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod install;
pub mod layout;
pub mod prebuilt;
pub mod process;
pub mod python;

pub use bootstrap::{BootstrapResult, Bootstrapper};
pub use error::{BootstrapError, Result};
