//! Interpreter discovery, compatible-runtime provisioning and isolated
//! environments.

pub mod provision;
pub mod resolver;
pub mod venv;

pub use provision::{locate_conda, provision, well_known_conda_paths};
pub use resolver::{
    candidates, probe_version, resolve, version_supported, InterpreterVersion, SUPPORTED_MAJOR,
};
pub use venv::{ensure_venv, VenvOutcome};
