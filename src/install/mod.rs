//! Dependency installation into the isolated environment.

pub mod classify;
pub mod installer;
pub mod pip;

pub use classify::{
    cooldown_bypass_allowed, is_native_build_failure, mentions_native_build_failure,
    package_names, NATIVE_BUILD_FAILURE_MARKERS, PINNED_COMPATIBLE,
};
pub use installer::{InstallOutcome, Installer, Strategy};
pub use pip::Pip;
