//! Configuration for the runtime bootstrapper.
//!
//! - Layered key/value settings in [`layer`]
//! - File, environment and override discovery in [`loader`]
//! - The typed [`BootstrapConfig`] in [`settings`]
//!
//! # Example
//!
//! ```
//! use voxenv::config::{BootstrapConfig, SettingsLayer, SettingsStack};
//!
//! let mut layer = SettingsLayer::new("inline");
//! layer.set("max-python-minor", "11");
//! let config = BootstrapConfig::from_settings(&SettingsStack::single(layer));
//! assert_eq!(config.max_python_minor, 11);
//! ```

pub mod layer;
pub mod loader;
pub mod settings;

pub use layer::{ResolvedSetting, SettingsLayer, SettingsStack};
pub use loader::{load_settings, load_settings_file, parse_overrides, parse_settings};
pub use settings::{default_runtime_root, keys, BootstrapConfig, BACKEND_NAME, PROBE_TIMEOUT};
