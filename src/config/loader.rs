//! Settings discovery and loading.
//!
//! Settings are merged in this order (later overrides earlier):
//! 1. Settings file (`--config` path, or `<config_dir>/voxenv/config.yml`)
//! 2. Environment variables (`VOXENV_PYTHON_EXE` for `python-exe`, ...)
//! 3. Explicit `key=value` overrides

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::config::layer::{SettingsLayer, SettingsStack};
use crate::config::settings::keys;
use crate::error::{BootstrapError, Result};

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "VOXENV_";

/// Find the user's settings file at `<config_dir>/voxenv/config.yml`.
pub fn find_user_settings() -> Option<PathBuf> {
    let path = dirs::config_dir()?.join("voxenv").join("config.yml");
    if path.exists() {
        Some(path)
    } else {
        None
    }
}

/// Parse a YAML settings document into a layer.
///
/// The document must be a flat mapping of keys to scalars; nested values
/// are rejected so typos surface early.
pub fn parse_settings(content: &str, source: &str) -> Result<SettingsLayer> {
    let mut layer = SettingsLayer::new(source);
    let value: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| BootstrapError::ConfigParse {
            path: PathBuf::from(source),
            message: e.to_string(),
        })?;

    let mapping = match value {
        serde_yaml::Value::Null => return Ok(layer),
        serde_yaml::Value::Mapping(m) => m,
        _ => {
            return Err(BootstrapError::ConfigParse {
                path: PathBuf::from(source),
                message: "expected a mapping of setting keys".to_string(),
            })
        }
    };

    for (key, value) in mapping {
        let Some(key) = key.as_str() else {
            return Err(BootstrapError::ConfigParse {
                path: PathBuf::from(source),
                message: format!("setting keys must be strings, got {:?}", key),
            });
        };
        let text = match value {
            serde_yaml::Value::Null => String::new(),
            serde_yaml::Value::Bool(b) => b.to_string(),
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::String(s) => s,
            _ => {
                return Err(BootstrapError::InvalidSetting {
                    key: key.to_string(),
                    message: "value must be a scalar".to_string(),
                })
            }
        };
        if !keys::ALL.contains(&key) {
            tracing::warn!(key, source, "unknown setting key");
        }
        layer.set(key, text);
    }

    Ok(layer)
}

/// Load a settings file into a layer.
pub fn load_settings_file(path: &Path) -> Result<SettingsLayer> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading settings file {}", path.display()))?;
    parse_settings(&content, &path.display().to_string())
}

/// Collect settings from environment variables using a custom lookup.
///
/// This allows testing without modifying actual environment variables.
pub fn env_layer_with<F>(lookup: F) -> SettingsLayer
where
    F: Fn(&str) -> Option<String>,
{
    let mut layer = SettingsLayer::new("environment");
    for key in keys::ALL {
        let var = env_var_name(key);
        if let Some(value) = lookup(&var) {
            layer.set(*key, value);
        }
    }
    layer
}

/// Environment variable name for a setting key.
pub fn env_var_name(key: &str) -> String {
    format!("{}{}", ENV_PREFIX, key.replace('-', "_").to_uppercase())
}

/// Parse `key=value` overrides.
pub fn parse_overrides(pairs: &[String]) -> Result<SettingsLayer> {
    let mut layer = SettingsLayer::new("--set");
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(BootstrapError::InvalidSetting {
                key: pair.clone(),
                message: "expected key=value".to_string(),
            });
        };
        layer.set(key.trim(), value.trim());
    }
    Ok(layer)
}

/// Build the full settings stack.
pub fn load_settings(explicit: Option<&Path>, overrides: &[String]) -> Result<SettingsStack> {
    let mut stack = SettingsStack::new();

    let file = explicit.map(Path::to_path_buf).or_else(find_user_settings);
    if let Some(path) = file {
        tracing::debug!(path = %path.display(), "loading settings file");
        stack.push(load_settings_file(&path)?);
    }

    stack.push(env_layer_with(|name| std::env::var(name).ok()));
    stack.push(parse_overrides(overrides)?);
    Ok(stack)
}
