//! Source-tracked settings lookup.
//!
//! Settings are flat `key=value` strings. A [`SettingsLayer`] holds what one
//! source supplied (settings file, environment, `--set`). A [`SettingsStack`]
//! answers each lookup from the last layer that has the key and reports that
//! layer's source alongside the value.

use std::collections::BTreeMap;

/// A setting value and the source that supplied it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSetting<'a> {
    pub value: &'a str,
    pub source: &'a str,
}

/// Values supplied by one source.
///
/// # Example
///
/// ```
/// use voxenv::config::SettingsLayer;
///
/// let mut layer = SettingsLayer::new("config.yml");
/// layer.set("python-exe", "python3");
/// assert_eq!(layer.get("python-exe"), Some("python3"));
/// assert_eq!(layer.get("packages"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SettingsLayer {
    source: String,
    values: BTreeMap<String, String>,
}

impl SettingsLayer {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            values: BTreeMap::new(),
        }
    }

    /// Set a value, replacing any earlier one for the same key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Layers ordered from lowest to highest priority.
///
/// # Example
///
/// ```
/// use voxenv::config::{SettingsLayer, SettingsStack};
///
/// let mut file = SettingsLayer::new("config.yml");
/// file.set("packages", "funasr torch");
/// file.set("python-exe", "python3");
///
/// let mut overrides = SettingsLayer::new("--set");
/// overrides.set("python-exe", "/opt/py/bin/python");
///
/// let mut stack = SettingsStack::single(file);
/// stack.push(overrides);
///
/// let python = stack.lookup("python-exe").unwrap();
/// assert_eq!((python.value, python.source), ("/opt/py/bin/python", "--set"));
/// assert_eq!(stack.get("packages"), Some("funasr torch"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SettingsStack {
    layers: Vec<SettingsLayer>,
}

impl SettingsStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(layer: SettingsLayer) -> Self {
        Self {
            layers: vec![layer],
        }
    }

    /// Add a layer above every existing one.
    pub fn push(&mut self, layer: SettingsLayer) {
        self.layers.push(layer);
    }

    /// The winning value for `key` and where it came from.
    pub fn lookup(&self, key: &str) -> Option<ResolvedSetting<'_>> {
        self.layers.iter().rev().find_map(|layer| {
            layer.get(key).map(|value| ResolvedSetting {
                value,
                source: &layer.source,
            })
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.lookup(key).map(|setting| setting.value)
    }
}
