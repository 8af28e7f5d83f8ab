//! Typed bootstrap configuration.
//!
//! [`BootstrapConfig`] is read once from a [`SettingsStack`]. Every key is
//! read tolerantly: a missing, empty, or unparsable value falls back to its
//! default instead of failing the read.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use super::layer::SettingsStack;

/// Setting keys understood by the bootstrapper.
pub mod keys {
    pub const AUTO_BOOTSTRAP: &str = "auto-bootstrap";
    pub const ASR_PROVIDER: &str = "asr-provider";
    pub const PYTHON_EXE: &str = "python-exe";
    pub const PREFER_PREBUILT: &str = "prefer-prebuilt";
    pub const ALLOW_ONLINE_FALLBACK: &str = "allow-online-fallback";
    pub const BUNDLE_PATH: &str = "bundle-path";
    pub const MAX_PYTHON_MINOR: &str = "max-python-minor";
    pub const PACKAGES: &str = "packages";
    pub const BASE_DEPENDENCIES: &str = "base-dependencies";
    pub const PRIMARY_PACKAGE: &str = "primary-package";
    pub const PROBE_MODULES: &str = "probe-modules";
    pub const USE_NO_DEPS_STRATEGY: &str = "use-no-deps-strategy";
    pub const BOOTSTRAP_TIMEOUT_SECONDS: &str = "bootstrap-timeout-seconds";
    pub const INSTALL_RETRY_COOLDOWN_MINUTES: &str = "install-retry-cooldown-minutes";
    pub const HEALTH_CACHE_HOURS: &str = "health-cache-hours";
    pub const AUTO_PROVISION_CONDA: &str = "auto-provision-conda";
    pub const CONDA_PYTHON_VERSION: &str = "conda-python-version";
    pub const CONDA_EXE: &str = "conda-exe";
    pub const RUNTIME_ROOT: &str = "runtime-root";

    /// All known keys, in documentation order.
    pub const ALL: &[&str] = &[
        AUTO_BOOTSTRAP,
        ASR_PROVIDER,
        PYTHON_EXE,
        PREFER_PREBUILT,
        ALLOW_ONLINE_FALLBACK,
        BUNDLE_PATH,
        MAX_PYTHON_MINOR,
        PACKAGES,
        BASE_DEPENDENCIES,
        PRIMARY_PACKAGE,
        PROBE_MODULES,
        USE_NO_DEPS_STRATEGY,
        BOOTSTRAP_TIMEOUT_SECONDS,
        INSTALL_RETRY_COOLDOWN_MINUTES,
        HEALTH_CACHE_HOURS,
        AUTO_PROVISION_CONDA,
        CONDA_PYTHON_VERSION,
        CONDA_EXE,
        RUNTIME_ROOT,
    ];
}

/// The backend name the provider selector must mention for kickoff.
pub const BACKEND_NAME: &str = "funasr";

/// Short probe timeout for interpreter discovery.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(20);

/// Resolved configuration for one bootstrapper instance.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapConfig {
    pub auto_bootstrap: bool,
    pub asr_provider: String,
    pub python_exe: String,
    pub prefer_prebuilt: bool,
    pub allow_online_fallback: bool,
    pub bundle_path: String,
    pub max_python_minor: u32,
    pub packages: String,
    pub base_dependencies: String,
    pub primary_package: String,
    pub probe_modules: String,
    pub use_no_deps_strategy: bool,
    pub bootstrap_timeout_seconds: u64,
    pub install_retry_cooldown_minutes: u64,
    pub health_cache_hours: u64,
    pub auto_provision_conda: bool,
    pub conda_python_version: String,
    pub conda_exe: Option<PathBuf>,
    pub runtime_root: PathBuf,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            auto_bootstrap: true,
            asr_provider: "hybrid".to_string(),
            python_exe: "python".to_string(),
            prefer_prebuilt: true,
            allow_online_fallback: false,
            bundle_path: "funasr-runtime-bundle.zip".to_string(),
            max_python_minor: 12,
            packages: "funasr modelscope torch torchaudio".to_string(),
            base_dependencies: "modelscope torch torchaudio".to_string(),
            primary_package: "funasr".to_string(),
            probe_modules: "funasr modelscope torch".to_string(),
            use_no_deps_strategy: true,
            bootstrap_timeout_seconds: 900,
            install_retry_cooldown_minutes: 30,
            health_cache_hours: 72,
            auto_provision_conda: true,
            conda_python_version: "3.11".to_string(),
            conda_exe: None,
            runtime_root: default_runtime_root(),
        }
    }
}

impl BootstrapConfig {
    /// Read a configuration from layered settings.
    pub fn from_settings(settings: &SettingsStack) -> Self {
        let d = Self::default();
        let reader = Reader(settings);
        Self {
            auto_bootstrap: reader.bool(keys::AUTO_BOOTSTRAP, d.auto_bootstrap),
            asr_provider: reader.string(keys::ASR_PROVIDER, d.asr_provider),
            python_exe: reader.string(keys::PYTHON_EXE, d.python_exe),
            prefer_prebuilt: reader.bool(keys::PREFER_PREBUILT, d.prefer_prebuilt),
            allow_online_fallback: reader
                .bool(keys::ALLOW_ONLINE_FALLBACK, d.allow_online_fallback),
            bundle_path: reader.string(keys::BUNDLE_PATH, d.bundle_path),
            max_python_minor: reader.number(keys::MAX_PYTHON_MINOR, d.max_python_minor),
            packages: reader.string(keys::PACKAGES, d.packages),
            base_dependencies: reader.string(keys::BASE_DEPENDENCIES, d.base_dependencies),
            primary_package: reader.string(keys::PRIMARY_PACKAGE, d.primary_package),
            probe_modules: reader.string(keys::PROBE_MODULES, d.probe_modules),
            use_no_deps_strategy: reader.bool(keys::USE_NO_DEPS_STRATEGY, d.use_no_deps_strategy),
            bootstrap_timeout_seconds: reader
                .number(keys::BOOTSTRAP_TIMEOUT_SECONDS, d.bootstrap_timeout_seconds),
            install_retry_cooldown_minutes: reader.number(
                keys::INSTALL_RETRY_COOLDOWN_MINUTES,
                d.install_retry_cooldown_minutes,
            ),
            health_cache_hours: reader.number(keys::HEALTH_CACHE_HOURS, d.health_cache_hours),
            auto_provision_conda: reader.bool(keys::AUTO_PROVISION_CONDA, d.auto_provision_conda),
            conda_python_version: reader
                .string(keys::CONDA_PYTHON_VERSION, d.conda_python_version),
            conda_exe: reader.optional(keys::CONDA_EXE).map(PathBuf::from),
            runtime_root: reader
                .optional(keys::RUNTIME_ROOT)
                .map(PathBuf::from)
                .unwrap_or(d.runtime_root),
        }
    }

    /// Whether the provider selector includes this backend.
    pub fn provider_includes_backend(&self) -> bool {
        self.asr_provider.to_lowercase().contains(BACKEND_NAME)
    }

    /// Timeout for creating the isolated environment.
    pub fn venv_timeout(&self) -> Duration {
        Duration::from_secs(self.bootstrap_timeout_seconds.max(30))
    }

    /// Timeout for installs, repairs and environment provisioning.
    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.bootstrap_timeout_seconds.max(120))
    }

    /// Timeout for the dependency health probe.
    pub fn health_probe_timeout(&self) -> Duration {
        Duration::from_secs(self.bootstrap_timeout_seconds.max(30))
    }

    /// Timeout for the import probe after a no-deps install.
    pub fn import_probe_timeout(&self) -> Duration {
        Duration::from_secs((self.install_timeout().as_secs() / 3).max(30))
    }

    /// Health cache time-to-live, never shorter than one hour.
    pub fn health_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.health_cache_hours.max(1) as i64)
    }

    /// Failure cooldown window, never shorter than one minute.
    pub fn failure_cooldown(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.install_retry_cooldown_minutes.max(1) as i64)
    }

    /// The installation signature derived from the declared package set.
    pub fn installation_signature(&self) -> String {
        format!("packages={}", self.packages)
    }
}

/// Default runtime root under the user's data directory.
pub fn default_runtime_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("voxenv")
        .join("funasr-runtime")
}

struct Reader<'a>(&'a SettingsStack);

impl Reader<'_> {
    fn optional(&self, key: &str) -> Option<String> {
        self.0
            .get(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
    }

    fn string(&self, key: &str, fallback: String) -> String {
        self.optional(key).unwrap_or(fallback)
    }

    fn bool(&self, key: &str, fallback: bool) -> bool {
        match self.optional(key).map(|v| v.to_lowercase()).as_deref() {
            Some("true") => true,
            Some("false") => false,
            Some(other) => {
                tracing::warn!(key, value = other, "ignoring unparsable boolean setting");
                fallback
            }
            None => fallback,
        }
    }

    fn number<T: std::str::FromStr + Copy>(&self, key: &str, fallback: T) -> T {
        match self.optional(key) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(key, value = %raw, "ignoring unparsable numeric setting");
                fallback
            }),
            None => fallback,
        }
    }
}
