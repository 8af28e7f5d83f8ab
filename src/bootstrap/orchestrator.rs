//! The bootstrap state machine and its single-flight entry points.
//!
//! Stages, each reported to the status sink:
//!
//! 1. Prebuilt bundle (when preferred); stops here on success, or when
//!    online fallback is disallowed
//! 2. Interpreter resolution and version gate, with conda provisioning for
//!    unsupported versions
//! 3. Isolated environment creation
//! 4. Installation signature check, cooldown, and install
//! 5. Dependency verification and repair for an existing install
//! 6. Ready
//!
//! Every failure becomes a `NotReady` result. Nothing escapes the run.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use super::result::{BootstrapResult, FailureReason};
use super::status::{progress_message, ListenerState, StatusSink, TOTAL_STEPS};
use crate::cache::StateFiles;
use crate::config::BootstrapConfig;
use crate::error::Result;
use crate::install::{cooldown_bypass_allowed, InstallOutcome, Installer, Pip};
use crate::layout::RuntimeLayout;
use crate::prebuilt::{default_search_roots, PrebuiltError, PrebuiltLoader, PrebuiltRuntime};
use crate::process::{Exec, ProcessRunner};
use crate::python::{self, VenvOutcome};

/// A bootstrap run shared by every caller that asked for it.
pub type BootstrapFuture = Shared<BoxFuture<'static, BootstrapResult>>;

/// Owns the memoized bootstrap run for one runtime root.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
/// use voxenv::bootstrap::{Bootstrapper, StatusCenter};
/// use voxenv::config::BootstrapConfig;
/// use voxenv::process::TokioProcessRunner;
///
/// # async fn demo() {
/// let bootstrapper = Bootstrapper::new(
///     BootstrapConfig::default(),
///     Arc::new(TokioProcessRunner::new()),
///     Arc::new(StatusCenter::new()),
/// );
/// let result = bootstrapper.ensure_ready(CancellationToken::new()).await;
/// println!("{} {}", result.is_ready(), result.message());
/// # }
/// ```
pub struct Bootstrapper {
    inner: Arc<Inner>,
    in_flight: Mutex<Option<BootstrapFuture>>,
}

#[derive(Clone)]
struct Inner {
    config: BootstrapConfig,
    layout: RuntimeLayout,
    runner: Arc<dyn ProcessRunner>,
    status: Arc<dyn StatusSink>,
    bundle_roots: Vec<PathBuf>,
}

impl Bootstrapper {
    pub fn new(
        config: BootstrapConfig,
        runner: Arc<dyn ProcessRunner>,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        let layout = RuntimeLayout::new(&config.runtime_root);
        Self {
            inner: Arc::new(Inner {
                config,
                layout,
                runner,
                status,
                bundle_roots: default_search_roots(),
            }),
            in_flight: Mutex::new(None),
        }
    }

    /// Replace the directories a relative bundle path is resolved against.
    pub fn with_bundle_search_roots(mut self, roots: Vec<PathBuf>) -> Self {
        Arc::make_mut(&mut self.inner).bundle_roots = roots;
        self
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.inner.config
    }

    pub fn layout(&self) -> &RuntimeLayout {
        &self.inner.layout
    }

    /// The memoized bootstrap run, started on first call.
    ///
    /// Callers arriving before completion share the same run and result.
    /// `cancel` only applies to the call that starts the run.
    pub fn ensure_ready(&self, cancel: CancellationToken) -> BootstrapFuture {
        let mut slot = self.in_flight.lock();
        slot.get_or_insert_with(|| self.start(cancel)).clone()
    }

    /// Discard the memoized run and start a fresh one.
    ///
    /// Callers already awaiting the previous run keep its result.
    pub fn force_rebootstrap(&self, cancel: CancellationToken) -> BootstrapFuture {
        let run = self.start(cancel);
        *self.in_flight.lock() = Some(run.clone());
        run
    }

    /// Start a background run when automatic bootstrap applies.
    ///
    /// Returns whether a run was requested.
    pub fn kickoff_if_needed(&self) -> bool {
        let config = &self.inner.config;
        tracing::info!(
            auto_bootstrap = config.auto_bootstrap,
            provider = %config.asr_provider,
            "kickoff check"
        );
        if !config.auto_bootstrap {
            tracing::info!("kickoff skipped: auto bootstrap disabled");
            return false;
        }
        if !config.provider_includes_backend() {
            tracing::info!("kickoff skipped: provider does not include the backend");
            return false;
        }
        if Handle::try_current().is_err() {
            tracing::warn!("kickoff skipped: no async runtime");
            return false;
        }

        self.inner
            .status
            .publish(ListenerState::Loading, "Preparing FunASR runtime");
        tracing::info!("kickoff started");
        drop(self.ensure_ready(CancellationToken::new()));
        true
    }

    fn start(&self, cancel: CancellationToken) -> BootstrapFuture {
        let inner = Arc::clone(&self.inner);
        let fallback = PathBuf::from(&inner.config.python_exe);
        let run = async move { inner.run(cancel).await };

        match Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn(run);
                async move {
                    task.await.unwrap_or_else(|e| {
                        tracing::error!(error = %e, "bootstrap task failed");
                        BootstrapResult::not_ready(fallback, format!("bootstrap task failed: {}", e))
                    })
                }
                .boxed()
                .shared()
            }
            Err(_) => run.boxed().shared(),
        }
    }
}

impl Inner {
    async fn run(&self, cancel: CancellationToken) -> BootstrapResult {
        let fallback = PathBuf::from(&self.config.python_exe);
        match self.run_stages(&cancel).await {
            Ok(result) => {
                tracing::info!(
                    ready = result.is_ready(),
                    interpreter = %result.interpreter().display(),
                    message = result.message(),
                    "bootstrap finished"
                );
                result
            }
            Err(e) if e.is_cancelled() => {
                tracing::info!("bootstrap cancelled");
                self.unavailable("Voice runtime setup cancelled");
                BootstrapResult::not_ready(fallback, FailureReason::Cancelled)
            }
            Err(e) => {
                tracing::error!(error = %e, "bootstrap failed");
                self.unavailable("Voice runtime setup failed");
                BootstrapResult::not_ready(fallback, e)
            }
        }
    }

    async fn run_stages(&self, cancel: &CancellationToken) -> Result<BootstrapResult> {
        let config = &self.config;
        let configured = PathBuf::from(&config.python_exe);

        if !config.auto_bootstrap {
            self.unavailable("Automatic voice runtime setup is disabled");
            return Ok(BootstrapResult::not_ready(
                configured,
                FailureReason::AutoBootstrapDisabled,
            ));
        }

        fs::create_dir_all(self.layout.root())?;
        tracing::info!(
            root = %self.layout.root().display(),
            prefer_prebuilt = config.prefer_prebuilt,
            allow_online_fallback = config.allow_online_fallback,
            bundle_path = %config.bundle_path,
            "runtime strategy"
        );

        if config.prefer_prebuilt {
            self.progress(1, "Checking prebuilt voice runtime bundle", ListenerState::Loading);
            match self.prepare_prebuilt().await {
                Ok(runtime) => {
                    tracing::info!(
                        interpreter = %runtime.interpreter.display(),
                        bundle = %runtime.bundle.display(),
                        "using prebuilt runtime"
                    );
                    self.finish("Prebuilt voice runtime ready, initializing listener");
                    return Ok(BootstrapResult::ready(
                        runtime.interpreter,
                        format!("prebuilt:{}", runtime.bundle.display()),
                    ));
                }
                Err(e) if !config.allow_online_fallback => {
                    tracing::info!(reason = %e, "prebuilt runtime not ready, online fallback disallowed");
                    self.unavailable(&format!("No usable prebuilt voice runtime ({})", e));
                    return Ok(BootstrapResult::not_ready(
                        configured,
                        FailureReason::PrebuiltNotReady(e),
                    ));
                }
                Err(e) => {
                    tracing::info!(reason = %e, "prebuilt runtime unavailable, falling back to online setup");
                }
            }
        }

        let exec = Exec::new(self.runner.as_ref(), cancel);

        self.progress(1, "Detecting Python runtime", ListenerState::Loading);
        let Some(base_python) = python::resolve(&exec, &config.python_exe).await? else {
            self.unavailable("No usable Python found, voice listener unavailable");
            return Ok(BootstrapResult::not_ready(
                configured,
                FailureReason::PythonNotFound,
            ));
        };

        self.progress(2, "Checking Python version", ListenerState::Loading);
        let (base_python, version) = self.compatible_python(&exec, base_python).await?;
        if !python::version_supported(version.as_ref(), config.max_python_minor) {
            let text = version
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "unknown".to_string());
            tracing::info!(version = %text, "unsupported Python version");
            self.unavailable(&format!(
                "Python {} is not supported, install Python 3.10 to 3.{}",
                text, config.max_python_minor
            ));
            return Ok(BootstrapResult::not_ready(
                base_python,
                FailureReason::PythonVersionUnsupported(text),
            ));
        }

        if !self.layout.venv_python().is_file() {
            self.progress(3, "Creating voice runtime environment", ListenerState::Installing);
        }
        let venv_python = match python::ensure_venv(
            &exec,
            &base_python,
            &self.layout.venv_dir(),
            config.venv_timeout(),
        )
        .await?
        {
            VenvOutcome::Existing(path) | VenvOutcome::Created(path) => path,
            VenvOutcome::Failed(result) => {
                self.unavailable("Failed to create voice runtime environment");
                return Ok(BootstrapResult::not_ready(
                    configured,
                    FailureReason::VenvCreateFailed(result.stderr.trim().to_string()),
                ));
            }
        };

        let signature = config.installation_signature();
        let files = StateFiles::new(&self.layout);
        let installer = Installer::new(exec, Pip::new(&venv_python), config);

        if !files.marker.matches(&signature) {
            if let Some(cooldown) =
                files
                    .failure
                    .active_cooldown(&signature, &venv_python, config.failure_cooldown())
            {
                if cooldown_bypass_allowed(&cooldown.detail, config.use_no_deps_strategy) {
                    tracing::info!("cooldown bypassed for native build failure with no-deps strategy");
                    files.failure.clear();
                } else {
                    tracing::info!(
                        remaining_secs = cooldown.remaining_secs,
                        detail = %cooldown.detail,
                        "install skipped by cooldown"
                    );
                    self.unavailable(&format!(
                        "Voice runtime setup cooling down, retrying in {}s",
                        cooldown.remaining_secs
                    ));
                    return Ok(BootstrapResult::not_ready(
                        configured,
                        FailureReason::InstallCooldown {
                            remaining_secs: cooldown.remaining_secs,
                            detail: cooldown.detail,
                        },
                    ));
                }
            }

            self.progress(
                4,
                "Installing speech recognition dependencies",
                ListenerState::Installing,
            );
            match installer.install().await? {
                InstallOutcome::Installed(strategy) => {
                    tracing::info!(%strategy, "packages installed");
                    files.marker.write(&signature)?;
                    files.health.record_success(&signature, &venv_python);
                    files.failure.clear();
                }
                InstallOutcome::Failed(summary) => {
                    files.failure.record(&signature, &venv_python, &summary);
                    self.unavailable("Voice dependency installation failed");
                    return Ok(BootstrapResult::not_ready(
                        configured,
                        FailureReason::PipInstallFailed(summary),
                    ));
                }
            }
        } else if files
            .health
            .is_fresh(&signature, &venv_python, config.health_ttl())
        {
            tracing::debug!("health cache fresh, skipping dependency probe");
            files.health.record_success(&signature, &venv_python);
        } else {
            self.progress(5, "Verifying voice dependencies", ListenerState::Loading);
            if installer.verify().await? {
                files.health.record_success(&signature, &venv_python);
            } else {
                tracing::info!("dependency probe failed, repairing");
                self.publish(
                    ListenerState::Installing,
                    "Voice dependencies look broken, repairing",
                );
                if let Err(summary) = installer.repair().await? {
                    self.unavailable("Voice dependency repair failed");
                    return Ok(BootstrapResult::not_ready(
                        configured,
                        FailureReason::PipRepairFailed(summary),
                    ));
                }
                if !installer.verify().await? {
                    files.failure.record(
                        &signature,
                        &venv_python,
                        "dependency-health-check-failed-after-repair",
                    );
                    self.unavailable("Voice dependency verification failed");
                    return Ok(BootstrapResult::not_ready(
                        configured,
                        FailureReason::DependencyHealthCheckFailed,
                    ));
                }
                files.marker.write(&signature)?;
                files.health.record_success(&signature, &venv_python);
            }
        }

        self.finish("Voice runtime ready, initializing listener");
        Ok(BootstrapResult::ready(venv_python, "ok"))
    }

    /// Probe the base interpreter and swap in a provisioned one when the
    /// base version is unsupported and the provisioned one passes.
    async fn compatible_python(
        &self,
        exec: &Exec<'_>,
        base: PathBuf,
    ) -> Result<(PathBuf, Option<python::InterpreterVersion>)> {
        let max_minor = self.config.max_python_minor;
        let version = python::probe_version(exec, &base).await?;
        if python::version_supported(version.as_ref(), max_minor) {
            return Ok((base, version));
        }

        if self.config.auto_provision_conda {
            self.publish(
                ListenerState::Installing,
                &format!(
                    "Preparing Python {} runtime",
                    self.config.conda_python_version
                ),
            );
        }
        if let Some(provisioned) = python::provision(exec, &self.layout, &self.config).await? {
            let provisioned_version = python::probe_version(exec, &provisioned).await?;
            if python::version_supported(provisioned_version.as_ref(), max_minor) {
                tracing::info!(
                    path = %provisioned.display(),
                    version = ?provisioned_version.as_ref().map(ToString::to_string),
                    "switched to provisioned interpreter"
                );
                return Ok((provisioned, provisioned_version));
            }
        }
        Ok((base, version))
    }

    async fn prepare_prebuilt(&self) -> std::result::Result<PrebuiltRuntime, PrebuiltError> {
        let loader = PrebuiltLoader::new(self.layout.clone(), self.config.bundle_path.clone())
            .with_search_roots(self.bundle_roots.clone());
        match Handle::try_current() {
            Ok(handle) => handle
                .spawn_blocking(move || loader.prepare())
                .await
                .unwrap_or_else(|e| Err(PrebuiltError::PrepareFailed(e.to_string()))),
            Err(_) => loader.prepare(),
        }
    }

    fn progress(&self, step: u32, detail: &str, state: ListenerState) {
        self.publish(state, &progress_message(step, TOTAL_STEPS, detail));
    }

    fn finish(&self, detail: &str) {
        self.progress(6, detail, ListenerState::Loading);
        self.progress(7, "Voice listener available", ListenerState::Ready);
    }

    fn unavailable(&self, message: &str) {
        self.publish(ListenerState::Unavailable, message);
    }

    fn publish(&self, state: ListenerState, message: &str) {
        self.status.publish(state, message);
    }
}
