//! End-to-end bootstrap runs against a scripted process runner.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use voxenv::bootstrap::{Bootstrapper, ListenerState, RecordingSink};
use voxenv::cache::kv::format_timestamp;
use voxenv::cache::{KvRecord, StateFiles};
use voxenv::config::BootstrapConfig;
use voxenv::layout::{conda_python, RuntimeLayout};
use voxenv::process::{MockRunner, ProcessResult};

const DEFAULT_SIGNATURE: &str = "packages=funasr modelscope torch torchaudio";
const STANDARD: &str = "--prefer-binary funasr modelscope torch torchaudio";
const IMPORT_PROBE: &str = "print('ok')";
const SHOW_ALL: &str = "Name: funasr\nVersion: 1.1\nName: modelscope\nName: torch\nName: torchaudio\n";
const EDITDISTANCE_FAIL: &str =
    "Building wheel for editdistance (pyproject.toml) ... error\nerror: Microsoft Visual C++ 14.0 is required";

struct Harness {
    temp: TempDir,
    runner: Arc<MockRunner>,
    sink: Arc<RecordingSink>,
    config: BootstrapConfig,
}

impl Harness {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("base-python");
        fs::write(&base, "").unwrap();
        let config = BootstrapConfig {
            python_exe: base.display().to_string(),
            runtime_root: temp.path().join("rt"),
            prefer_prebuilt: false,
            auto_provision_conda: false,
            ..Default::default()
        };
        Self {
            temp,
            runner: Arc::new(MockRunner::new()),
            sink: Arc::new(RecordingSink::new()),
            config,
        }
    }

    fn layout(&self) -> RuntimeLayout {
        RuntimeLayout::new(&self.config.runtime_root)
    }

    fn files(&self) -> StateFiles {
        StateFiles::new(&self.layout())
    }

    fn bootstrapper(&self) -> Bootstrapper {
        Bootstrapper::new(self.config.clone(), self.runner.clone(), self.sink.clone())
            .with_bundle_search_roots(Vec::new())
    }

    fn base_version(&self, minor: u32) {
        self.runner.on(
            "version_info",
            ProcessResult::success(format!("/usr/bin/python3|3|{}\n", minor)),
        );
    }

    fn creates_venv(&self) {
        let venv_python = self.layout().venv_python();
        self.runner
            .on_with("-m venv", ProcessResult::success(""), move |_| {
                touch(&venv_python);
            });
    }

    fn installs_succeed(&self) {
        self.runner.on("pip install", ProcessResult::success(""));
        self.runner.on(IMPORT_PROBE, ProcessResult::success("ok\n"));
        self.runner.on("pip show", ProcessResult::success(SHOW_ALL));
    }

    fn happy_path(&self) {
        self.base_version(11);
        self.creates_venv();
        self.installs_succeed();
    }

    /// An environment that was installed earlier with the default packages.
    fn existing_install(&self) {
        touch(&self.layout().venv_python());
        self.files().marker.write(DEFAULT_SIGNATURE).unwrap();
    }

    fn write_health(&self, hours_ago: i64) {
        KvRecord::new()
            .with("ok", "true")
            .with("signature", DEFAULT_SIGNATURE)
            .with(
                "interpreter",
                self.layout().venv_python().display().to_string(),
            )
            .with(
                "checked_at",
                format_timestamp(Utc::now() - chrono::Duration::hours(hours_ago)),
            )
            .save(&self.layout().health_file())
            .unwrap();
    }
}

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "").unwrap();
}

async fn ensure(b: &Bootstrapper) -> voxenv::BootstrapResult {
    b.ensure_ready(CancellationToken::new()).await
}

#[tokio::test]
async fn fresh_install_writes_marker_and_health() {
    let h = Harness::new();
    h.happy_path();

    let result = ensure(&h.bootstrapper()).await;
    assert!(result.is_ready(), "{}", result.message());
    assert_eq!(result.message(), "ok");
    assert_eq!(result.interpreter(), h.layout().venv_python().as_path());

    let files = h.files();
    assert_eq!(files.marker.read().as_deref(), Some(DEFAULT_SIGNATURE));
    assert!(files.health.load().unwrap().ok);
    assert!(files.failure.load().is_none());
    assert_eq!(h.sink.last().unwrap().0, ListenerState::Ready);
}

#[tokio::test]
async fn concurrent_callers_share_one_run() {
    let h = Harness::new();
    h.happy_path();
    h.runner.set_delay(Duration::from_millis(10));
    let b = h.bootstrapper();

    let runs: Vec<_> = (0..8).map(|_| b.ensure_ready(CancellationToken::new())).collect();
    let results = futures::future::join_all(runs).await;

    assert!(results.iter().all(|r| r == &results[0]));
    assert!(results[0].is_ready());
    assert_eq!(h.runner.count_matching("-m venv"), 1);
    assert_eq!(h.runner.count_matching("--no-deps"), 1);
    assert_eq!(h.runner.count_matching("version_info"), 1);
}

#[tokio::test]
async fn force_rebootstrap_starts_new_run() {
    let h = Harness::new();
    h.happy_path();
    let b = h.bootstrapper();

    assert!(ensure(&b).await.is_ready());
    let installs = h.runner.count_matching("pip install");

    let again = b.force_rebootstrap(CancellationToken::new()).await;
    assert!(again.is_ready());
    assert_eq!(h.runner.count_matching("version_info"), 2);
    // marker matches and health is fresh, so nothing is installed or probed
    assert_eq!(h.runner.count_matching("pip install"), installs);
    assert_eq!(h.runner.count_matching("pip show"), 0);
}

#[tokio::test]
async fn changed_packages_force_reinstall() {
    let h = Harness::new();
    h.base_version(11);
    h.installs_succeed();
    h.existing_install();
    h.write_health(1);

    let config = BootstrapConfig {
        packages: "funasr modelscope torch torchaudio onnxruntime".to_string(),
        ..h.config.clone()
    };
    let b = Bootstrapper::new(config, h.runner.clone(), h.sink.clone())
        .with_bundle_search_roots(Vec::new());

    let result = ensure(&b).await;
    assert!(result.is_ready(), "{}", result.message());
    assert_eq!(h.runner.count_matching("-m venv"), 0);
    assert!(h.runner.count_matching("pip install") > 0);
    assert_eq!(
        h.files().marker.read().as_deref(),
        Some("packages=funasr modelscope torch torchaudio onnxruntime")
    );
}

#[tokio::test]
async fn fresh_health_skips_probe() {
    let h = Harness::new();
    h.base_version(11);
    h.installs_succeed();
    h.existing_install();
    h.write_health(2);

    let result = ensure(&h.bootstrapper()).await;
    assert!(result.is_ready());
    assert_eq!(h.runner.count_matching("pip show"), 0);
    assert_eq!(h.runner.count_matching("pip install"), 0);
}

#[tokio::test]
async fn fresh_health_is_renewed_on_skip() {
    let h = Harness::new();
    h.base_version(11);
    h.installs_succeed();
    h.existing_install();
    h.write_health(70);

    let result = ensure(&h.bootstrapper()).await;
    assert!(result.is_ready());
    assert_eq!(h.runner.count_matching("pip show"), 0);

    let health = h.files().health.load().unwrap();
    assert!(health.ok);
    assert!(Utc::now().signed_duration_since(health.checked_at) < chrono::Duration::minutes(1));
}

#[tokio::test]
async fn expired_health_triggers_probe() {
    let h = Harness::new();
    h.base_version(11);
    h.installs_succeed();
    h.existing_install();
    h.write_health(100);

    let result = ensure(&h.bootstrapper()).await;
    assert!(result.is_ready());
    assert_eq!(h.runner.count_matching("pip show"), 1);
    assert_eq!(h.runner.count_matching("pip install"), 0);

    let health = h.files().health.load().unwrap();
    assert!(Utc::now().signed_duration_since(health.checked_at) < chrono::Duration::minutes(1));
}

#[tokio::test]
async fn broken_install_is_repaired() {
    let h = Harness::new();
    h.base_version(11);
    h.installs_succeed();
    h.runner
        .once("pip show", ProcessResult::failure(1, "", "WARNING: Package(s) not found: torch"));
    h.existing_install();

    let result = ensure(&h.bootstrapper()).await;
    assert!(result.is_ready(), "{}", result.message());
    assert_eq!(h.runner.count_matching("--upgrade funasr"), 1);
    assert_eq!(h.runner.count_matching("pip show"), 2);
    assert!(h
        .sink
        .events()
        .iter()
        .any(|(s, m)| *s == ListenerState::Installing && m.contains("repairing")));
}

#[tokio::test]
async fn failed_repair_is_reported() {
    let h = Harness::new();
    h.base_version(11);
    h.installs_succeed();
    h.runner.on("pip show", ProcessResult::failure(1, "", "not found"));
    h.runner
        .on("--upgrade funasr", ProcessResult::failure(1, "", "disk full"));
    h.existing_install();

    let result = ensure(&h.bootstrapper()).await;
    assert!(!result.is_ready());
    assert!(result.message().starts_with("pip-repair-failed: code=1"));
    assert!(result.message().contains("disk full"));
    assert_eq!(h.sink.last().unwrap().0, ListenerState::Unavailable);
}

#[tokio::test]
async fn probe_failing_after_repair_records_failure() {
    let h = Harness::new();
    h.base_version(11);
    h.installs_succeed();
    h.runner
        .on("pip show", ProcessResult::success("Name: funasr\n"));
    h.existing_install();

    let result = ensure(&h.bootstrapper()).await;
    assert_eq!(result.message(), "dependency-health-check-failed");
    assert_eq!(
        h.files().failure.load().unwrap().detail,
        "dependency-health-check-failed-after-repair"
    );
}

#[tokio::test]
async fn failed_install_starts_cooldown() {
    let h = Harness::new();
    h.base_version(11);
    h.creates_venv();
    h.runner
        .on("pip install", ProcessResult::failure(1, "", "network unreachable"));

    let first = ensure(&h.bootstrapper()).await;
    assert!(first.message().starts_with("pip-install-failed: code=1"));
    assert!(h.files().failure.load().is_some());

    h.runner.clear_calls();
    let second = ensure(&h.bootstrapper()).await;
    assert!(!second.is_ready());
    assert!(
        second
            .message()
            .starts_with("install-cooldown:retry-after-sec="),
        "{}",
        second.message()
    );
    assert!(second.message().contains(";detail=code=1"));
    assert_eq!(h.runner.count_matching("-m pip"), 0);
}

#[tokio::test]
async fn native_build_failure_bypasses_cooldown() {
    let h = Harness::new();
    h.happy_path();
    touch(&h.layout().venv_python());
    h.files().failure.record(
        DEFAULT_SIGNATURE,
        &h.layout().venv_python(),
        &format!("pip-install-failed: code=1, stderr={}", EDITDISTANCE_FAIL),
    );

    let result = ensure(&h.bootstrapper()).await;
    assert!(result.is_ready(), "{}", result.message());
    assert!(h.files().failure.load().is_none());
    assert!(h.runner.count_matching("pip install") > 0);
}

#[tokio::test]
async fn cooldown_holds_without_no_deps_strategy() {
    let mut h = Harness::new();
    h.config.use_no_deps_strategy = false;
    h.happy_path();
    touch(&h.layout().venv_python());
    h.files().failure.record(
        DEFAULT_SIGNATURE,
        &h.layout().venv_python(),
        "Failed building wheel for editdistance",
    );

    let result = ensure(&h.bootstrapper()).await;
    assert!(result.message().starts_with("install-cooldown:"));
    assert_eq!(h.runner.count_matching("pip install"), 0);
}

#[tokio::test]
async fn editdistance_failure_recovers_with_original_signature() {
    let h = Harness::new();
    h.base_version(11);
    h.creates_venv();
    h.runner.on("pip install", ProcessResult::success(""));
    h.runner.on(
        IMPORT_PROBE,
        ProcessResult::failure(1, "", "ModuleNotFoundError: No module named 'editdistance'"),
    );
    h.runner
        .once(STANDARD, ProcessResult::failure(1, "", EDITDISTANCE_FAIL));

    let result = ensure(&h.bootstrapper()).await;
    assert!(result.is_ready(), "{}", result.message());
    assert_eq!(h.runner.count_matching("editdistance==0.6.2"), 1);
    assert_eq!(h.runner.count_matching(STANDARD), 2);
    assert_eq!(
        fs::read_to_string(h.layout().install_marker()).unwrap().trim(),
        DEFAULT_SIGNATURE
    );
}

#[tokio::test]
async fn python_3_12_is_accepted() {
    let h = Harness::new();
    h.base_version(12);
    h.creates_venv();
    h.installs_succeed();

    assert!(ensure(&h.bootstrapper()).await.is_ready());
}

#[tokio::test]
async fn python_3_13_is_rejected() {
    let h = Harness::new();
    h.base_version(13);
    h.creates_venv();

    let result = ensure(&h.bootstrapper()).await;
    assert_eq!(result.message(), "python-version-unsupported:3.13");
    assert_eq!(result.interpreter(), Path::new(&h.config.python_exe));
    assert_eq!(h.runner.count_matching("-m venv"), 0);
    assert_eq!(h.sink.last().unwrap().0, ListenerState::Unavailable);
}

#[tokio::test]
async fn unsupported_version_uses_provisioned_interpreter() {
    let mut h = Harness::new();
    let conda = h.temp.path().join("conda");
    fs::write(&conda, "").unwrap();
    h.config.auto_provision_conda = true;
    h.config.conda_exe = Some(conda);

    let env_python = conda_python(&h.layout().conda_env_dir("3.11"));
    h.base_version(13);
    h.runner.on(
        "conda-py311",
        ProcessResult::success(format!("{}|3|11\n", env_python.display())),
    );
    let created = env_python.clone();
    h.runner
        .on_with("create -y -p", ProcessResult::success(""), move |_| {
            touch(&created);
        });
    h.creates_venv();
    h.installs_succeed();

    let result = ensure(&h.bootstrapper()).await;
    assert!(result.is_ready(), "{}", result.message());
    assert_eq!(h.runner.count_matching("python=3.11"), 1);

    let venv_call = h
        .runner
        .calls()
        .into_iter()
        .find(|c| c.command_line().contains("-m venv"))
        .unwrap();
    assert_eq!(PathBuf::from(&venv_call.program), env_python);
    assert!(h
        .sink
        .events()
        .iter()
        .any(|(s, m)| *s == ListenerState::Installing && m == "Preparing Python 3.11 runtime"));
}

#[tokio::test]
async fn missing_python_is_reported() {
    let mut h = Harness::new();
    h.config.python_exe = "python-that-does-not-exist".to_string();

    let result = ensure(&h.bootstrapper()).await;
    assert_eq!(result.message(), "python-not-found");
    assert_eq!(result.interpreter(), Path::new("python-that-does-not-exist"));
    // configured candidate, then python, then py
    assert_eq!(h.runner.count_matching("sys.executable)"), 3);
}

#[tokio::test]
async fn venv_failure_carries_stderr() {
    let h = Harness::new();
    h.base_version(11);
    h.runner.on(
        "-m venv",
        ProcessResult::failure(1, "", "Error: ensurepip is not available\n"),
    );

    let result = ensure(&h.bootstrapper()).await;
    assert_eq!(
        result.message(),
        "venv-create-failed: Error: ensurepip is not available"
    );
}

fn write_bundle(path: &Path) {
    let file = fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    let entry = if cfg!(windows) { "python.exe" } else { "bin/python" };
    zip.start_file(entry, options).unwrap();
    zip.write_all(b"#!/bin/sh\n").unwrap();
    zip.finish().unwrap();
}

#[tokio::test]
async fn prebuilt_bundle_short_circuits() {
    let mut h = Harness::new();
    let bundle = h.temp.path().join("runtime.zip");
    write_bundle(&bundle);
    h.config.prefer_prebuilt = true;
    h.config.bundle_path = bundle.display().to_string();

    let result = ensure(&h.bootstrapper()).await;
    assert!(result.is_ready(), "{}", result.message());
    assert_eq!(result.message(), format!("prebuilt:{}", bundle.display()));
    assert!(result.interpreter().starts_with(h.layout().prebuilt_dir()));
    assert!(h.runner.calls().is_empty());
    assert_eq!(h.sink.last().unwrap().0, ListenerState::Ready);
}

#[tokio::test]
async fn missing_bundle_without_fallback_is_not_ready() {
    let mut h = Harness::new();
    h.config.prefer_prebuilt = true;
    h.config.allow_online_fallback = false;
    h.config.bundle_path = "absent-bundle.zip".to_string();

    let result = ensure(&h.bootstrapper()).await;
    assert_eq!(result.message(), "prebuilt-runtime-not-ready:bundle-not-found");
    assert!(h.runner.calls().is_empty());
}

#[tokio::test]
async fn missing_bundle_with_fallback_installs_online() {
    let mut h = Harness::new();
    h.config.prefer_prebuilt = true;
    h.config.allow_online_fallback = true;
    h.config.bundle_path = "absent-bundle.zip".to_string();
    h.happy_path();

    let result = ensure(&h.bootstrapper()).await;
    assert!(result.is_ready(), "{}", result.message());
    assert_eq!(result.message(), "ok");
}
