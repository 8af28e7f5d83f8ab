//! External process execution.
//!
//! [`ProcessRunner`] is the seam between the bootstrapper and the operating
//! system. The production implementation, [`TokioProcessRunner`], streams
//! stdout/stderr incrementally, enforces a per-invocation timeout, and kills
//! the child promptly when the caller cancels.

use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::progress::ProgressThrottle;
use crate::error::{BootstrapError, Result};

/// Exit code reported when a process was killed on timeout, terminated by
/// a signal, or could not be started.
pub const FAILURE_EXIT_CODE: i32 = -1;

/// No invocation waits less than this, whatever the request says.
pub const MIN_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for output readers after the child exits.
const READER_GRACE: Duration = Duration::from_secs(2);

/// Length limit for arguments in log lines.
const LOG_ARGS_LIMIT: usize = 220;

/// A single program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    /// Program name or path.
    pub program: String,
    /// Arguments, passed verbatim (no shell).
    pub args: Vec<String>,
    /// Time limit for the whole invocation.
    pub timeout: Duration,
    /// Log notable installer output lines while running.
    pub log_progress: bool,
}

impl ProcessRequest {
    /// Create a request with no arguments.
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
            log_progress: false,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Enable throttled progress logging of the output.
    pub fn with_progress(mut self) -> Self {
        self.log_progress = true;
        self
    }

    /// Program and arguments joined by spaces.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Outcome of a process invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessResult {
    /// Exit code, or [`FAILURE_EXIT_CODE`].
    pub exit_code: i32,
    /// Standard output collected so far.
    pub stdout: String,
    /// Standard error collected so far.
    pub stderr: String,
    /// Whether the process was killed on timeout.
    pub timed_out: bool,
}

impl ProcessResult {
    /// Create a successful result with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    /// Create a failed result.
    pub fn failure(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            timed_out: false,
        }
    }

    /// Create a timeout result, preserving partial output.
    pub fn timeout(stdout: String, stderr: String) -> Self {
        let stderr = if stderr.trim().is_empty() {
            "timeout".to_string()
        } else {
            stderr
        };
        Self {
            exit_code: FAILURE_EXIT_CODE,
            stdout,
            stderr,
            timed_out: true,
        }
    }

    /// Whether the process exited with code 0.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// The last non-empty line of stdout, trimmed.
    pub fn last_stdout_line(&self) -> Option<&str> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
    }

    /// Stderr followed by stdout, for marker matching.
    pub fn combined_output(&self) -> String {
        format!("{}\n{}", self.stderr, self.stdout)
    }

    /// Bounded one-line summary for diagnostics and the failure cache.
    pub fn summary(&self) -> String {
        format!(
            "code={}, stderr={}, stdout={}",
            self.exit_code,
            truncate_chars(self.stderr.trim(), 180),
            truncate_chars(self.stdout.trim(), 180)
        )
    }
}

/// Truncate to `limit` characters, appending "..." when cut.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(limit).collect();
    cut.push_str("...");
    cut
}

/// Arguments joined on one line and truncated for logging.
pub fn compact_args(args: &[String]) -> String {
    let joined = args.join(" ").replace(['\r', '\n'], " ");
    truncate_chars(joined.trim(), LOG_ARGS_LIMIT)
}

/// Port for running external programs.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run a program to completion, timeout, or cancellation.
    ///
    /// Returns `Err(Cancelled)` when `cancel` fires and `Err(Spawn)` when
    /// the program cannot be started. Timeouts are reported as a result
    /// with [`FAILURE_EXIT_CODE`] and `timed_out` set.
    async fn run(
        &self,
        request: &ProcessRequest,
        cancel: &CancellationToken,
    ) -> Result<ProcessResult>;
}

/// Production runner backed by `tokio::process`.
#[derive(Debug, Default)]
pub struct TokioProcessRunner {
    throttle: Arc<ProgressThrottle>,
}

impl TokioProcessRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self::default()
    }
}

enum Waited {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        request: &ProcessRequest,
        cancel: &CancellationToken,
    ) -> Result<ProcessResult> {
        if cancel.is_cancelled() {
            return Err(BootstrapError::Cancelled);
        }

        let started = Instant::now();
        let timeout = request.timeout.max(MIN_TIMEOUT);
        tracing::info!(
            program = %request.program,
            args = %compact_args(&request.args),
            timeout_sec = timeout.as_secs(),
            "process start"
        );

        let mut child = Command::new(&request.program)
            .args(&request.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BootstrapError::Spawn {
                program: request.program.clone(),
                source,
            })?;

        let throttle = request.log_progress.then(|| Arc::clone(&self.throttle));
        let stdout = Arc::new(Mutex::new(String::new()));
        let stderr = Arc::new(Mutex::new(String::new()));
        let mut readers: Vec<JoinHandle<()>> = Vec::new();
        if let Some(pipe) = child.stdout.take() {
            readers.push(tokio::spawn(pump(pipe, Arc::clone(&stdout), throttle.clone())));
        }
        if let Some(pipe) = child.stderr.take() {
            readers.push(tokio::spawn(pump(pipe, Arc::clone(&stderr), throttle)));
        }

        let waited = tokio::select! {
            status = child.wait() => Waited::Exited(status),
            _ = tokio::time::sleep(timeout) => Waited::TimedOut,
            _ = cancel.cancelled() => Waited::Cancelled,
        };

        let elapsed_sec = started.elapsed().as_secs_f64();
        match waited {
            Waited::Exited(status) => {
                let status = status?;
                drain(readers).await;
                let exit_code = status.code().unwrap_or(FAILURE_EXIT_CODE);
                tracing::info!(
                    program = %request.program,
                    code = exit_code,
                    elapsed_sec,
                    args = %compact_args(&request.args),
                    "process end"
                );
                Ok(ProcessResult {
                    exit_code,
                    stdout: stdout.lock().clone(),
                    stderr: stderr.lock().clone(),
                    timed_out: false,
                })
            }
            Waited::TimedOut => {
                kill(&mut child).await;
                abort(readers);
                tracing::warn!(
                    program = %request.program,
                    elapsed_sec,
                    args = %compact_args(&request.args),
                    "process timeout"
                );
                Ok(ProcessResult::timeout(
                    stdout.lock().clone(),
                    stderr.lock().clone(),
                ))
            }
            Waited::Cancelled => {
                kill(&mut child).await;
                abort(readers);
                tracing::info!(program = %request.program, elapsed_sec, "process cancelled");
                Err(BootstrapError::Cancelled)
            }
        }
    }
}

async fn pump<R>(reader: R, sink: Arc<Mutex<String>>, throttle: Option<Arc<ProgressThrottle>>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\r', '\n']);
                {
                    let mut out = sink.lock();
                    out.push_str(line);
                    out.push('\n');
                }
                if let Some(throttle) = &throttle {
                    throttle.observe(line);
                }
            }
        }
    }
}

/// Give readers a short grace period to hit EOF. A grandchild holding the
/// pipe open must not stall the caller.
async fn drain(readers: Vec<JoinHandle<()>>) {
    for mut handle in readers {
        if tokio::time::timeout(READER_GRACE, &mut handle).await.is_err() {
            handle.abort();
        }
    }
}

fn abort(readers: Vec<JoinHandle<()>>) {
    for handle in readers {
        handle.abort();
    }
}

async fn kill(child: &mut tokio::process::Child) {
    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "failed to kill child process");
    }
}

/// Runner handle bound to one cancellation token.
///
/// Converts spawn failures into failed results so a missing program is an
/// ordinary step failure, while cancellation still propagates with `?`.
#[derive(Clone, Copy)]
pub struct Exec<'a> {
    runner: &'a dyn ProcessRunner,
    cancel: &'a CancellationToken,
}

impl<'a> Exec<'a> {
    /// Bind a runner to a cancellation token.
    pub fn new(runner: &'a dyn ProcessRunner, cancel: &'a CancellationToken) -> Self {
        Self { runner, cancel }
    }

    /// Run a request.
    pub async fn run(&self, request: ProcessRequest) -> Result<ProcessResult> {
        match self.runner.run(&request, self.cancel).await {
            Err(BootstrapError::Spawn { program, source }) => {
                tracing::warn!(%program, error = %source, "process could not be started");
                Ok(ProcessResult::failure(
                    FAILURE_EXIT_CODE,
                    String::new(),
                    format!("failed to start '{}': {}", program, source),
                ))
            }
            other => other,
        }
    }
}
