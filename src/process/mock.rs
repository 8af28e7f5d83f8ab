//! Mock process runner for testing.
//!
//! `MockRunner` implements [`ProcessRunner`] without touching the operating
//! system. Responses are chosen by substring rules matched against the full
//! command line, and every invocation is recorded for later assertion.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use voxenv::process::{MockRunner, ProcessRequest, ProcessResult, ProcessRunner};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let runner = MockRunner::new();
//! runner.on("print(sys.executable)", ProcessResult::success("/usr/bin/python3\n"));
//!
//! let request = ProcessRequest::new("python", Duration::from_secs(5))
//!     .args(["-c", "import sys;print(sys.executable)"]);
//! let result = runner.run(&request, &CancellationToken::new()).await.unwrap();
//!
//! assert_eq!(result.last_stdout_line(), Some("/usr/bin/python3"));
//! assert_eq!(runner.count_matching("sys.executable"), 1);
//! # });
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::command::{ProcessRequest, ProcessResult, ProcessRunner};
use crate::error::{BootstrapError, Result};

/// Side effect run when a rule matches, before the result is returned.
pub type Effect = Arc<dyn Fn(&ProcessRequest) + Send + Sync>;

#[derive(Clone)]
enum Outcome {
    Result(ProcessResult),
    SpawnError,
}

#[derive(Clone)]
struct Rule {
    pattern: String,
    outcome: Outcome,
    effect: Option<Effect>,
    once: bool,
    used: bool,
}

#[derive(Default)]
struct State {
    rules: Vec<Rule>,
    calls: Vec<ProcessRequest>,
    delay: Option<Duration>,
}

/// Scripted process runner.
///
/// Rules registered later take precedence over earlier ones. A rule added
/// with [`MockRunner::once`] answers a single call and is then skipped.
/// Commands that match no rule fail with exit code 1.
#[derive(Default)]
pub struct MockRunner {
    state: Mutex<State>,
}

impl std::fmt::Debug for MockRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockRunner")
            .field("rules", &state.rules.len())
            .field("calls", &state.calls.len())
            .finish()
    }
}

impl MockRunner {
    /// Create a runner with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, pattern: &str, outcome: Outcome, effect: Option<Effect>, once: bool) {
        self.state.lock().rules.push(Rule {
            pattern: pattern.to_string(),
            outcome,
            effect,
            once,
            used: false,
        });
    }

    /// Answer every command containing `pattern` with `result`.
    pub fn on(&self, pattern: &str, result: ProcessResult) -> &Self {
        self.push(pattern, Outcome::Result(result), None, false);
        self
    }

    /// Answer the next command containing `pattern` with `result`.
    pub fn once(&self, pattern: &str, result: ProcessResult) -> &Self {
        self.push(pattern, Outcome::Result(result), None, true);
        self
    }

    /// Like [`MockRunner::on`], also running `effect` for each match.
    ///
    /// Useful for commands with filesystem side effects, such as creating
    /// the interpreter of a new virtual environment.
    pub fn on_with<F>(&self, pattern: &str, result: ProcessResult, effect: F) -> &Self
    where
        F: Fn(&ProcessRequest) + Send + Sync + 'static,
    {
        self.push(pattern, Outcome::Result(result), Some(Arc::new(effect)), false);
        self
    }

    /// Fail to start any command containing `pattern`.
    pub fn fail_spawn(&self, pattern: &str) -> &Self {
        self.push(pattern, Outcome::SpawnError, None, false);
        self
    }

    /// Delay every response, honoring cancellation while waiting.
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().delay = Some(delay);
    }

    /// All recorded invocations, in call order.
    pub fn calls(&self) -> Vec<ProcessRequest> {
        self.state.lock().calls.clone()
    }

    /// Recorded command lines, in call order.
    pub fn command_lines(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .map(ProcessRequest::command_line)
            .collect()
    }

    /// Number of recorded invocations whose command line contains `pattern`.
    pub fn count_matching(&self, pattern: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.command_line().contains(pattern))
            .count()
    }

    /// Forget recorded invocations, keeping the rules.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    fn answer(&self, request: &ProcessRequest) -> (Option<Duration>, Option<(Outcome, Option<Effect>)>) {
        let line = request.command_line();
        let mut state = self.state.lock();
        state.calls.push(request.clone());
        let delay = state.delay;
        let matched = state
            .rules
            .iter_mut()
            .rev()
            .filter(|r| !(r.once && r.used))
            .find(|r| line.contains(&r.pattern))
            .map(|rule| {
                rule.used = true;
                (rule.outcome.clone(), rule.effect.clone())
            });
        (delay, matched)
    }
}

#[async_trait]
impl ProcessRunner for MockRunner {
    async fn run(
        &self,
        request: &ProcessRequest,
        cancel: &CancellationToken,
    ) -> Result<ProcessResult> {
        if cancel.is_cancelled() {
            return Err(BootstrapError::Cancelled);
        }
        let (delay, matched) = self.answer(request);

        if let Some(delay) = delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Err(BootstrapError::Cancelled),
            }
        }

        match matched {
            Some((Outcome::Result(result), effect)) => {
                if let Some(effect) = effect {
                    effect(request);
                }
                Ok(result)
            }
            Some((Outcome::SpawnError, _)) => Err(BootstrapError::Spawn {
                program: request.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "program not found"),
            }),
            None => Ok(ProcessResult::failure(
                1,
                String::new(),
                format!("no mock rule for: {}", request.command_line()),
            )),
        }
    }
}
