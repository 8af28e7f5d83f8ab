//! Interpreter discovery and version probing.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::PROBE_TIMEOUT;
use crate::error::Result;
use crate::process::{Exec, ProcessRequest};

/// The only major version the runtime supports.
pub const SUPPORTED_MAJOR: u32 = 3;

/// Generic commands tried after the configured one.
pub const FALLBACK_COMMANDS: &[&str] = &["python", "py"];

const EXECUTABLE_SCRIPT: &str = "import sys;print(sys.executable)";
const VERSION_SCRIPT: &str =
    "import sys;print(f'{sys.executable}|{sys.version_info[0]}|{sys.version_info[1]}')";

/// Version reported by an interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterpreterVersion {
    /// Executable path as reported by the interpreter itself.
    pub executable: PathBuf,
    pub major: u32,
    pub minor: u32,
}

impl InterpreterVersion {
    /// Parse an `executable|major|minor` line.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.trim().split('|');
        let executable = parts.next()?.trim();
        let major = parts.next()?.trim().parse().ok()?;
        let minor = parts.next()?.trim().parse().ok()?;
        Some(Self {
            executable: PathBuf::from(executable),
            major,
            minor,
        })
    }

    /// Major must be [`SUPPORTED_MAJOR`] and minor at most `max_minor`.
    pub fn is_supported(&self, max_minor: u32) -> bool {
        self.major == SUPPORTED_MAJOR && self.minor <= max_minor
    }
}

impl fmt::Display for InterpreterVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Whether an optional probed version passes the gate.
pub fn version_supported(version: Option<&InterpreterVersion>, max_minor: u32) -> bool {
    version.is_some_and(|v| v.is_supported(max_minor))
}

/// Ordered, de-duplicated candidate commands.
pub fn candidates(configured: &str) -> Vec<String> {
    let mut list: Vec<String> = Vec::new();
    for candidate in std::iter::once(configured).chain(FALLBACK_COMMANDS.iter().copied()) {
        let candidate = candidate.trim();
        if candidate.is_empty() || list.iter().any(|c| c.eq_ignore_ascii_case(candidate)) {
            continue;
        }
        list.push(candidate.to_string());
    }
    list
}

fn script_request(program: &str, script: &str) -> ProcessRequest {
    let request = ProcessRequest::new(program, PROBE_TIMEOUT);
    let request = if program.eq_ignore_ascii_case("py") {
        request.arg("-3")
    } else {
        request
    };
    request.args(["-c", script])
}

/// Resolve a single candidate to an existing interpreter path.
pub async fn resolve_candidate(exec: &Exec<'_>, candidate: &str) -> Result<Option<PathBuf>> {
    let direct = Path::new(candidate);
    if direct.is_absolute() && direct.is_file() {
        return Ok(Some(direct.to_path_buf()));
    }

    let result = exec.run(script_request(candidate, EXECUTABLE_SCRIPT)).await?;
    if !result.is_success() {
        tracing::debug!(candidate, code = result.exit_code, "interpreter candidate failed");
        return Ok(None);
    }

    Ok(result
        .last_stdout_line()
        .map(PathBuf::from)
        .filter(|p| p.is_file()))
}

/// Find the first working interpreter among the candidates.
pub async fn resolve(exec: &Exec<'_>, configured: &str) -> Result<Option<PathBuf>> {
    for candidate in candidates(configured) {
        if let Some(path) = resolve_candidate(exec, &candidate).await? {
            tracing::info!(candidate = %candidate, path = %path.display(), "resolved interpreter");
            return Ok(Some(path));
        }
    }
    Ok(None)
}

/// Ask an interpreter for its version.
pub async fn probe_version(
    exec: &Exec<'_>,
    interpreter: &Path,
) -> Result<Option<InterpreterVersion>> {
    let program = interpreter.to_string_lossy();
    let result = exec.run(script_request(&program, VERSION_SCRIPT)).await?;
    if !result.is_success() {
        tracing::debug!(interpreter = %program, summary = %result.summary(), "version probe failed");
        return Ok(None);
    }
    Ok(result.last_stdout_line().and_then(InterpreterVersion::parse))
}
