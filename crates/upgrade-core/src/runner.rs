//! Execution backends for upgrade actions.
//!
//! The engine only needs one capability: hand an action to a runner and learn
//! whether it succeeded. Runners are subprocess based and share the same
//! stdin-fed invocation style:
//!
//! - `SCRIPT`:  pipes the action body into an interpreter (`sh` by default).
//! - `CONSOLE`: speaks a JSON request/response protocol with a console
//!   program, `{script, scriptPath, data}` in and
//!   `{output, exceptionStackTrace, runningTime}` out.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

use crate::error::{Result, UpgradeError};
use crate::types::Phase;

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// Everything a runner gets to see about one action.
#[derive(Debug, Clone, Copy)]
pub struct RunRequest<'a> {
    pub name: &'a str,
    pub phase: Phase,
    pub content: &'a [u8],
    pub data: Option<&'a str>,
    pub source: Option<&'a Path>,
    pub workdir: Option<&'a Path>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunResponse {
    pub output: String,
    /// Any non-blank value marks the run as failed.
    pub error_detail: Option<String>,
    pub duration_ms: u64,
}

impl RunResponse {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }

    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            error_detail: Some(detail.into()),
            ..Self::default()
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error_detail
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty())
    }
}

/// Capability to execute one action. Implementations block until the action
/// has fully returned; there is no timeout or cancellation at this level.
pub trait ActionRunner: fmt::Debug + Send + Sync {
    /// Handler tag this runner was registered under.
    fn kind(&self) -> &str;

    /// Run the action. `Err` means the runner itself could not operate;
    /// a failed action is reported through [`RunResponse::error_detail`].
    fn run(&self, request: &RunRequest<'_>) -> Result<RunResponse>;
}

// ---------------------------------------------------------------------------
// ScriptRunner
// ---------------------------------------------------------------------------

pub const DEFAULT_INTERPRETER: &str = "sh";

#[derive(Debug, Clone)]
pub struct ScriptRunner {
    program: PathBuf,
    args: Vec<String>,
}

impl ScriptRunner {
    /// `interpreter` is a program plus optional arguments, e.g. `"bash -e"`.
    /// The program must be found on `PATH`.
    pub fn new(interpreter: &str) -> Result<Self> {
        let (program, args) = resolve_command(interpreter)?;
        Ok(Self { program, args })
    }
}

impl ActionRunner for ScriptRunner {
    fn kind(&self) -> &str {
        "SCRIPT"
    }

    fn run(&self, request: &RunRequest<'_>) -> Result<RunResponse> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env("UPGRADE_ACTION", request.name)
            .env("UPGRADE_PHASE", request.phase.as_str())
            .env("UPGRADE_DATA", request.data.unwrap_or(""));
        if let Some(dir) = request.workdir {
            cmd.current_dir(dir);
        }

        let start = Instant::now();
        let output = spawn_with_stdin(&mut cmd, request.content)?;
        let duration_ms = start.elapsed().as_millis() as u64;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let error_detail = if output.status.success() {
            None
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Some(if stderr.is_empty() {
                match output.status.code() {
                    Some(code) => format!("exited with code {code}"),
                    None => "terminated by signal".to_string(),
                }
            } else {
                stderr
            })
        };

        Ok(RunResponse {
            output: stdout,
            error_detail,
            duration_ms,
        })
    }
}

// ---------------------------------------------------------------------------
// ConsoleRunner
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConsoleRequest<'a> {
    script: String,
    script_path: String,
    data: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConsoleResponse {
    #[serde(default)]
    output: String,
    #[serde(default)]
    exception_stack_trace: Option<String>,
    #[serde(default)]
    running_time: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConsoleRunner {
    program: PathBuf,
    args: Vec<String>,
}

impl ConsoleRunner {
    /// `console` is the console program plus optional arguments.
    pub fn new(console: &str) -> Result<Self> {
        let (program, args) = resolve_command(console)?;
        Ok(Self { program, args })
    }
}

impl ActionRunner for ConsoleRunner {
    fn kind(&self) -> &str {
        "CONSOLE"
    }

    fn run(&self, request: &RunRequest<'_>) -> Result<RunResponse> {
        let payload = ConsoleRequest {
            script: String::from_utf8_lossy(request.content).into_owned(),
            script_path: request
                .source
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| request.name.to_string()),
            data: request.data.unwrap_or(""),
        };
        let json = serde_json::to_vec(&payload)?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = request.workdir {
            cmd.current_dir(dir);
        }

        let start = Instant::now();
        let output = spawn_with_stdin(&mut cmd, &json)?;
        let duration_ms = start.elapsed().as_millis() as u64;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Ok(RunResponse {
                output: String::new(),
                error_detail: Some(if stderr.is_empty() {
                    "console returned no response".to_string()
                } else {
                    stderr
                }),
                duration_ms,
            });
        }

        let response: ConsoleResponse = serde_json::from_str(&stdout).map_err(|e| {
            UpgradeError::RunnerSpawnFailed(format!("malformed console response: {e}"))
        })?;
        tracing::debug!(
            action = request.name,
            running_time = response.running_time.as_deref().unwrap_or("-"),
            "console finished"
        );

        Ok(RunResponse {
            output: response.output,
            error_detail: response.exception_stack_trace,
            duration_ms,
        })
    }
}

/// Split `"prog arg..."` and locate `prog` on `PATH`.
fn resolve_command(command: &str) -> Result<(PathBuf, Vec<String>)> {
    let mut parts = command.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| UpgradeError::InterpreterNotFound(command.to_string()))?;
    let program = which::which(program)
        .map_err(|_| UpgradeError::InterpreterNotFound(program.to_string()))?;
    Ok((program, parts.map(str::to_string).collect()))
}

/// Spawn `cmd`, feed `input` on stdin from a scoped thread while stdout and
/// stderr are drained, and always reap the child.
fn spawn_with_stdin(cmd: &mut Command, input: &[u8]) -> Result<std::process::Output> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| UpgradeError::RunnerSpawnFailed(e.to_string()))?;
    let stdin = child.stdin.take();

    let (output, written) = std::thread::scope(|scope| {
        let writer = scope.spawn(move || match stdin {
            // Dropping stdin at the end of the closure closes the pipe.
            Some(mut stdin) => stdin.write_all(input),
            None => Ok(()),
        });
        let output = child.wait_with_output();
        (output, writer.join())
    });

    let output = output.map_err(|e| UpgradeError::RunnerSpawnFailed(e.to_string()))?;
    match written {
        Ok(Ok(())) => {}
        // The child exited without reading all of its input; its exit status
        // says whether that was a failure.
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
        Ok(Err(e)) => {
            return Err(UpgradeError::RunnerSpawnFailed(format!(
                "failed to write stdin: {e}"
            )))
        }
        Err(_) => {
            return Err(UpgradeError::RunnerSpawnFailed(
                "stdin writer panicked".to_string(),
            ))
        }
    }
    Ok(output)
}
