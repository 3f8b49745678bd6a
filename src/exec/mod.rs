//! Process execution boundary.
//!
//! Everything the tool learns about clusters comes from running external
//! programs: the cluster CLI for listings and forwarded commands, and the
//! picker for interactive choices. [`CommandExecutor`] is the single seam
//! for both, so tests swap in one substitute for the whole outside world.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Process execution errors.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to execute {program}: {error}")]
    Spawn {
        program: String,
        error: std::io::Error,
    },

    #[error("{program} exited with {status}{}", stderr_suffix(.stderr))]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {}", stderr)
    }
}

/// Captured result of a command run with separate output streams.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: Vec::new(),
            success: true,
            code: Some(0),
        }
    }

    pub fn failure(code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: stderr.into(),
            success: false,
            code: Some(code),
        }
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Short description of how the process ended, e.g. `exit status 1`.
    pub fn status_description(&self) -> String {
        match self.code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        }
    }

    fn from_std(output: std::process::Output) -> Self {
        Self {
            success: output.status.success(),
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Runs external programs on behalf of the selector and the fan-out runner.
///
/// Implementations must not interpret program output.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run a program and return its stdout, optionally feeding `stdin`.
    ///
    /// A non-zero exit is an error carrying the captured stderr.
    async fn output(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<&str>,
    ) -> Result<Vec<u8>, ExecError>;

    /// Run a program capturing stdout and stderr separately.
    ///
    /// A non-zero exit is reported through [`CommandOutput::success`], not as
    /// an error. Only a failure to start the program is an `Err`.
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, ExecError>;
}

/// [`CommandExecutor`] backed by real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }

    async fn spawn_and_wait(
        program: &str,
        args: &[String],
        stdin: Option<&str>,
    ) -> Result<std::process::Output, ExecError> {
        let spawn_err = |error| ExecError::Spawn {
            program: program.to_string(),
            error,
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        tracing::debug!(program, ?args, "spawning");
        let mut child = cmd.spawn().map_err(spawn_err)?;

        if let Some(input) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input.as_bytes()).await.map_err(spawn_err)?;
                // Dropping the handle closes the pipe so the child sees EOF.
                drop(pipe);
            }
        }

        child.wait_with_output().await.map_err(spawn_err)
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn output(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<&str>,
    ) -> Result<Vec<u8>, ExecError> {
        let output = CommandOutput::from_std(Self::spawn_and_wait(program, args, stdin).await?);
        if output.success {
            Ok(output.stdout)
        } else {
            Err(ExecError::Failed {
                program: program.to_string(),
                status: output.status_description(),
                stderr: output.stderr_lossy().trim().to_string(),
            })
        }
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, ExecError> {
        Self::spawn_and_wait(program, args, None)
            .await
            .map(CommandOutput::from_std)
    }
}

/// Resolve a program name the way a shell would, using `PATH`.
///
/// Names containing a path separator are checked as given.
pub fn find_on_path(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|full| is_executable(full))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}
