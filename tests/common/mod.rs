//! Shared test double standing in for both kubectl and the picker.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use kubectl_ball::exec::{CommandExecutor, CommandOutput, ExecError};

enum Canned {
    Output(CommandOutput),
    SpawnError(String),
}

/// Records every call as `"<program> <args...>"` and answers from a table.
///
/// Unknown calls succeed with empty output.
#[derive(Default)]
pub struct MockExecutor {
    responses: Mutex<HashMap<String, Canned>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<String>>,
    stdin: Mutex<Vec<String>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, key: &str, stdout: &str) -> Self {
        self.insert(key, Canned::Output(CommandOutput::success(stdout)));
        self
    }

    pub fn fail(self, key: &str, code: i32, stderr: &str) -> Self {
        self.insert(key, Canned::Output(CommandOutput::failure(code, stderr)));
        self
    }

    pub fn spawn_error(self, key: &str, message: &str) -> Self {
        self.insert(key, Canned::SpawnError(message.to_string()));
        self
    }

    pub fn delay(self, key: &str, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(key.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    /// Input fed to the picker, in call order.
    pub fn stdin(&self) -> Vec<String> {
        self.stdin.lock().unwrap().clone()
    }

    fn insert(&self, key: &str, canned: Canned) {
        self.responses.lock().unwrap().insert(key.to_string(), canned);
    }

    async fn respond(&self, program: &str, args: &[String]) -> Result<CommandOutput, ExecError> {
        let key = std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.lock().unwrap().push(key.clone());

        let delay = self.delays.lock().unwrap().get(&key).copied();
        let response = match self.responses.lock().unwrap().get(&key) {
            Some(Canned::Output(out)) => Ok(out.clone()),
            Some(Canned::SpawnError(msg)) => Err(ExecError::Spawn {
                program: program.to_string(),
                error: std::io::Error::new(std::io::ErrorKind::NotFound, msg.clone()),
            }),
            None => Ok(CommandOutput::success("")),
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        response
    }
}

#[async_trait]
impl CommandExecutor for MockExecutor {
    async fn output(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<&str>,
    ) -> Result<Vec<u8>, ExecError> {
        if let Some(input) = stdin {
            self.stdin.lock().unwrap().push(input.to_string());
        }
        let out = self.respond(program, args).await?;
        if out.success {
            Ok(out.stdout)
        } else {
            Err(ExecError::Failed {
                program: program.to_string(),
                status: out.status_description(),
                stderr: out.stderr_lossy().trim().to_string(),
            })
        }
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, ExecError> {
        self.respond(program, args).await
    }
}

/// Create an executable stand-in for the picker so the `PATH` check passes.
#[cfg(unix)]
pub fn fake_picker(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("fzf");
    std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
