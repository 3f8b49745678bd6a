//! Concurrent execution of one command against every selected context.
//!
//! Each context gets its own tokio task. The command runs fully in parallel,
//! and the shared [`Report`] is locked only to append a finished section, so
//! sections appear in completion order.
//!
//! # Limitations
//!
//! There is no per-command timeout and no cancellation. [`FanoutRunner::run`]
//! waits for every worker, so one hung `kubectl` call hangs the whole
//! invocation.

use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;

use crate::exec::CommandExecutor;

/// Output formats accepted by `--format`, forwarded as `-o <format>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
    Wide,
    Table,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Wide => "wide",
            Self::Table => "table",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to run in each context.
#[derive(Debug, Clone, Default)]
pub struct FanoutRequest {
    pub args: Vec<String>,
    pub namespace: Option<String>,
    pub grep: Option<String>,
    pub format: Option<OutputFormat>,
}

impl FanoutRequest {
    /// Full argument list for the cluster CLI in `context`.
    pub fn command_line(&self, context: &str) -> Vec<String> {
        let mut cmd = vec!["--context".to_string(), context.to_string()];
        cmd.extend(self.args.iter().cloned());
        if let Some(ns) = self.namespace.as_deref().filter(|ns| !ns.is_empty()) {
            cmd.push("-n".to_string());
            cmd.push(ns.to_string());
        }
        if let Some(format) = self.format {
            cmd.push("-o".to_string());
            cmd.push(format.to_string());
        }
        cmd
    }
}

/// Outcome of running the command in one context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub context: String,
    pub output: String,
    pub stderr: String,
    /// Failure description, `None` when the command succeeded.
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Keep only lines containing `pattern`. Returns `None` when nothing matches.
    pub fn filtered(mut self, pattern: &str) -> Option<Self> {
        let kept: Vec<&str> = self
            .output
            .split('\n')
            .filter(|line| line.contains(pattern))
            .collect();
        if kept.is_empty() {
            return None;
        }
        self.output = kept.join("\n");
        Some(self)
    }

    fn render_into(&self, out: &mut String) {
        out.push_str(&format!("\n===== [{}] =====\n", self.context));
        match &self.error {
            Some(error) => out.push_str(&format!("Error: {}\n{}\n", error, self.stderr)),
            None => {
                out.push_str(&self.output);
                out.push('\n');
            }
        }
    }
}

/// Labeled per-context sections in the order workers finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    sections: Vec<ExecutionResult>,
}

impl Report {
    pub fn push(&mut self, result: ExecutionResult) {
        self.sections.push(result);
    }

    pub fn sections(&self) -> &[ExecutionResult] {
        &self.sections
    }

    pub fn section(&self, context: &str) -> Option<&ExecutionResult> {
        self.sections.iter().find(|s| s.context == context)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            section.render_into(&mut out);
        }
        out
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

pub struct FanoutRunner<E: ?Sized> {
    executor: Arc<E>,
    program: String,
}

impl<E: CommandExecutor + ?Sized + 'static> FanoutRunner<E> {
    pub fn new(executor: Arc<E>, program: impl Into<String>) -> Self {
        Self {
            executor,
            program: program.into(),
        }
    }

    /// Run `request` in every context and wait for all of them.
    pub async fn run(&self, contexts: &[String], request: &FanoutRequest) -> Report {
        let report = Arc::new(Mutex::new(Report::default()));
        let request = Arc::new(request.clone());
        let mut workers = JoinSet::new();

        tracing::info!(count = contexts.len(), "dispatching");
        for context in contexts {
            let executor = Arc::clone(&self.executor);
            let program = self.program.clone();
            let request = Arc::clone(&request);
            let report = Arc::clone(&report);
            let context = context.clone();

            workers.spawn(async move {
                let result = execute(executor.as_ref(), &program, &context, &request).await;
                let Some(result) = result else {
                    tracing::debug!(%context, "no matching lines, skipped");
                    return;
                };
                tracing::debug!(%context, ok = result.error.is_none(), "finished");
                report
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push(result);
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("worker failed: {}", e);
            }
        }

        let mut guard = report.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *guard)
    }
}

/// Run the request in one context, applying the grep filter.
async fn execute<E: CommandExecutor + ?Sized>(
    executor: &E,
    program: &str,
    context: &str,
    request: &FanoutRequest,
) -> Option<ExecutionResult> {
    let args = request.command_line(context);
    let result = match executor.run(program, &args).await {
        Ok(output) => ExecutionResult {
            context: context.to_string(),
            output: output.stdout_lossy(),
            stderr: output.stderr_lossy(),
            error: (!output.success).then(|| output.status_description()),
        },
        Err(e) => ExecutionResult {
            context: context.to_string(),
            output: String::new(),
            stderr: String::new(),
            error: Some(e.to_string()),
        },
    };

    match request.grep.as_deref() {
        Some(pattern) if !pattern.is_empty() => result.filtered(pattern),
        _ => Some(result),
    }
}
