//! Command-line surface and top-level flow.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;

use crate::config::{Config, ConfigStore, Tools};
use crate::exec::CommandExecutor;
use crate::fanout::{FanoutRequest, FanoutRunner, OutputFormat, Report};
use crate::select::{ContextSource, SelectError, Selector};

/// Flags picked out of the argument list wherever they appear, and whether
/// each takes a value. Everything else is forwarded to kubectl.
const ANYWHERE_FLAGS: &[(&str, bool)] = &[
    ("--select", false),
    ("--select-namespace", false),
    ("--merge-kubeconfigs", false),
    ("--grep", true),
    ("--format", true),
    ("-n", true),
    ("--namespace", true),
    ("--config", true),
];

/// Flags only honoured before the command, since kubectl has its own `-v`.
const LEADING_FLAGS: &[&str] = &["-v", "--verbose", "-h", "--help"];

pub const USAGE: &str = "Usage: kubectl ball [--select] [--select-namespace] [--merge-kubeconfigs] [--grep pattern] [--format json|yaml|wide|table] [-n ns] <kubectl args>";

#[derive(Debug, Parser)]
#[command(name = "kubectl-ball")]
#[command(about = "Run a kubectl command across several cluster contexts at once")]
#[command(override_usage = "kubectl ball [OPTIONS] [KUBECTL_ARGS]...")]
pub struct Cli {
    /// Interactively (re)select the target clusters and save them
    #[arg(long)]
    pub select: bool,

    /// Interactively (re)select the namespace and save it
    #[arg(long)]
    pub select_namespace: bool,

    /// List contexts from the flattened, merged kubeconfig when selecting
    #[arg(long)]
    pub merge_kubeconfigs: bool,

    /// Only show output lines containing this text
    #[arg(long, value_name = "PATTERN")]
    pub grep: Option<String>,

    /// Output format forwarded to kubectl as `-o`
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Set the namespace for this and future runs
    #[arg(short = 'n', long)]
    pub namespace: Option<String>,

    /// Config file location (defaults to ~/.kubectl-ball/config.yaml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to run in every selected context
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "KUBECTL_ARGS")]
    pub command: Vec<String>,
}

impl Cli {
    /// Parse process arguments, accepting the tool's flags before, after or
    /// between the forwarded kubectl arguments. A literal `--` ends flag
    /// recognition.
    pub fn parse_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::try_parse_from(hoist_flags(args))
    }

    fn context_source(&self) -> ContextSource {
        if self.merge_kubeconfigs {
            ContextSource::Merged
        } else {
            ContextSource::Local
        }
    }
}

/// Reorder `args` so recognised flags precede a `--` and the forwarded
/// command follows it untouched.
fn hoist_flags<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut args = args.into_iter().map(Into::into);
    let mut flags: Vec<OsString> = args.next().into_iter().collect();
    let mut forwarded = Vec::new();

    while let Some(arg) = args.next() {
        let text = arg.to_string_lossy().into_owned();
        if text == "--" {
            forwarded.extend(args.by_ref());
            break;
        }

        if let Some(&(_, takes_value)) = ANYWHERE_FLAGS.iter().find(|(name, _)| *name == text) {
            flags.push(arg);
            if takes_value {
                flags.extend(args.next());
            }
        } else if is_inline_value(&text) {
            flags.push(arg);
        } else if forwarded.is_empty() && LEADING_FLAGS.contains(&text.as_str()) {
            flags.push(arg);
        } else {
            forwarded.push(arg);
        }
    }

    if !forwarded.is_empty() {
        flags.push(OsString::from("--"));
        flags.extend(forwarded);
    }
    flags
}

/// `--grep=web` style spelling of a value-taking long flag.
fn is_inline_value(arg: &str) -> bool {
    arg.split_once('=').is_some_and(|(name, _)| {
        name.starts_with("--")
            && ANYWHERE_FLAGS
                .iter()
                .any(|&(flag, takes_value)| takes_value && flag == name)
    })
}

/// What a successful invocation produced.
#[derive(Debug)]
pub enum Outcome {
    /// No command was given; only the selection was updated.
    Saved(Config),
    Report(Report),
}

pub struct App<E: ?Sized> {
    executor: Arc<E>,
    store: ConfigStore,
    tools: Tools,
}

impl<E: CommandExecutor + ?Sized + 'static> App<E> {
    pub fn new(executor: Arc<E>, store: ConfigStore, tools: Tools) -> Self {
        Self {
            executor,
            store,
            tools,
        }
    }

    pub async fn run(&self, cli: &Cli) -> Result<Outcome> {
        // Reselection replaces the record, so a corrupt file must not block it.
        let existing = if cli.select {
            None
        } else {
            self.store.load_optional()?
        };
        let selector = Selector::new(self.executor.as_ref(), &self.tools);

        let select_clusters = cli.select || existing.is_none();
        if select_clusters || cli.select_namespace {
            selector.ensure_picker()?;
        }

        let mut config = if select_clusters {
            let contexts = selector.list_contexts(cli.context_source()).await?;
            let clusters = selector.select_clusters(&contexts).await?;
            if clusters.is_empty() {
                bail!(SelectError::NoClustersSelected);
            }
            let config = Config::new(clusters, cli.namespace.clone());
            self.store.save(&config)?;
            tracing::info!(clusters = ?config.clusters, "saved cluster selection");
            config
        } else {
            let mut config = existing.unwrap_or_default();
            if let Some(ns) = &cli.namespace {
                config.namespace = Some(ns.clone());
                self.store.save(&config)?;
            }
            config
        };

        if cli.select_namespace {
            let namespace = selector.select_namespace(&config.clusters).await?;
            config.namespace = Some(namespace);
            self.store.save(&config)?;
        }

        if cli.command.is_empty() {
            return Ok(Outcome::Saved(config));
        }
        if config.clusters.is_empty() {
            bail!(SelectError::NoClusters);
        }

        let request = FanoutRequest {
            args: cli.command.clone(),
            namespace: config.effective_namespace().map(str::to_string),
            grep: cli.grep.clone(),
            format: cli.format,
        };
        let runner = FanoutRunner::new(Arc::clone(&self.executor), self.tools.kubectl.clone());
        Ok(Outcome::Report(runner.run(&config.clusters, &request).await))
    }
}

/// Confirmation line printed after a selection-only invocation.
pub fn saved_message(config: &Config) -> String {
    format!(
        "Selection saved: {} (namespace: {})",
        config.clusters.join(", "),
        config.effective_namespace().unwrap_or("none")
    )
}
