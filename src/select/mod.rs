//! Interactive cluster and namespace selection through an external picker.

use thiserror::Error;

use crate::config::Tools;
use crate::exec::{find_on_path, CommandExecutor, ExecError};

const CLUSTER_PROMPT: &str = "--prompt=Select Clusters > ";
const NAMESPACE_PROMPT: &str = "--prompt=Select Namespace > ";

#[derive(Debug, Error)]
pub enum SelectError {
    #[error(
        "\"{0}\" not found. Install it:\n  macOS:   brew install fzf\n  Ubuntu:  sudo apt install fzf\n  Docs:    https://github.com/junegunn/fzf"
    )]
    PickerMissing(String),

    #[error("failed to get contexts: {0}")]
    ListContexts(ExecError),

    #[error("failed to get namespaces: {0}")]
    ListNamespaces(ExecError),

    #[error("no cluster contexts available")]
    NoContexts,

    #[error("no namespaces found in context {0}")]
    NoNamespaces(String),

    #[error("selection failed: {0}")]
    Picker(ExecError),

    #[error("no clusters selected")]
    NoClustersSelected,

    #[error("no namespace selected")]
    NoNamespaceSelected,

    #[error("no clusters configured, select clusters first (--select)")]
    NoClusters,
}

/// Where the list of candidate contexts comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContextSource {
    /// `kubectl config get-contexts -o=name`
    #[default]
    Local,
    /// The flattened, merged kubeconfig view.
    Merged,
}

impl ContextSource {
    fn args(self) -> Vec<String> {
        let args = match self {
            Self::Local => vec!["config", "get-contexts", "-o=name"],
            Self::Merged => vec![
                "config",
                "view",
                "--flatten",
                "--minify",
                "-o=jsonpath={.contexts[*].name}",
            ],
        };
        args.iter().map(|s| s.to_string()).collect()
    }

    fn parse(self, output: &str) -> Vec<String> {
        match self {
            Self::Local => non_empty_lines(output),
            Self::Merged => output.split_whitespace().map(str::to_string).collect(),
        }
    }
}

/// Drives the cluster CLI and the picker to build a selection.
pub struct Selector<'a, E: ?Sized> {
    executor: &'a E,
    tools: &'a Tools,
}

impl<'a, E: CommandExecutor + ?Sized> Selector<'a, E> {
    pub fn new(executor: &'a E, tools: &'a Tools) -> Self {
        Self { executor, tools }
    }

    /// Check the picker is on `PATH`. Call once before any selection flow.
    pub fn ensure_picker(&self) -> Result<(), SelectError> {
        match find_on_path(&self.tools.picker) {
            Some(path) => {
                tracing::debug!(picker = %path.display(), "found picker");
                Ok(())
            }
            None => Err(SelectError::PickerMissing(self.tools.picker.clone())),
        }
    }

    pub async fn list_contexts(&self, source: ContextSource) -> Result<Vec<String>, SelectError> {
        let out = self
            .executor
            .output(&self.tools.kubectl, &source.args(), None)
            .await
            .map_err(SelectError::ListContexts)?;
        Ok(source.parse(&String::from_utf8_lossy(&out)))
    }

    /// Let the user pick any number of `contexts`.
    ///
    /// A single candidate is returned without showing the picker.
    pub async fn select_clusters(&self, contexts: &[String]) -> Result<Vec<String>, SelectError> {
        match contexts {
            [] => Err(SelectError::NoContexts),
            [only] => {
                tracing::info!(context = %only, "one context available, selecting it");
                Ok(vec![only.clone()])
            }
            _ => {
                let args = vec!["--multi".to_string(), CLUSTER_PROMPT.to_string()];
                let picked = self.pick(&args, contexts).await?;
                Ok(non_empty_lines(&picked))
            }
        }
    }

    /// Namespaces visible in the first configured cluster.
    pub async fn list_namespaces(&self, clusters: &[String]) -> Result<Vec<String>, SelectError> {
        let context = clusters.first().ok_or(SelectError::NoClusters)?;
        let args: Vec<String> = ["--context", context.as_str(), "get", "namespaces", "-o", "name"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let out = self
            .executor
            .output(&self.tools.kubectl, &args, None)
            .await
            .map_err(SelectError::ListNamespaces)?;
        Ok(parse_namespaces(&String::from_utf8_lossy(&out)))
    }

    /// Pick one namespace from those visible in the first of `clusters`.
    pub async fn select_namespace(&self, clusters: &[String]) -> Result<String, SelectError> {
        let namespaces = self.list_namespaces(clusters).await?;
        match namespaces.as_slice() {
            [] => Err(SelectError::NoNamespaces(clusters[0].clone())),
            [only] => Ok(only.clone()),
            _ => {
                let picked = self.pick(&[NAMESPACE_PROMPT.to_string()], &namespaces).await?;
                non_empty_lines(&picked)
                    .into_iter()
                    .next()
                    .ok_or(SelectError::NoNamespaceSelected)
            }
        }
    }

    async fn pick(&self, args: &[String], candidates: &[String]) -> Result<String, SelectError> {
        let input = candidates.join("\n");
        let out = self
            .executor
            .output(&self.tools.picker, args, Some(&input))
            .await
            .map_err(SelectError::Picker)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

/// Strip the `namespace/` style type prefix from `-o name` output.
pub fn parse_namespaces(output: &str) -> Vec<String> {
    non_empty_lines(output)
        .into_iter()
        .map(|line| match line.rsplit_once('/') {
            Some((_, name)) => name.to_string(),
            None => line,
        })
        .collect()
}

fn non_empty_lines(s: &str) -> Vec<String> {
    s.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
