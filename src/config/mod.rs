//! Persisted cluster selection.
//!
//! The record is small YAML with two fields and is rewritten in full on
//! every save:
//!
//! ```yaml
//! clusters:
//! - prod-eu
//! - prod-us
//! namespace: payments
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_DIR: &str = ".kubectl-ball";
const CONFIG_FILE: &str = "config.yaml";

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "KUBECTL_BALL_CONFIG";
/// Environment variable overriding the cluster CLI program.
pub const KUBECTL_ENV: &str = "KUBECTL_BALL_KUBECTL";
/// Environment variable overriding the picker program.
pub const PICKER_ENV: &str = "KUBECTL_BALL_PICKER";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no saved selection at {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {error}", .path.display())]
    Read {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("failed to parse {}: {error}", .path.display())]
    Parse {
        path: PathBuf,
        error: serde_yaml::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(serde_yaml::Error),

    #[error("failed to write {}: {error}", .path.display())]
    Write {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("could not determine home directory")]
    NoHome,
}

/// The saved selection: which contexts to target and in which namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Cluster contexts in selection order.
    #[serde(default)]
    pub clusters: Vec<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

impl Config {
    pub fn new(clusters: Vec<String>, namespace: Option<String>) -> Self {
        Self {
            clusters,
            namespace,
        }
    }

    /// Namespace to forward, ignoring an empty value.
    pub fn effective_namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }
}

/// Loads and saves [`Config`] at an explicit path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolve the path from an explicit override, then
    /// `KUBECTL_BALL_CONFIG`, then `~/.kubectl-ball/config.yaml`.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Ok(Self::new(path));
        }
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
            return Ok(Self::new(path));
        }
        default_path().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Config, ConfigError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(self.path.clone()));
            }
            Err(error) => {
                return Err(ConfigError::Read {
                    path: self.path.clone(),
                    error,
                });
            }
        };

        let config = serde_yaml::from_str(&content).map_err(|error| ConfigError::Parse {
            path: self.path.clone(),
            error,
        })?;
        tracing::debug!(path = %self.path.display(), "loaded config");
        Ok(config)
    }

    /// Like [`load`](Self::load) but maps a missing file to `None`.
    pub fn load_optional(&self) -> Result<Option<Config>, ConfigError> {
        match self.load() {
            Ok(config) => Ok(Some(config)),
            Err(ConfigError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let write_err = |error| ConfigError::Write {
            path: self.path.clone(),
            error,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_private_dir(parent).map_err(write_err)?;
        }

        let content = serde_yaml::to_string(config).map_err(ConfigError::Serialize)?;
        fs::write(&self.path, content).map_err(write_err)?;
        tracing::debug!(path = %self.path.display(), "saved config");
        Ok(())
    }
}

fn default_path() -> Result<PathBuf, ConfigError> {
    let mut path = dirs::home_dir().ok_or(ConfigError::NoHome)?;
    path.push(CONFIG_DIR);
    path.push(CONFIG_FILE);
    Ok(path)
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}

/// Names of the external programs the tool drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    pub kubectl: String,
    pub picker: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            kubectl: "kubectl".to_string(),
            picker: "fzf".to_string(),
        }
    }
}

impl Tools {
    /// Defaults overridden by `KUBECTL_BALL_KUBECTL` / `KUBECTL_BALL_PICKER`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            kubectl: env_or(KUBECTL_ENV, defaults.kubectl),
            picker: env_or(PICKER_ENV, defaults.picker),
        }
    }
}

fn env_or(key: &str, fallback: String) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or(fallback)
}
