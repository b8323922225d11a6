use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::mirror::SkipPolicy;

/// Directory depth allowed when nothing else is configured. Symlinked
/// directories are followed, so a link loop stops here.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Defaults read from `~/.sftp-mirror/config.json`. Every field is optional
/// in the file; command-line flags override whatever is set here.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub skip_policy: SkipPolicy,
    pub sort_entries: bool,
    /// Treat a remote/local count mismatch as a failure.
    pub strict_counts: bool,
    pub max_depth: Option<usize>,
    pub buf_size: usize,
    pub connect_timeout_secs: u64,
    pub io_timeout_secs: u64,
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            skip_policy: SkipPolicy::Exists,
            sort_entries: false,
            strict_counts: false,
            max_depth: Some(DEFAULT_MAX_DEPTH),
            buf_size: 256 * 1024,
            connect_timeout_secs: 10,
            io_timeout_secs: 30,
            log_dir: None,
        }
    }
}

impl Config {
    /// `~/.sftp-mirror`
    pub fn storage_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".".to_owned() + env!("CARGO_PKG_NAME")))
    }

    pub fn default_path() -> Option<PathBuf> {
        Self::storage_dir().map(|d| d.join("config.json"))
    }

    /// Load from `path`, or from the default location when `path` is None.
    /// A missing default file yields defaults; an explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        Self::load_with_source(path).map(|(config, _)| config)
    }

    /// Like `load`, also returning the file the values came from (None when
    /// defaults were used). Nothing is logged here: this runs before tracing
    /// is installed.
    pub fn load_with_source(path: Option<&Path>) -> Result<(Config, Option<PathBuf>)> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => return Ok((Config::default(), None)),
            },
        };
        if !path.exists() {
            if explicit {
                return Err(anyhow::anyhow!("config file not found: {}", path.display()));
            }
            return Ok((Config::default(), None));
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("malformed config file {}", path.display()))?;
        Ok((config, Some(path)))
    }

    /// Directory for --verbose log files.
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.log_dir.clone().or_else(|| Self::storage_dir().map(|d| d.join("logs")))
    }
}

/// Expand a leading `~` to the local home directory, like a shell would.
pub fn expand_local_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}
