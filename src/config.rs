//! Configuration gateway.
//!
//! A single `conf.json` record is read at startup and is read-only from
//! then on. The file lives next to the executable; the current directory
//! is consulted only when the executable path cannot be determined. A
//! missing file is a fatal startup error, while missing or zero-valued
//! individual keys receive their defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const CONF_FILE_NAME: &str = "conf.json";
const DEFAULT_TIME_OUT_SEC: u64 = 60;

/// Configuration load failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file {} not found", path.display())]
    Missing { path: PathBuf },

    #[error("failed to read configuration {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration {} is not valid JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Runtime configuration for the verifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Solver argv; defaults to `["z3", "-in"]`.
    #[serde(default)]
    pub cmd: Vec<String>,

    /// Per-VC wall-clock timeout in seconds; 0 or missing means 60.
    #[serde(default)]
    pub time_out_sec: u64,

    /// Call heads treated as pure observation (no contract needed);
    /// defaults to `["Print", "Println", "Printf"]`.
    #[serde(default)]
    pub ignore_funcs: Vec<String>,

    /// Trace WP computation, scripts and raw solver output to stderr.
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cmd: default_cmd(),
            time_out_sec: DEFAULT_TIME_OUT_SEC,
            ignore_funcs: default_ignore_funcs(),
            debug: false,
        }
    }
}

fn default_cmd() -> Vec<String> {
    vec!["z3".to_string(), "-in".to_string()]
}

fn default_ignore_funcs() -> Vec<String> {
    vec![
        "Print".to_string(),
        "Println".to_string(),
        "Printf".to_string(),
    ]
}

impl Config {
    /// Load the configuration from the resolved `conf.json` location.
    ///
    /// # Errors
    /// Fails when no configuration file exists or it does not parse.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&resolve_conf_file())
    }

    /// Load from an explicit path.
    ///
    /// # Errors
    /// See [`Config::load`].
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::Missing {
                    path: path.to_path_buf(),
                });
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let mut config: Self =
            serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        config.apply_defaults();
        Ok(config)
    }

    /// Fill in defaults for keys that were missing, empty, or zero.
    fn apply_defaults(&mut self) {
        if self.cmd.is_empty() {
            self.cmd = default_cmd();
        }
        if self.time_out_sec == 0 {
            self.time_out_sec = DEFAULT_TIME_OUT_SEC;
        }
        if self.ignore_funcs.is_empty() {
            self.ignore_funcs = default_ignore_funcs();
        }
    }

    /// The solver timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.time_out_sec)
    }
}

/// `conf.json` next to the executable; the bare (current-directory) name
/// only when the executable path cannot be determined.
fn resolve_conf_file() -> PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            return dir.join(CONF_FILE_NAME);
        }
    }
    PathBuf::from(CONF_FILE_NAME)
}
