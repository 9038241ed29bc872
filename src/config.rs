//! REPL and CLI configuration
//!
//! Read from `--config <file>` or from `primer.toml` in the working
//! directory. Every key is optional:
//!
//! ```toml
//! prompt = "primer> "
//! seed = 42
//! history_file = ".primer_history"
//! ```

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File looked up in the working directory when no `--config` is given
pub const CONFIG_FILE: &str = "primer.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// REPL prompt
    pub prompt: String,
    /// Seed for reproducible random draws
    pub seed: Option<u64>,
    /// Where the REPL keeps its line history
    pub history_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: "primer> ".to_string(),
            seed: None,
            history_file: None,
        }
    }
}

/// Configuration loading failure
#[derive(Error, Debug, Diagnostic)]
pub enum ConfigError {
    #[error("Failed to read config file {}", path.display())]
    #[diagnostic(code(primer::ConfigError))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {}", path.display())]
    #[diagnostic(code(primer::ConfigError), help("see `primer info` for the accepted keys"))]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl Config {
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, path)
    }

    /// An explicit path must exist; otherwise `primer.toml` is used when
    /// present and the defaults when not
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let path = Path::new(CONFIG_FILE);
                if path.is_file() {
                    tracing::debug!(path = %path.display(), "loading config");
                    Self::load(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}
