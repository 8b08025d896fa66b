//! `marrow.toml`: evaluator and capability settings for a script.
//!
//! ```toml
//! [engine]
//! echo = true
//! max_call_depth = 512
//!
//! [web]
//! host = "0.0.0.0"
//! ```

use std::path::{Path, PathBuf};

use marrow_eval::{EvalOptions, WebOptions};
use serde::Deserialize;

pub const DEFAULT_FILE_NAME: &str = "marrow.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub engine: EvalOptions,
    pub web: WebOptions,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl Config {
    pub fn from_toml(path: &Path, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load settings for `script`.
    ///
    /// An explicit path must exist. Otherwise `marrow.toml` beside the script
    /// is used when present, and defaults when not.
    pub fn load(explicit: Option<&Path>, script: &Path) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = script
                    .parent()
                    .unwrap_or_else(|| Path::new("."))
                    .join(DEFAULT_FILE_NAME);
                if !candidate.is_file() {
                    return Ok(Config::default());
                }
                candidate
            }
        };

        tracing::debug!(path = %path.display(), "loading config");
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Config::from_toml(&path, &text)
    }
}
