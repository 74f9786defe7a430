//! Binding policy configuration.
//!
//! Options are layered: built-in defaults, then the `[options]` table of the
//! nearest `kernelbind.toml`, then environment overrides.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[cfg(test)]
mod tests;

pub const CONFIG_FILE: &str = "kernelbind.toml";

/// Overrides `strict_broadcasting` when set.
pub const STRICT_BROADCASTING_ENV: &str = "KERNELBIND_STRICT_BROADCASTING";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration in '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value '{value}' for {var}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Policy flags consulted during vectorization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BindOptions {
    /// Reject any implicitly vectorized argument whose dimensionality is
    /// neither 0 nor the dispatch rank.
    pub strict_broadcasting: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    options: BindOptions,
}

impl BindOptions {
    pub fn strict() -> Self {
        Self {
            strict_broadcasting: true,
        }
    }

    /// Parse the `[options]` table of a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let file: ConfigFile = toml::from_str(content)?;
        Ok(file.options)
    }

    /// Find a `kernelbind.toml` in the given directory or its ancestors.
    pub fn find(start_dir: &Path) -> Option<PathBuf> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// Defaults, then the nearest configuration file, then the environment.
    pub fn resolve(start_dir: &Path) -> Result<Self, ConfigError> {
        let options = match Self::find(start_dir) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading binding options");
                Self::load(&path)?
            }
            None => Self::default(),
        };
        options.with_env()
    }

    pub fn with_env(self) -> Result<Self, ConfigError> {
        let value = std::env::var(STRICT_BROADCASTING_ENV).ok();
        self.with_env_value(value.as_deref())
    }

    fn with_env_value(mut self, value: Option<&str>) -> Result<Self, ConfigError> {
        let Some(value) = value else {
            return Ok(self);
        };
        self.strict_broadcasting = match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                return Err(ConfigError::InvalidEnv {
                    var: STRICT_BROADCASTING_ENV,
                    value: value.to_string(),
                })
            }
        };
        Ok(self)
    }
}
