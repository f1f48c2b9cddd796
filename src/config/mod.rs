//! Configuration handling for kickstart
//!
//! Everything is optional. An absent `kickstart.toml` yields the defaults,
//! and a handful of environment variables override what the file says.

mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::env::ProcessEnv;
use crate::error::ConfigError;
use crate::paths::PathMode;

pub use schema::*;

/// Name of the optional configuration file at the project root
pub const CONFIG_FILE: &str = "kickstart.toml";

/// Default output directory when neither `BUILD_DIR` nor the file set one
pub const DEFAULT_BUILD_DIR: &str = "dist";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Path layout
    #[serde(default)]
    pub paths: PathsConfig,

    /// Client environment
    #[serde(default)]
    pub env: EnvConfig,

    /// Host runtime
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Development server settings
    #[serde(default)]
    pub dev: DevConfig,

    /// Directory the file was read from
    #[serde(skip)]
    pub root: PathBuf,
}

impl Config {
    /// Load `kickstart.toml` from `dir`, falling back to defaults
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let path = dir.join(CONFIG_FILE);

        let mut config = if path.is_file() {
            let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            debug!("Loaded configuration from {}", path.display());
            toml::from_str(&content).map_err(|source| ConfigError::Toml {
                path: path.clone(),
                source,
            })?
        } else {
            Config::default()
        };

        config.root = dir.to_path_buf();
        Ok(config)
    }

    /// Path layout mode; `KICKSTART_PATHS_MODE` beats the file
    pub fn path_mode(&self, env: &ProcessEnv) -> Result<PathMode, ConfigError> {
        env.non_empty("KICKSTART_PATHS_MODE")
            .or(self.paths.mode.as_deref())
            .map(str::parse)
            .unwrap_or(Ok(PathMode::default()))
    }

    /// Scripts package root; `KICKSTART_OWN_ROOT` beats the file
    ///
    /// Relative values are anchored at the configuration directory.
    pub fn own_root(&self, env: &ProcessEnv) -> Option<PathBuf> {
        env.non_empty("KICKSTART_OWN_ROOT")
            .map(PathBuf::from)
            .or_else(|| self.paths.own_root.clone())
            .map(|path| self.root.join(path))
    }

    /// Output directory; `BUILD_DIR` beats the file
    pub fn build_dir(&self, env: &ProcessEnv) -> String {
        env.non_empty("BUILD_DIR")
            .map(str::to_string)
            .or_else(|| self.paths.build_dir.clone())
            .unwrap_or_else(|| DEFAULT_BUILD_DIR.to_string())
    }

    /// Runtime executable; `KICKSTART_RUNTIME` beats the file
    pub fn runtime_executable(&self, env: &ProcessEnv) -> String {
        env.non_empty("KICKSTART_RUNTIME")
            .map(str::to_string)
            .unwrap_or_else(|| self.runtime.executable.clone())
    }

    /// Runtime flags; `KICKSTART_RUNTIME_ARGS` (whitespace separated) beats the file
    pub fn runtime_args(&self, env: &ProcessEnv) -> Vec<String> {
        match env.get("KICKSTART_RUNTIME_ARGS") {
            Some(args) => args.split_whitespace().map(str::to_string).collect(),
            None => self.runtime.args.clone(),
        }
    }
}
