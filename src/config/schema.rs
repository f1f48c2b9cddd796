//! Configuration schema definitions

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::env::DEFAULT_CLIENT_PREFIX;

/// Path layout configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Layout mode (in-place, after-eject, before-packaging)
    #[serde(default)]
    pub mode: Option<String>,

    /// Installation root of the scripts package
    #[serde(default)]
    pub own_root: Option<PathBuf>,

    /// Output directory, relative to the project root
    #[serde(default)]
    pub build_dir: Option<String>,
}

/// Client environment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Prefix marking variables as safe to embed in client code
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
        }
    }
}

fn default_prefix() -> String {
    DEFAULT_CLIENT_PREFIX.to_string()
}

/// Host runtime used to run the scripts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Executable name or path
    #[serde(default = "default_executable")]
    pub executable: String,

    /// Flags passed to the runtime before the script path
    #[serde(default)]
    pub args: Vec<String>,

    /// Directory holding `build.js`, `start.js`, ... relative to the scripts root
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            args: Vec::new(),
            scripts_dir: default_scripts_dir(),
        }
    }
}

fn default_executable() -> String {
    "node".to_string()
}

fn default_scripts_dir() -> String {
    "scripts".to_string()
}

/// Development server fallbacks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevConfig {
    /// Port used when `PORT` is unset
    #[serde(default = "default_port")]
    pub port: u16,

    /// Host used when `HOST` is unset
    #[serde(default = "default_host")]
    pub host: String,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

fn default_port() -> u16 {
    3000
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
