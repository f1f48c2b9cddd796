//! Error taxonomy for kickstart
//!
//! Configuration, environment and argument errors are fatal and abort the
//! invocation. A child process that exits non-zero or is killed by a signal
//! is not an error; it is reported through [`crate::SpawnResult`].

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error for a single CLI invocation
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error(transparent)]
    Args(#[from] ArgsError),

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error("invocation was cancelled before the script started")]
    Cancelled,
}

/// Fatal configuration problems
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown path mode '{0}' (expected in-place, after-eject (alias after-extraction) or before-packaging)")]
    UnknownPathMode(String),

    #[error("unknown NODE_ENV '{0}' (expected development, production or test)")]
    UnknownMode(String),

    #[error("{name} must be a non-negative integer, got '{value}'")]
    InvalidNumber { name: String, value: String },

    #[error("failed to access {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse {}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize bundler options")]
    BundlerOptions(#[source] serde_json::Error),

    #[error("could not find runtime executable '{name}'")]
    RuntimeNotFound {
        name: String,
        #[source]
        source: which::Error,
    },
}

/// Failures while layering `.env` files
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("failed to load {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("NODE_PATH could not be rebuilt")]
    NodePath(#[source] std::env::JoinPathsError),
}

/// Argument errors, each carrying the offending raw token
#[derive(Debug, Error)]
pub enum ArgsError {
    #[error("unknown flag '{token}'")]
    UnknownFlag { token: String },

    #[error("unknown script '{token}'")]
    UnknownScript { token: String },

    #[error("unexpected argument '{token}': only one script may be given")]
    ExtraScript { token: String },

    #[error("flag '{token}' requires a value")]
    MissingValue { token: String },

    #[error("argument '{token}' is not valid UTF-8")]
    InvalidUtf8 { token: String },

    #[error("no script given (expected one of: build, start, test, init)")]
    MissingScript,

    /// Help or version output was requested; not a failure
    #[error("{0}")]
    Display(String),
}

/// Failures while supervising the spawned script
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed while waiting for the script to exit")]
    Wait(#[source] std::io::Error),
}

impl ArgsError {
    /// The raw token that caused the error, if any
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::UnknownFlag { token }
            | Self::UnknownScript { token }
            | Self::ExtraScript { token }
            | Self::MissingValue { token }
            | Self::InvalidUtf8 { token } => Some(token),
            Self::MissingScript | Self::Display(_) => None,
        }
    }
}
