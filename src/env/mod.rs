//! Environment loading
//!
//! Layers `.env` files on top of an explicit [`ProcessEnv`] snapshot. The
//! loader is the only component that mutates the snapshot; everything
//! downstream reads it by reference.
//!
//! Candidates are consulted most-specific first:
//! 1. `.env.{mode}.local`
//! 2. `.env.{mode}`
//! 3. `.env.local` (skipped in test mode so results are reproducible)
//! 4. `.env`
//!
//! A variable that is already set is never overwritten, so a value from the
//! real environment beats every file and a more specific file beats a less
//! specific one.

mod client;
mod expand;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ConfigError, EnvError, Result};
use crate::utils::{display_relative, normalize_path};

use expand::Expander;

pub use client::{ClientEnvironment, RawEnv, StringifiedEnv, DEFAULT_CLIENT_PREFIX};

/// Build mode selecting `.env.{mode}*` files and bundler defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Development,
    Production,
    Test,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
            Mode::Test => "test",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Mode::Development),
            "production" => Ok(Mode::Production),
            "test" => Ok(Mode::Test),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

/// Owned snapshot of the process environment
///
/// Captured once at startup and handed to the spawned script verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessEnv {
    vars: BTreeMap<String, String>,
}

impl ProcessEnv {
    /// Capture the current OS environment, skipping non UTF-8 entries
    pub fn from_os() -> Self {
        std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Like [`ProcessEnv::get`], treating an empty value as unset
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|value| !value.is_empty())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Current mode from `NODE_ENV`, defaulting to development
    pub fn mode(&self) -> Result<Mode, ConfigError> {
        self.non_empty("NODE_ENV")
            .map(Mode::from_str)
            .unwrap_or(Ok(Mode::Development))
    }

    pub(crate) fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Insert only when the variable is not already present
    pub(crate) fn set_if_absent(&mut self, name: String, value: String) -> bool {
        match self.vars.entry(name) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    pub(crate) fn into_map(self) -> BTreeMap<String, String> {
        self.vars
    }
}

impl FromIterator<(String, String)> for ProcessEnv {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

/// A `.env` candidate that was not found; informational only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingEnvFile {
    pub path: PathBuf,
}

/// What a load pass did
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Files that existed and were applied, in load order
    pub loaded: Vec<PathBuf>,

    /// Candidates that did not exist
    pub missing: Vec<MissingEnvFile>,

    /// Number of variables introduced by the files
    pub applied: usize,
}

/// Layered `.env` loader for one project directory
#[derive(Debug, Clone)]
pub struct EnvLoader {
    app_dir: PathBuf,
    /// Anchor for relative `NODE_PATH` entries; the project directory if unset
    working_dir: Option<PathBuf>,
    implied_mode: Option<Mode>,
}

impl EnvLoader {
    /// Create a loader for an already symlink-resolved project directory
    pub fn new(app_dir: impl Into<PathBuf>) -> Self {
        Self {
            app_dir: app_dir.into(),
            working_dir: None,
            implied_mode: None,
        }
    }

    /// Resolve relative `NODE_PATH` entries against the real working directory
    pub fn with_working_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(cwd.into());
        self
    }

    /// Force `NODE_ENV` (and `BABEL_ENV`) before any file is read
    pub fn with_mode(mut self, mode: Option<Mode>) -> Self {
        self.implied_mode = mode;
        self
    }

    /// Ordered candidate files for `mode`, most specific first
    pub fn candidates(&self, mode: Mode) -> Vec<PathBuf> {
        let dotenv = self.app_dir.join(".env");
        let mut files = vec![
            self.app_dir.join(format!(".env.{}.local", mode)),
            self.app_dir.join(format!(".env.{}", mode)),
        ];
        if mode != Mode::Test {
            files.push(self.app_dir.join(".env.local"));
        }
        files.push(dotenv);
        files
    }

    /// Layer every existing candidate into `env` and rebuild `NODE_PATH`
    pub fn load(&self, env: &mut ProcessEnv) -> Result<LoadReport> {
        let mode = match self.implied_mode {
            Some(mode) => {
                env.set("NODE_ENV", mode.as_str());
                env.set("BABEL_ENV", mode.as_str());
                mode
            }
            None => env.mode()?,
        };

        let mut report = LoadReport::default();

        for candidate in self.candidates(mode) {
            let shown = display_relative(&self.app_dir, &candidate);
            if !candidate.is_file() {
                debug!("No {} found, skipping", shown);
                report.missing.push(MissingEnvFile { path: candidate });
                continue;
            }

            let applied = apply_file(&candidate, env)?;
            debug!("Loaded {} ({} new variable(s))", shown, applied);
            report.applied += applied;
            report.loaded.push(candidate);
        }

        if let Some(node_path) = env.get("NODE_PATH") {
            let base = self.working_dir.as_deref().unwrap_or(&self.app_dir);
            let resolved = resolve_node_path(node_path, base)?;
            debug!("NODE_PATH resolved to '{}'", resolved);
            env.set("NODE_PATH", resolved);
        }

        info!(
            "Environment ready for {} mode ({} file(s) loaded)",
            mode,
            report.loaded.len()
        );

        Ok(report)
    }
}

/// Read one dotenv file and add the variables that are not yet set
///
/// References inside values are expanded against `env` as it stands, so
/// a forced mode and values from more specific files are visible.
fn apply_file(path: &Path, env: &mut ProcessEnv) -> Result<usize, EnvError> {
    let parse_error = |source| EnvError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let content = fs::read_to_string(path).map_err(|err| parse_error(dotenvy::Error::Io(err)))?;

    // Later lines of the same file win over earlier ones
    let mut entries = BTreeMap::new();
    for item in dotenvy::from_read_iter(expand::protect(&content).as_bytes()) {
        let (key, value) = item.map_err(parse_error)?;
        entries.insert(key, value);
    }

    let expander = Expander::new(env, &entries);
    let resolved: Vec<(String, String)> = entries
        .iter()
        .filter(|(key, _)| !env.contains(key))
        .map(|(key, raw)| (key.clone(), expander.expand_entry(key, raw)))
        .collect();

    Ok(resolved
        .into_iter()
        .filter(|(key, value)| env.set_if_absent(key.clone(), value.clone()))
        .count())
}

/// Keep only relative `NODE_PATH` entries, anchored at `base`
///
/// Absolute entries are dropped so host-specific folders never leak into a
/// build.
pub fn resolve_node_path(value: &str, base: &Path) -> Result<String, EnvError> {
    let folders: Vec<PathBuf> = std::env::split_paths(value)
        .filter(|folder| !folder.as_os_str().is_empty() && !folder.is_absolute())
        .map(|folder| normalize_path(&base.join(folder)))
        .collect();

    let joined = std::env::join_paths(folders).map_err(EnvError::NodePath)?;
    Ok(joined.to_string_lossy().into_owned())
}
