//! Logging initialization
//!
//! Verbosity, color and destination come from the reconciled CLI flags.
//! `RUST_LOG` still takes precedence over `--verbose` when set.

use std::fs::File;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{CliOption, ParsedArguments};
use crate::error::ConfigError;

/// Subscriber settings derived from the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    pub verbose: bool,
    /// `None` means detect from the terminal
    pub color: Option<bool>,
    pub logfile: Option<PathBuf>,
}

impl From<&ParsedArguments> for LogSettings {
    fn from(args: &ParsedArguments) -> Self {
        Self {
            verbose: args.flag(CliOption::Verbose).unwrap_or(false),
            color: args.flag(CliOption::Color),
            logfile: args.string(CliOption::Logfile).map(PathBuf::from),
        }
    }
}

/// Install the global subscriber; a second call is a no-op
pub fn init(settings: &LogSettings) -> Result<(), ConfigError> {
    if let Some(color) = settings.color {
        colored::control::set_override(color);
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if settings.verbose {
            "kickstart=debug,kickstart_lib=debug"
        } else {
            "kickstart=info,kickstart_lib=info"
        })
    });
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match &settings.logfile {
        Some(path) => {
            let file = File::create(path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            registry
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .try_init()
        }
        None => {
            let ansi = settings
                .color
                .unwrap_or_else(|| std::io::stderr().is_terminal());
            registry
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(ansi)
                        .with_writer(std::io::stderr),
                )
                .try_init()
        }
    };

    if let Err(err) = installed {
        debug!("Logging already initialized: {}", err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{parse_arguments, ParseOptions};

    #[test]
    fn test_settings_follow_last_flag() {
        let args = parse_arguments(
            ["build", "--verbose", "--logfile", "a.log", "--no-verbose", "--color"],
            ParseOptions::default(),
        )
        .unwrap();
        let settings = LogSettings::from(&args);

        assert_eq!(
            settings,
            LogSettings {
                verbose: false,
                color: Some(true),
                logfile: Some(PathBuf::from("a.log")),
            }
        );
    }

    #[test]
    fn test_logfile_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kickstart.log");
        init(&LogSettings {
            logfile: Some(path.clone()),
            ..LogSettings::default()
        })
        .unwrap();
        assert!(path.exists());
    }
}
