//! Command-line interface for kickstart
//!
//! Recognized scripts:
//! - `build`: Production build
//! - `start`: Development server
//! - `test`: Test runner
//! - `init`: Project scaffolding

mod args;

use std::fmt;

use colored::Colorize;
use serde::Serialize;

use crate::env::Mode;
use crate::error::Error;
use crate::orchestrator::SpawnResult;

pub use args::{
    command, parse_arguments, CliOption, OptionKind, OptionValue, ParseOptions, ParsedArguments,
    Token,
};

/// A script the CLI can dispatch to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Script {
    Build,
    Start,
    Test,
    Init,
}

impl Script {
    pub const ALL: [Script; 4] = [Script::Build, Script::Start, Script::Test, Script::Init];

    pub fn name(self) -> &'static str {
        match self {
            Script::Build => "build",
            Script::Start => "start",
            Script::Test => "test",
            Script::Init => "init",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|script| script.name() == name)
    }

    /// Mode forced on the environment before `.env` files are read
    pub fn implied_mode(self) -> Option<Mode> {
        match self {
            Script::Build => Some(Mode::Production),
            Script::Start => Some(Mode::Development),
            Script::Test => Some(Mode::Test),
            Script::Init => None,
        }
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Print the kickstart banner
pub fn print_banner() {
    eprintln!(
        "\n{} {} {}\n",
        "⚡".cyan(),
        "kickstart".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}

/// Print a fatal error and its causes
pub fn print_failure(err: &anyhow::Error) {
    eprintln!("\n{} {}", "✗".red().bold(), err.to_string().red());
    for cause in err.chain().skip(1) {
        eprintln!("  {} {}", "•".dimmed(), cause);
    }
    if let Some(Error::Args(args)) = err.downcast_ref::<Error>() {
        if args.token().is_some() {
            eprintln!("  {} Run {} for usage", "•".dimmed(), "kickstart --help".yellow());
        }
    }
    eprintln!();
}

/// Explain how the script ended when it did not exit cleanly
pub fn print_outcome(result: &SpawnResult) {
    if let Some(error) = &result.error {
        eprintln!("{} Could not start the script: {}", "✗".red().bold(), error);
    } else if let Some(signal) = result.signal {
        if result.was_killed() {
            eprintln!(
                "{} The script exited too early (signal {}). The system may have run out of memory or someone called `kill -9` on it.",
                "✗".red().bold(),
                signal
            );
        } else {
            eprintln!("{} The script was terminated by signal {}", "✗".red().bold(), signal);
        }
    } else if result.cancelled {
        eprintln!("{} Cancelled", "•".yellow());
    }
}
