//! kickstart library
//!
//! Path, public-URL and environment resolution plus the orchestration that
//! turns `kickstart <script>` into a supervised child process.

pub mod bundler;
pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod paths;
pub mod utils;

pub use config::Config;
pub use env::{ClientEnvironment, EnvLoader, Mode, ProcessEnv};
pub use error::{Error, Result};
pub use orchestrator::{CancelSignal, Invocation, Orchestrator, SpawnResult};
pub use paths::{resolve_paths, resolve_public_url, ClientPaths, PathMode};
