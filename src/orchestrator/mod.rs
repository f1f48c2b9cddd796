//! Command orchestration
//!
//! One invocation walks `Idle -> ResolvingCommand -> ResolvingArgs ->
//! ResolvingEnv -> Spawning -> Completed`. A failure in any resolving phase
//! cancels the shared signal and ends in `Aborted` without spawning. Nothing
//! is retried.

mod spawn;

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use crate::bundler::{BundlerOptions, BUNDLER_OPTIONS_VAR};
use crate::cli::{CliOption, ParseOptions, ParsedArguments, Script};
use crate::config::Config;
use crate::env::{ClientEnvironment, EnvLoader, Mode, ProcessEnv};
use crate::error::{ConfigError, Error, Result};
use crate::logging::{self, LogSettings};
use crate::paths::{self, PathOptions};
use crate::utils::{display_relative, format_duration};

pub use spawn::{spawn, CancelSignal, SpawnRequest, SpawnResult};

/// Lifecycle of a single invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ResolvingCommand,
    ResolvingArgs,
    ResolvingEnv,
    Spawning,
    Completed,
    Aborted,
}

/// Inputs captured from the OS at startup
#[derive(Debug, Clone)]
pub struct Invocation {
    pub cwd: PathBuf,
    /// Arguments after the executable name
    pub argv: Vec<String>,
    pub env: ProcessEnv,
    pub parse: ParseOptions,
}

impl Invocation {
    pub fn from_os() -> std::io::Result<Self> {
        Ok(Self {
            cwd: std::env::current_dir()?,
            argv: std::env::args_os()
                .skip(1)
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect(),
            env: ProcessEnv::from_os(),
            parse: ParseOptions::default(),
        })
    }
}

/// Host runtime and the flags it is started with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCommand {
    pub executable: PathBuf,
    pub runtime_args: Vec<String>,
}

/// Drives one invocation from raw inputs to a finished child process
pub struct Orchestrator {
    phase: Phase,
    cancel: CancelSignal,
    install_logging: bool,
}

impl Orchestrator {
    pub fn new(cancel: CancelSignal) -> Self {
        Self {
            phase: Phase::Idle,
            cancel,
            install_logging: false,
        }
    }

    /// Install the tracing subscriber once the flags are known
    pub fn with_logging(mut self) -> Self {
        self.install_logging = true;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Resolve everything, then run the script to completion
    pub async fn run(&mut self, invocation: Invocation) -> Result<SpawnResult> {
        let started = Instant::now();

        let request = match self.prepare(invocation) {
            Ok(request) => request,
            Err(err) => return Err(self.abort(err)),
        };

        if let Err(err) = self.enter(Phase::Spawning) {
            return Err(self.abort(err));
        }
        match spawn(request).await {
            Ok(result) => {
                self.phase = Phase::Completed;
                info!(
                    "Script finished in {} (status {:?})",
                    format_duration(started.elapsed()),
                    result.status
                );
                Ok(result)
            }
            Err(err) => Err(self.abort(err.into())),
        }
    }

    /// Run the three resolving phases and assemble the spawn request
    pub fn prepare(&mut self, invocation: Invocation) -> Result<SpawnRequest> {
        let Invocation {
            cwd,
            argv,
            env,
            parse,
        } = invocation;

        self.enter(Phase::ResolvingCommand)?;
        let real_cwd = paths::realpath(&cwd)?;
        let config = Config::load(&real_cwd)?;
        // Reported after argument errors, so help and version work without a runtime
        let host = resolve_host_command(&config, &env, &cwd);

        self.enter(Phase::ResolvingArgs)?;
        let args = crate::cli::parse_arguments(&argv, parse)?;
        if self.install_logging {
            logging::init(&LogSettings::from(&args))?;
        }
        let host = host?;
        debug!("Runtime: {} {:?}", host.executable.display(), host.runtime_args);
        info!("Running {} script", args.script);

        self.enter(Phase::ResolvingEnv)?;
        let mut env = env;
        let path_mode = config.path_mode(&env)?;
        let own_root = config.own_root(&env);
        let anchors = paths::anchors(&cwd, path_mode, own_root.as_deref())?;

        let report = EnvLoader::new(&anchors.app)
            .with_working_dir(&real_cwd)
            .with_mode(args.script.implied_mode())
            .load(&mut env)?;
        if !report.missing.is_empty() {
            let missing: Vec<String> = report
                .missing
                .iter()
                .map(|file| display_relative(&anchors.app, &file.path))
                .collect();
            debug!("Optional env files not present: {}", missing.join(", "));
        }
        let mode = env.mode()?;

        let paths = paths::resolve_paths(
            &cwd,
            &PathOptions {
                mode: path_mode,
                own_root,
                build_dir: config.build_dir(&env),
                scripts_dir: config.runtime.scripts_dir.clone(),
                is_development: mode == Mode::Development,
                public_url_override: env.non_empty("PUBLIC_URL").map(str::to_string),
            },
        )?;
        let client = ClientEnvironment::new(&env, &config.env.prefix, &paths.public_url_or_path);
        let bundler = BundlerOptions::new(&args, mode, &paths, &client, &env, &config)?;
        let bundler_json = bundler.to_json().map_err(ConfigError::BundlerOptions)?;

        let mut spawn_args = host.runtime_args;
        spawn_args.push(paths.script_module(args.script.name()).display().to_string());
        spawn_args.extend(forwarded_args(&args, &env));

        let mut child_env = env.into_map();
        child_env.insert(BUNDLER_OPTIONS_VAR.to_string(), bundler_json);

        Ok(SpawnRequest {
            program: host.executable,
            args: spawn_args,
            cwd: paths.app_path,
            env: child_env,
            cancel: self.cancel.clone(),
        })
    }

    /// Move to `next` unless the invocation was cancelled meanwhile
    fn enter(&mut self, next: Phase) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        debug!("{:?} -> {:?}", self.phase, next);
        self.phase = next;
        Ok(())
    }

    fn abort(&mut self, err: Error) -> Error {
        debug!("Aborting during {:?}: {}", self.phase, err);
        self.cancel.cancel();
        self.phase = Phase::Aborted;
        err
    }
}

/// Locate the runtime executable and its inherited flags
pub fn resolve_host_command(config: &Config, env: &ProcessEnv, cwd: &Path) -> Result<HostCommand, ConfigError> {
    let name = config.runtime_executable(env);
    let candidate = Path::new(&name);

    let executable = if candidate.components().count() > 1 {
        // Explicit path, relative to the working directory
        cwd.join(candidate)
    } else {
        let search_path = env.get("PATH").unwrap_or_default();
        which::which_in(&name, Some(search_path), cwd).map_err(|source| ConfigError::RuntimeNotFound {
            name: name.clone(),
            source,
        })?
    };

    Ok(HostCommand {
        executable,
        runtime_args: config.runtime_args(env),
    })
}

/// Arguments after the script path: canonical flags, then `--` passthrough
fn forwarded_args(args: &ParsedArguments, env: &ProcessEnv) -> Vec<String> {
    let mut forwarded = args.forwarded_flags(&[CliOption::Watch]);

    if args.script == Script::Test && watch_tests(args, env) {
        forwarded.push("--watch".to_string());
    }

    forwarded.extend(args.passthrough.iter().cloned());
    forwarded
}

/// Tests watch unless told otherwise or running under CI
fn watch_tests(args: &ParsedArguments, env: &ProcessEnv) -> bool {
    let in_ci = env.get("CI").is_some_and(|ci| ci != "false");
    args.flag(CliOption::Watch).unwrap_or(!in_ci)
}
