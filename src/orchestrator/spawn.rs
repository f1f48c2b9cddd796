//! Scoped subprocess execution
//!
//! The child inherits stdio, gets exactly the resolved environment, and is
//! always reaped: on normal exit, on cancellation (killed, then awaited), and
//! on drop (`kill_on_drop`).

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::SpawnError;

#[cfg(unix)]
const SIGKILL: i32 = 9;
#[cfg(unix)]
const SIGTERM: i32 = 15;

/// Cancellation signal shared by every phase of an invocation
#[derive(Debug, Clone)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request cancellation; idempotent
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once cancellation has been requested
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only ends on cancel
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything needed to start the script
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
    pub cancel: CancelSignal,
}

/// How the script ended
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnResult {
    pub pid: Option<u32>,
    pub status: Option<i32>,
    pub signal: Option<i32>,
    /// The child could not be started
    pub error: Option<String>,
    pub cancelled: bool,
}

impl SpawnResult {
    fn from_status(pid: Option<u32>, status: ExitStatus, cancelled: bool) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;

        Self {
            pid,
            status: status.code(),
            signal,
            error: None,
            cancelled,
        }
    }

    /// Process exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match (self.status, &self.error) {
            (Some(code), None) => code,
            _ => 1,
        }
    }

    /// Killed by SIGKILL or SIGTERM, usually memory pressure or a manual kill
    pub fn was_killed(&self) -> bool {
        #[cfg(unix)]
        {
            matches!(self.signal, Some(SIGKILL) | Some(SIGTERM))
        }
        #[cfg(not(unix))]
        {
            false
        }
    }
}

/// Run the request to completion, honoring its cancellation signal
pub async fn spawn(request: SpawnRequest) -> Result<SpawnResult, SpawnError> {
    let SpawnRequest {
        program,
        args,
        cwd,
        env,
        cancel,
    } = request;

    debug!("Spawning {} {}", program.display(), args.join(" "));

    let mut command = Command::new(&program);
    command
        .args(&args)
        .current_dir(&cwd)
        .env_clear()
        .envs(&env)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            warn!("Failed to start {}: {}", program.display(), err);
            return Ok(SpawnResult {
                error: Some(err.to_string()),
                ..SpawnResult::default()
            });
        }
    };
    let pid = child.id();

    let (status, cancelled) = tokio::select! {
        status = child.wait() => (status, false),
        _ = cancel.cancelled() => {
            warn!("Cancellation requested, stopping script (pid {:?})", pid);
            if let Err(err) = child.start_kill() {
                debug!("Kill failed, child already exited: {}", err);
            }
            (child.wait().await, true)
        }
    };

    let status = status.map_err(SpawnError::Wait)?;
    debug!("Script exited with {}", status);

    Ok(SpawnResult::from_status(pid, status, cancelled))
}
