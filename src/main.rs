//! kickstart - zero-config build, start and test commands for frontend projects
//!
//! Resolves project paths, the public URL and the layered `.env` environment,
//! then hands off to the matching script under the host runtime.

use anyhow::{Context, Result};
use tracing::warn;

use kickstart_lib::cli::{print_banner, print_failure, print_outcome};
use kickstart_lib::error::{ArgsError, Error};
use kickstart_lib::{CancelSignal, Invocation, Orchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    let cancel = CancelSignal::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted");
            trigger.cancel();
        }
    });

    print_banner();
    let invocation = Invocation::from_os().context("Failed to read the working directory")?;

    let outcome = Orchestrator::new(cancel)
        .with_logging()
        .run(invocation)
        .await;

    let code = match outcome {
        Ok(result) => {
            print_outcome(&result);
            result.exit_code()
        }
        Err(Error::Args(ArgsError::Display(text))) => {
            println!("{}", text);
            0
        }
        Err(err) => {
            print_failure(&anyhow::Error::from(err));
            1
        }
    };

    std::process::exit(code);
}
