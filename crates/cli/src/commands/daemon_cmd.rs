//! `daemon start|stop|status` — manages the background process that hosts
//! one shared `Core` across invocations (SPEC_FULL §6 "Daemon / RPC
//! surface"). Grounded on the teacher's own `daemon` subcommand handling in
//! `commands/dispatch.rs`.

use serde::Serialize;

use crate::cli::DaemonAction;
use crate::daemon::{Daemon, DaemonRpcClient};
use crate::error::{CliError, Result};
use crate::output::{OutputFormat, ResultBuilder, print_result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonStatusData {
	pub running: bool,
}

pub async fn run(action: DaemonAction, format: OutputFormat) -> Result<()> {
	match action {
		DaemonAction::Start => start().await,
		DaemonAction::Stop => stop(format).await,
		DaemonAction::Status => status(format).await,
	}
}

/// Runs in the foreground until it receives a shutdown RPC or a termination
/// signal; callers background it with their shell's own job control.
async fn start() -> Result<()> {
	let config = openchrome_core::Config::from_env();
	let daemon = Daemon::start(config).await.map_err(CliError::Anyhow)?;
	daemon.run().await.map_err(CliError::Anyhow)?;
	Ok(())
}

async fn stop(format: OutputFormat) -> Result<()> {
	match crate::daemon::try_connect().await {
		Some(client) => {
			client.shutdown().await?;
			print_result(&ResultBuilder::new("daemon.stop").data(()).build(), format);
		}
		None => {
			print_result(&ResultBuilder::new("daemon.stop").data(()).build(), format);
		}
	}
	Ok(())
}

async fn status(format: OutputFormat) -> Result<()> {
	let running = crate::daemon::try_connect().await.is_some();
	print_result(&ResultBuilder::new("daemon.status").data(DaemonStatusData { running }).build(), format);
	Ok(())
}
