//! `screenshot` — SPEC_FULL §6 `Tab.screenshot`. Writes the decoded image
//! bytes to the given path; the daemon path carries them as base64 over RPC
//! (`DaemonRpcServer::tab_screenshot`), the in-process path gets raw bytes
//! straight from `TabHandle::screenshot`.

use serde::Serialize;

use crate::cli::ScreenshotArgs;
use crate::commands::Backend;
use crate::error::{CliError, Result};
use crate::output::{OutputFormat, ResultBuilder, print_result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotData {
	pub path: String,
	pub bytes: usize,
}

pub async fn run(backend: &Backend, args: ScreenshotArgs, format: OutputFormat) -> Result<()> {
	let bytes = match backend {
		Backend::Daemon(client) => {
			use crate::daemon::DaemonRpcClient;
			let encoded = client.tab_screenshot(args.tab.session.clone(), args.tab.tab.clone(), args.format.clone(), args.quality).await?;
			use base64::Engine;
			base64::engine::general_purpose::STANDARD.decode(encoded).map_err(|e| CliError::InvalidInput(format!("daemon returned invalid screenshot data: {e}")))?
		}
		Backend::Local(core) => {
			let handle = core.acquire_session(Some(args.tab.session.clone()));
			let tab = handle.get_tab(&args.tab.tab)?;
			tab.screenshot(&args.format, args.quality).await?
		}
	};

	std::fs::write(&args.path, &bytes)?;

	print_result(&ResultBuilder::new("screenshot").data(ScreenshotData { path: args.path.display().to_string(), bytes: bytes.len() }).build(), format);
	Ok(())
}
