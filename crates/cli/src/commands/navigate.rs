//! `navigate` — SPEC_FULL §6 `Tab.navigate`.

use serde::Serialize;

use crate::cli::NavigateArgs;
use crate::commands::Backend;
use crate::error::Result;
use crate::output::{OutputFormat, ResultBuilder, print_result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateData {
	pub url: String,
}

pub async fn run(backend: &Backend, args: NavigateArgs, format: OutputFormat) -> Result<()> {
	match backend {
		Backend::Daemon(client) => {
			use crate::daemon::DaemonRpcClient;
			client.tab_navigate(args.tab.session.clone(), args.tab.tab.clone(), args.url.clone()).await?;
		}
		Backend::Local(core) => {
			let handle = core.acquire_session(Some(args.tab.session.clone()));
			let tab = handle.get_tab(&args.tab.tab)?;
			tab.navigate(&args.url).await?;
		}
	}
	print_result(&ResultBuilder::new("navigate").data(NavigateData { url: args.url }).build(), format);
	Ok(())
}
