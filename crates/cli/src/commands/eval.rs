//! `eval` — SPEC_FULL §6 `Tab.evaluate`.

use serde::Serialize;

use crate::cli::EvalArgs;
use crate::commands::Backend;
use crate::error::Result;
use crate::output::{OutputFormat, ResultBuilder, print_result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalData {
	pub value: serde_json::Value,
}

pub async fn run(backend: &Backend, args: EvalArgs, format: OutputFormat) -> Result<()> {
	let value = match backend {
		Backend::Daemon(client) => {
			use crate::daemon::DaemonRpcClient;
			client.tab_eval(args.tab.session.clone(), args.tab.tab.clone(), args.expression.clone()).await?
		}
		Backend::Local(core) => {
			let handle = core.acquire_session(Some(args.tab.session.clone()));
			let tab = handle.get_tab(&args.tab.tab)?;
			tab.evaluate(&args.expression).await?
		}
	};
	print_result(&ResultBuilder::new("eval").data(EvalData { value }).build(), format);
	Ok(())
}
