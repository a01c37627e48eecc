//! `click` — find + mutate composed with `Delta.withDelta` (C9 + C10),
//! SPEC_FULL §6 "find an element and click it, reporting the DOM delta."

use serde::Serialize;

use openchrome_core::{DeltaOptions, MutateAction};

use crate::cli::ClickArgs;
use crate::commands::Backend;
use crate::error::Result;
use crate::output::{OutputFormat, ResultBuilder, print_result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickData {
	pub result: serde_json::Value,
	pub delta: String,
}

pub async fn run(backend: &Backend, args: ClickArgs, format: OutputFormat) -> Result<()> {
	let data = match backend {
		Backend::Daemon(client) => {
			use crate::daemon::DaemonRpcClient;
			let dto = client.delta_click(args.tab.session.clone(), args.tab.tab.clone(), args.query.clone(), args.max_chars).await?;
			ClickData { result: dto.result, delta: dto.delta }
		}
		Backend::Local(core) => {
			let handle = core.acquire_session(Some(args.tab.session.clone()));
			let tab = handle.get_tab(&args.tab.tab)?;
			let (reference, _found) = tab.find(&args.query).await?;
			let action = MutateAction::Click { reference };
			let (result, delta) = tab.mutate_with_delta(action, DeltaOptions::with_max_chars(args.max_chars)).await?;
			ClickData { result, delta }
		}
	};

	print_result(&ResultBuilder::new("click").data(data).build(), format);
	Ok(())
}
