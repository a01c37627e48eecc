//! `find` — SPEC_FULL §6 `Finder.findBest` (C9), returning a stable ref a
//! later `click` invocation can act on without re-harvesting.

use serde::Serialize;

use crate::cli::FindArgs;
use crate::commands::Backend;
use crate::error::Result;
use crate::output::{OutputFormat, ResultBuilder, print_result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindData {
	#[serde(rename = "ref")]
	pub reference: String,
	pub role: String,
	pub name: String,
	pub tag: String,
	pub score: i32,
}

pub async fn run(backend: &Backend, args: FindArgs, format: OutputFormat) -> Result<()> {
	let data = match backend {
		Backend::Daemon(client) => {
			use crate::daemon::DaemonRpcClient;
			let dto = client.finder_find(args.tab.session.clone(), args.tab.tab.clone(), args.query.clone()).await?;
			FindData { reference: dto.reference, role: dto.role, name: dto.name, tag: dto.tag, score: dto.score }
		}
		Backend::Local(core) => {
			let handle = core.acquire_session(Some(args.tab.session.clone()));
			let tab = handle.get_tab(&args.tab.tab)?;
			let (reference, found) = tab.find(&args.query).await?;
			FindData { reference, role: found.candidate.role, name: found.candidate.name, tag: found.candidate.tag, score: found.score }
		}
	};

	print_result(&ResultBuilder::new("find").data(data).build(), format);
	Ok(())
}
