//! `read` — SPEC_FULL §6 `DOM.serialize` (C8).

use serde::Serialize;

use openchrome_core::SerializeOptions;

use crate::cli::ReadArgs;
use crate::commands::Backend;
use crate::daemon::rpc::SerializeOptionsDto;
use crate::error::Result;
use crate::output::{OutputFormat, ResultBuilder, print_result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageStatsData {
	pub url: String,
	pub title: String,
	pub scroll_x: f64,
	pub scroll_y: f64,
	pub viewport_width: f64,
	pub viewport_height: f64,
	pub scroll_width: f64,
	pub scroll_height: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadData {
	pub content: String,
	pub truncated: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub page_stats: Option<PageStatsData>,
}

pub async fn run(backend: &Backend, args: ReadArgs, format: OutputFormat) -> Result<()> {
	let include_page_stats = !args.no_page_stats;
	let pierce_iframes = !args.no_pierce_iframes;

	let data = match backend {
		Backend::Daemon(client) => {
			use crate::daemon::DaemonRpcClient;
			let opts = SerializeOptionsDto {
				max_depth: args.max_depth,
				max_output_chars: args.max_output_chars,
				include_page_stats,
				pierce_iframes,
				interactive_only: args.interactive_only,
			};
			let dto = client.dom_serialize(args.tab.session.clone(), args.tab.tab.clone(), opts).await?;
			ReadData {
				content: dto.content,
				truncated: dto.truncated,
				page_stats: dto.page_stats.map(|s| PageStatsData {
					url: s.url,
					title: s.title,
					scroll_x: s.scroll_x,
					scroll_y: s.scroll_y,
					viewport_width: s.viewport_width,
					viewport_height: s.viewport_height,
					scroll_width: s.scroll_width,
					scroll_height: s.scroll_height,
				}),
			}
		}
		Backend::Local(core) => {
			let handle = core.acquire_session(Some(args.tab.session.clone()));
			let tab = handle.get_tab(&args.tab.tab)?;
			let opts = SerializeOptions {
				max_depth: args.max_depth,
				max_output_chars: args.max_output_chars,
				include_page_stats,
				pierce_iframes,
				interactive_only: args.interactive_only,
			};
			let result = tab.serialize(&opts).await?;
			ReadData {
				content: result.content,
				truncated: result.truncated,
				page_stats: result.page_stats.map(|s| PageStatsData {
					url: s.url,
					title: s.title,
					scroll_x: s.scroll_x,
					scroll_y: s.scroll_y,
					viewport_width: s.viewport_width,
					viewport_height: s.viewport_height,
					scroll_width: s.scroll_width,
					scroll_height: s.scroll_height,
				}),
			}
		}
	};

	print_result(&ResultBuilder::new("read").data(data).build(), format);
	Ok(())
}
