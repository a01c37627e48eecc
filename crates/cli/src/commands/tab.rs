//! `tab new|list` — SPEC_FULL §6 `SessionManager.createTab`/pool introspection.

use serde::Serialize;

use crate::cli::TabAction;
use crate::commands::Backend;
use crate::error::Result;
use crate::output::{OutputFormat, ResultBuilder, print_result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabData {
	pub tab_id: String,
	pub worker_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabListData {
	pub tab_ids: Vec<String>,
}

pub async fn run(backend: &Backend, action: TabAction, format: OutputFormat) -> Result<()> {
	match action {
		TabAction::New { session, url, worker } => {
			let data = new_tab(backend, &session, url, worker).await?;
			print_result(&ResultBuilder::new("tab.new").data(data).build(), format);
		}
		TabAction::List { session } => {
			let data = list(backend, &session).await?;
			print_result(&ResultBuilder::new("tab.list").data(data).build(), format);
		}
	}
	Ok(())
}

async fn new_tab(backend: &Backend, session: &str, url: Option<String>, worker: Option<String>) -> Result<TabData> {
	match backend {
		Backend::Daemon(client) => {
			use crate::daemon::DaemonRpcClient;
			let dto = client.tab_create(session.to_string(), url, worker).await?;
			Ok(TabData { tab_id: dto.tab_id, worker_id: dto.worker_id })
		}
		Backend::Local(core) => {
			let handle = core.acquire_session(Some(session.to_string()));
			let tab = handle.create_tab(url.as_deref(), worker.as_deref()).await?;
			Ok(TabData { tab_id: tab.tab_id().to_string(), worker_id: tab.worker_id().to_string() })
		}
	}
}

async fn list(backend: &Backend, session: &str) -> Result<TabListData> {
	match backend {
		Backend::Daemon(client) => {
			use crate::daemon::DaemonRpcClient;
			let dto = client.session_status(session.to_string()).await?;
			Ok(TabListData { tab_ids: dto.tab_ids })
		}
		Backend::Local(core) => {
			let info = core.sessions.info(session)?;
			Ok(TabListData { tab_ids: info.tab_ids })
		}
	}
}
