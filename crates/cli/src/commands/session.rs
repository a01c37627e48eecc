//! `session start|stop|status` — SPEC_FULL §6 `SessionManager.createSession`/
//! `cleanupSession`.

use serde::Serialize;

use crate::cli::SessionAction;
use crate::commands::Backend;
use crate::error::Result;
use crate::output::{OutputFormat, ResultBuilder, print_result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
	pub session_id: String,
	pub tab_ids: Vec<String>,
	pub idle_secs: u64,
}

pub async fn run(backend: &Backend, action: SessionAction, format: OutputFormat) -> Result<()> {
	match action {
		SessionAction::Start { id } => {
			let data = start(backend, id).await?;
			print_result(&ResultBuilder::new("session.start").data(data).build(), format);
		}
		SessionAction::Stop { id } => {
			stop(backend, &id).await?;
			print_result(&ResultBuilder::new("session.stop").data(()).build(), format);
		}
		SessionAction::Status { id } => {
			let data = status(backend, &id).await?;
			print_result(&ResultBuilder::new("session.status").data(data).build(), format);
		}
	}
	Ok(())
}

async fn start(backend: &Backend, id: Option<String>) -> Result<SessionData> {
	match backend {
		Backend::Daemon(client) => {
			use crate::daemon::DaemonRpcClient;
			let dto = client.session_create(id).await?;
			Ok(SessionData { session_id: dto.session_id, tab_ids: dto.tab_ids, idle_secs: dto.idle_secs })
		}
		Backend::Local(core) => {
			let handle = core.acquire_session(id);
			let info = handle.info()?;
			Ok(SessionData { session_id: info.session_id, tab_ids: info.tab_ids, idle_secs: info.last_activity.elapsed().as_secs() })
		}
	}
}

async fn status(backend: &Backend, id: &str) -> Result<SessionData> {
	match backend {
		Backend::Daemon(client) => {
			use crate::daemon::DaemonRpcClient;
			let dto = client.session_status(id.to_string()).await?;
			Ok(SessionData { session_id: dto.session_id, tab_ids: dto.tab_ids, idle_secs: dto.idle_secs })
		}
		Backend::Local(core) => {
			let info = core.sessions.info(id)?;
			Ok(SessionData { session_id: info.session_id, tab_ids: info.tab_ids, idle_secs: info.last_activity.elapsed().as_secs() })
		}
	}
}

async fn stop(backend: &Backend, id: &str) -> Result<()> {
	match backend {
		Backend::Daemon(client) => {
			use crate::daemon::DaemonRpcClient;
			client.session_cleanup(id.to_string()).await?;
		}
		Backend::Local(core) => {
			core.sessions.destroy_session(id).await?;
		}
	}
	Ok(())
}
