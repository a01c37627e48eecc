//! `storage save|restore` — SPEC_FULL §6 Storage State (C12).

use serde::Serialize;

use crate::cli::StorageAction;
use crate::commands::Backend;
use crate::error::Result;
use crate::output::{OutputFormat, ResultBuilder, print_result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSaveData {
	pub path: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageRestoreData {
	pub restored: bool,
}

pub async fn run(backend: &Backend, action: StorageAction, format: OutputFormat) -> Result<()> {
	match action {
		StorageAction::Save { tab, path } => {
			let path_str = path.display().to_string();
			match backend {
				Backend::Daemon(client) => {
					use crate::daemon::DaemonRpcClient;
					client.storage_save(tab.session.clone(), tab.tab.clone(), path_str.clone()).await?;
				}
				Backend::Local(core) => {
					let handle = core.acquire_session(Some(tab.session.clone()));
					handle.save_storage(&tab.tab, &path).await?;
				}
			}
			print_result(&ResultBuilder::new("storage.save").data(StorageSaveData { path: path_str }).build(), format);
		}
		StorageAction::Restore { tab, path } => {
			let path_str = path.display().to_string();
			let restored = match backend {
				Backend::Daemon(client) => {
					use crate::daemon::DaemonRpcClient;
					client.storage_restore(tab.session.clone(), tab.tab.clone(), path_str).await?
				}
				Backend::Local(core) => {
					let handle = core.acquire_session(Some(tab.session.clone()));
					handle.restore_storage(&tab.tab, &path).await?
				}
			};
			print_result(&ResultBuilder::new("storage.restore").data(StorageRestoreData { restored }).build(), format);
		}
	}
	Ok(())
}
