//! Hosts one `openchrome_core::Core` (one shared Chrome process, one pool,
//! one session manager) behind a local JSON-RPC server so repeated
//! short-lived CLI invocations reuse it (SPEC_FULL §1, §6 "Daemon / RPC
//! surface"). Grounded on the teacher's `daemon/server.rs` (`ServerBuilder`
//! bind + signal-driven shutdown loop), generalized from "one browser per
//! leased port" to "one `Core`, many logical sessions."

use std::sync::Arc;

use jsonrpsee::core::{RpcResult, async_trait};
use jsonrpsee::server::ServerBuilder;
use jsonrpsee::types::error::ErrorObjectOwned;
use tokio::sync::watch;
use tracing::info;

use openchrome_core::{Core, SerializeOptions};
use openchrome_protocol::Error;

use super::DAEMON_TCP_PORT;
use super::rpc::{DaemonRpcServer, DeltaResultDto, FoundElementDto, PageStatsDto, SerializeOptionsDto, SerializeResultDto, SessionInfoDto, TabCreateResult};

const RPC_CORE_ERROR: i32 = -32050;

struct DaemonRpcHandler {
	core: Arc<Core>,
	shutdown_tx: watch::Sender<bool>,
}

#[async_trait]
impl DaemonRpcServer for DaemonRpcHandler {
	async fn ping(&self) -> RpcResult<bool> {
		Ok(true)
	}

	async fn session_create(&self, id: Option<String>) -> RpcResult<SessionInfoDto> {
		let handle = self.core.acquire_session(id);
		let info = handle.info().map_err(to_rpc_err)?;
		Ok(to_session_dto(info))
	}

	async fn session_status(&self, session_id: String) -> RpcResult<SessionInfoDto> {
		let info = self.core.sessions.info(&session_id).map_err(to_rpc_err)?;
		Ok(to_session_dto(info))
	}

	async fn session_cleanup(&self, session_id: String) -> RpcResult<()> {
		self.core.sessions.destroy_session(&session_id).await.map_err(to_rpc_err)
	}

	async fn tab_create(&self, session_id: String, url: Option<String>, worker_id: Option<String>) -> RpcResult<TabCreateResult> {
		let handle = self.core.acquire_session(Some(session_id));
		let tab = handle.create_tab(url.as_deref(), worker_id.as_deref()).await.map_err(to_rpc_err)?;
		Ok(TabCreateResult { tab_id: tab.tab_id().to_string(), worker_id: tab.worker_id().to_string() })
	}

	async fn tab_get(&self, session_id: String, tab_id: String) -> RpcResult<TabCreateResult> {
		let handle = self.core.acquire_session(Some(session_id));
		let tab = handle.get_tab(&tab_id).map_err(to_rpc_err)?;
		Ok(TabCreateResult { tab_id: tab.tab_id().to_string(), worker_id: tab.worker_id().to_string() })
	}

	async fn tab_navigate(&self, session_id: String, tab_id: String, url: String) -> RpcResult<()> {
		let handle = self.core.acquire_session(Some(session_id));
		let tab = handle.get_tab(&tab_id).map_err(to_rpc_err)?;
		tab.navigate(&url).await.map_err(to_rpc_err)
	}

	async fn tab_eval(&self, session_id: String, tab_id: String, expression: String) -> RpcResult<serde_json::Value> {
		let handle = self.core.acquire_session(Some(session_id));
		let tab = handle.get_tab(&tab_id).map_err(to_rpc_err)?;
		tab.evaluate(&expression).await.map_err(to_rpc_err)
	}

	async fn tab_screenshot(&self, session_id: String, tab_id: String, format: String, quality: Option<u8>) -> RpcResult<String> {
		let handle = self.core.acquire_session(Some(session_id));
		let tab = handle.get_tab(&tab_id).map_err(to_rpc_err)?;
		let bytes = tab.screenshot(&format, quality).await.map_err(to_rpc_err)?;
		use base64::Engine;
		Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
	}

	async fn dom_serialize(&self, session_id: String, tab_id: String, opts: SerializeOptionsDto) -> RpcResult<SerializeResultDto> {
		let handle = self.core.acquire_session(Some(session_id));
		let tab = handle.get_tab(&tab_id).map_err(to_rpc_err)?;
		let result = tab.serialize(&from_opts_dto(opts)).await.map_err(to_rpc_err)?;
		Ok(to_serialize_dto(result))
	}

	async fn finder_find(&self, session_id: String, tab_id: String, query: String) -> RpcResult<FoundElementDto> {
		let handle = self.core.acquire_session(Some(session_id));
		let tab = handle.get_tab(&tab_id).map_err(to_rpc_err)?;
		let (reference, found) = tab.find(&query).await.map_err(to_rpc_err)?;
		Ok(FoundElementDto { reference, role: found.candidate.role, name: found.candidate.name, tag: found.candidate.tag, score: found.score })
	}

	async fn delta_click(&self, session_id: String, tab_id: String, query: String, max_chars: usize) -> RpcResult<DeltaResultDto> {
		let handle = self.core.acquire_session(Some(session_id));
		let tab = handle.get_tab(&tab_id).map_err(to_rpc_err)?;
		let (reference, _found) = tab.find(&query).await.map_err(to_rpc_err)?;
		let action = openchrome_core::MutateAction::Click { reference };
		let (result, delta) = tab.mutate_with_delta(action, openchrome_core::DeltaOptions::with_max_chars(max_chars)).await.map_err(to_rpc_err)?;
		Ok(DeltaResultDto { result, delta })
	}

	async fn storage_save(&self, session_id: String, tab_id: String, path: String) -> RpcResult<()> {
		let handle = self.core.acquire_session(Some(session_id));
		handle.save_storage(&tab_id, std::path::Path::new(&path)).await.map_err(to_rpc_err)
	}

	async fn storage_restore(&self, session_id: String, tab_id: String, path: String) -> RpcResult<bool> {
		let handle = self.core.acquire_session(Some(session_id));
		handle.restore_storage(&tab_id, std::path::Path::new(&path)).await.map_err(to_rpc_err)
	}

	async fn shutdown(&self) -> RpcResult<()> {
		self.core.shutdown().await;
		let _ = self.shutdown_tx.send(true);
		Ok(())
	}
}

pub struct Daemon {
	core: Arc<Core>,
	shutdown_tx: watch::Sender<bool>,
	shutdown_rx: watch::Receiver<bool>,
}

impl Daemon {
	pub async fn start(config: openchrome_core::Config) -> anyhow::Result<Self> {
		let core = Core::bootstrap(config).await?;
		let (shutdown_tx, shutdown_rx) = watch::channel(false);
		Ok(Self { core, shutdown_tx, shutdown_rx })
	}

	pub async fn run(mut self) -> anyhow::Result<()> {
		let addr = format!("127.0.0.1:{DAEMON_TCP_PORT}");
		let server = ServerBuilder::default().build(&addr).await?;

		let rpc = DaemonRpcHandler { core: self.core.clone(), shutdown_tx: self.shutdown_tx.clone() };
		let handle = server.start(rpc.into_rpc());
		info!(addr, "daemon listening");

		#[cfg(unix)]
		{
			use tokio::signal::unix::{SignalKind, signal};

			let mut sigterm = signal(SignalKind::terminate())?;
			let mut sigint = signal(SignalKind::interrupt())?;

			loop {
				tokio::select! {
					_ = self.shutdown_rx.changed() => {
						if *self.shutdown_rx.borrow() {
							info!("shutdown requested via RPC");
							break;
						}
					}
					_ = sigterm.recv() => {
						info!("received SIGTERM, shutting down");
						self.core.shutdown().await;
						break;
					}
					_ = sigint.recv() => {
						info!("received SIGINT, shutting down");
						self.core.shutdown().await;
						break;
					}
				}
			}
		}

		#[cfg(windows)]
		{
			loop {
				tokio::select! {
					_ = self.shutdown_rx.changed() => {
						if *self.shutdown_rx.borrow() {
							info!("shutdown requested via RPC");
							break;
						}
					}
					_ = tokio::signal::ctrl_c() => {
						info!("received Ctrl+C, shutting down");
						self.core.shutdown().await;
						break;
					}
				}
			}
		}

		let _ = handle.stop();
		handle.stopped().await;
		Ok(())
	}
}

fn to_rpc_err(err: Error) -> ErrorObjectOwned {
	ErrorObjectOwned::owned(RPC_CORE_ERROR, err.to_string(), Some(serde_json::json!({ "kind": err.kind() })))
}

fn to_session_dto(info: openchrome_core::SessionInfo) -> SessionInfoDto {
	SessionInfoDto { session_id: info.session_id, tab_ids: info.tab_ids, idle_secs: info.last_activity.elapsed().as_secs() }
}

fn from_opts_dto(dto: SerializeOptionsDto) -> SerializeOptions {
	SerializeOptions { max_depth: dto.max_depth, max_output_chars: dto.max_output_chars, include_page_stats: dto.include_page_stats, pierce_iframes: dto.pierce_iframes, interactive_only: dto.interactive_only }
}

fn to_serialize_dto(result: openchrome_core::SerializeResult) -> SerializeResultDto {
	SerializeResultDto {
		content: result.content,
		truncated: result.truncated,
		page_stats: result.page_stats.map(|s| PageStatsDto { url: s.url, title: s.title, scroll_x: s.scroll_x, scroll_y: s.scroll_y, viewport_width: s.viewport_width, viewport_height: s.viewport_height, scroll_width: s.scroll_width, scroll_height: s.scroll_height }),
	}
}
