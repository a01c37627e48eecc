//! The daemon's JSON-RPC method surface (SPEC_FULL §6 "Daemon RPC methods"):
//! each method is a 1:1 forwarding call onto a `SessionManager`/`DOM`/
//! `Finder`/`Delta`/`Storage` surface, per the core spec's own framing of
//! RPC handlers as "thin handlers that route to the core." Grounded on the
//! teacher's `daemon/rpc.rs` (`#[rpc(client, server)]` trait, wire DTOs kept
//! separate from the in-process types they mirror).

use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;
use serde::{Deserialize, Serialize};

/// Wire mirror of `openchrome_core::SessionInfo` (not `Serialize` itself,
/// since it carries `std::time::Instant`s).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfoDto {
	pub session_id: String,
	pub tab_ids: Vec<String>,
	pub idle_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabCreateResult {
	pub tab_id: String,
	pub worker_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageStatsDto {
	pub url: String,
	pub title: String,
	pub scroll_x: f64,
	pub scroll_y: f64,
	pub viewport_width: f64,
	pub viewport_height: f64,
	pub scroll_width: f64,
	pub scroll_height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializeResultDto {
	pub content: String,
	pub page_stats: Option<PageStatsDto>,
	pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SerializeOptionsDto {
	pub max_depth: i64,
	pub max_output_chars: usize,
	pub include_page_stats: bool,
	pub pierce_iframes: bool,
	pub interactive_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoundElementDto {
	#[serde(rename = "ref")]
	pub reference: String,
	pub role: String,
	pub name: String,
	pub tag: String,
	pub score: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaResultDto {
	pub result: serde_json::Value,
	pub delta: String,
}

#[rpc(client, server)]
pub trait DaemonRpc {
	#[method(name = "ping")]
	async fn ping(&self) -> RpcResult<bool>;

	#[method(name = "session_create")]
	async fn session_create(&self, id: Option<String>) -> RpcResult<SessionInfoDto>;

	#[method(name = "session_status")]
	async fn session_status(&self, session_id: String) -> RpcResult<SessionInfoDto>;

	#[method(name = "session_cleanup")]
	async fn session_cleanup(&self, session_id: String) -> RpcResult<()>;

	#[method(name = "tab_create")]
	async fn tab_create(&self, session_id: String, url: Option<String>, worker_id: Option<String>) -> RpcResult<TabCreateResult>;

	#[method(name = "tab_get")]
	async fn tab_get(&self, session_id: String, tab_id: String) -> RpcResult<TabCreateResult>;

	#[method(name = "tab_navigate")]
	async fn tab_navigate(&self, session_id: String, tab_id: String, url: String) -> RpcResult<()>;

	#[method(name = "tab_eval")]
	async fn tab_eval(&self, session_id: String, tab_id: String, expression: String) -> RpcResult<serde_json::Value>;

	#[method(name = "tab_screenshot")]
	async fn tab_screenshot(&self, session_id: String, tab_id: String, format: String, quality: Option<u8>) -> RpcResult<String>;

	#[method(name = "dom_serialize")]
	async fn dom_serialize(&self, session_id: String, tab_id: String, opts: SerializeOptionsDto) -> RpcResult<SerializeResultDto>;

	#[method(name = "finder_find")]
	async fn finder_find(&self, session_id: String, tab_id: String, query: String) -> RpcResult<FoundElementDto>;

	#[method(name = "delta_click")]
	async fn delta_click(&self, session_id: String, tab_id: String, query: String, max_chars: usize) -> RpcResult<DeltaResultDto>;

	#[method(name = "storage_save")]
	async fn storage_save(&self, session_id: String, tab_id: String, path: String) -> RpcResult<()>;

	#[method(name = "storage_restore")]
	async fn storage_restore(&self, session_id: String, tab_id: String, path: String) -> RpcResult<bool>;

	#[method(name = "shutdown")]
	async fn shutdown(&self) -> RpcResult<()>;
}
