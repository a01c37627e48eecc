//! A1 (SPEC_FULL §2, §6): the daemon hosts one shared `Core`; the CLI is a
//! client of it when reachable, or drives an in-process `Core` for one-shot
//! use. Grounded on the teacher's `daemon/mod.rs` thin re-export surface.

mod client;
pub(crate) mod rpc;
mod server;

pub use rpc::DaemonRpcClient;
pub use server::Daemon;

pub const DAEMON_TCP_PORT: u16 = 19223;

/// Probes for a running daemon; returns `None` (never an error) if nothing
/// is listening, so every call site can fall back to an in-process `Core`.
pub async fn try_connect() -> Option<jsonrpsee::http_client::HttpClient> {
	let probe = client::connect_probe_client().ok()?;
	match probe.ping().await {
		Ok(true) => client::connect_client().ok(),
		Ok(false) => None,
		Err(err) if client::is_not_running_error(&err) => None,
		Err(_) => None,
	}
}
