//! Builds HTTP RPC clients against the daemon's fixed loopback port.
//! Grounded on the teacher's `daemon/client.rs` probe/full client split
//! (the probe has a short timeout so a one-shot CLI invocation doesn't hang
//! when no daemon is running).

use std::time::Duration;

use jsonrpsee::core::ClientError;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};

use super::DAEMON_TCP_PORT;

const PROBE_TIMEOUT: Duration = Duration::from_millis(300);

pub fn connect_probe_client() -> anyhow::Result<HttpClient> {
	let url = format!("http://127.0.0.1:{DAEMON_TCP_PORT}");
	Ok(HttpClientBuilder::default().request_timeout(PROBE_TIMEOUT).build(url)?)
}

pub fn connect_client() -> anyhow::Result<HttpClient> {
	let url = format!("http://127.0.0.1:{DAEMON_TCP_PORT}");
	Ok(HttpClientBuilder::default().build(url)?)
}

/// Whether `err` indicates "nothing is listening" rather than a real RPC
/// failure, so callers can fall back to an in-process `Core` silently.
pub fn is_not_running_error(err: &ClientError) -> bool {
	matches!(err, ClientError::Transport(_))
}
