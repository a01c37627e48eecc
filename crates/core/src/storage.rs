//! C12: optional per-session export/import of cookies and localStorage to a
//! disk blob (§4.12, §3 `StorageState`). Reuses the Atomic File Store for
//! the blob itself; the cookie/localStorage shapes come straight off CDP's
//! `Network` domain and an in-page read/write.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashSet;
use serde_json::json;
use tracing::{debug, warn};

use openchrome_protocol::model::{Cookie, STORAGE_STATE_SCHEMA, StorageState};
use openchrome_protocol::{Error, Result};
use openchrome_runtime::Connection;
use openchrome_runtime::profile::atomic_store::{AtomicStore, WriteOptions};

const RESTORE_DEADLINE: Duration = Duration::from_secs(10);

fn now_secs() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

/// Collects and persists a tab's cookies/localStorage, and restores them
/// back. `in_flight` is the single-flight guard keyed by the path being
/// written (§4.12 "a concurrent save is rejected internally").
pub struct StorageStateManager {
	store: AtomicStore,
	in_flight: DashSet<PathBuf>,
}

impl StorageStateManager {
	pub fn new(backups_dir: impl Into<PathBuf>) -> Self {
		Self { store: AtomicStore::new(backups_dir), in_flight: DashSet::new() }
	}

	/// §4.12 `save(tab, path)`.
	pub async fn save(&self, connection: &Connection, cdp_session_id: &str, path: &Path) -> Result<()> {
		if !self.in_flight.insert(path.to_path_buf()) {
			return Err(Error::Other(format!("a save to {} is already in progress", path.display())));
		}
		let result = self.save_inner(connection, cdp_session_id, path).await;
		self.in_flight.remove(&path.to_path_buf());
		result
	}

	async fn save_inner(&self, connection: &Connection, cdp_session_id: &str, path: &Path) -> Result<()> {
		let cookies_raw = connection.send(Some(cdp_session_id), "Network.getAllCookies", json!({})).await?;
		let cookies: Vec<Cookie> = cookies_raw.get("cookies").cloned().map(serde_json::from_value).transpose()?.unwrap_or_default();

		let local_storage = read_local_storage(connection, cdp_session_id).await;

		let state = StorageState::new(cookies, local_storage, now_secs());
		self.store.write(path, &state, WriteOptions { backup: true }).await?;
		debug!(path = %path.display(), "storage state saved");
		Ok(())
	}

	/// §4.12 `restore(tab, path)`: returns `false` (not an error) for
	/// missing/corrupted/wrong-version blobs.
	pub async fn restore(&self, connection: &Connection, cdp_session_id: &str, path: &Path) -> Result<bool> {
		tokio::time::timeout(RESTORE_DEADLINE, self.restore_inner(connection, cdp_session_id, path)).await.unwrap_or_else(|_| Err(Error::CdpTimeout { method: "storage.restore".into(), ms: RESTORE_DEADLINE.as_millis() as u64 }))
	}

	async fn restore_inner(&self, connection: &Connection, cdp_session_id: &str, path: &Path) -> Result<bool> {
		let outcome = self.store.read::<StorageState>(path).await;
		if !outcome.ok {
			return Ok(false);
		}
		let state = outcome.value.expect("ok implies value");
		if state.version != STORAGE_STATE_SCHEMA {
			return Ok(false);
		}

		let now = now_secs() as f64;
		let live_cookies: Vec<&Cookie> = state.cookies.iter().filter(|c| !c.is_expired(now)).collect();
		if !live_cookies.is_empty() {
			connection.send(Some(cdp_session_id), "Network.setCookies", json!({ "cookies": live_cookies })).await?;
		}

		if !state.local_storage.is_empty() {
			match write_local_storage(connection, cdp_session_id, &state.local_storage).await {
				Ok(()) => {}
				Err(err) if is_restricted_origin_error(&err) => debug!("skipping localStorage restore on restricted origin"),
				Err(err) => return Err(err),
			}
		}

		Ok(true)
	}

	/// §4.12 watchdog: re-saves on an interval that does not keep the
	/// process alive; errors are swallowed so a single failed resave never
	/// kills the watchdog loop.
	pub fn spawn_watchdog(self: &Arc<Self>, connection: Arc<Connection>, cdp_session_id: String, path: PathBuf, interval: Duration) {
		let manager = self.clone();
		let mut ticker = tokio::time::interval(interval);
		tokio::spawn(async move {
			loop {
				ticker.tick().await;
				if let Err(err) = manager.save(&connection, &cdp_session_id, &path).await {
					warn!(path = %path.display(), error = %err, "storage-state watchdog resave failed");
				}
			}
		});
	}
}

async fn read_local_storage(connection: &Connection, cdp_session_id: &str) -> std::collections::BTreeMap<String, String> {
	let script = r#"(() => { const out = {}; for (let i = 0; i < localStorage.length; i++) { const k = localStorage.key(i); out[k] = localStorage.getItem(k); } return out; })()"#;
	let result = connection.send(Some(cdp_session_id), "Runtime.evaluate", json!({ "expression": script, "returnByValue": true, "awaitPromise": true })).await;
	match result {
		Ok(value) => value.get("result").and_then(|r| r.get("value")).and_then(|v| serde_json::from_value(v.clone()).ok()).unwrap_or_default(),
		Err(_) => Default::default(),
	}
}

async fn write_local_storage(connection: &Connection, cdp_session_id: &str, entries: &std::collections::BTreeMap<String, String>) -> Result<()> {
	let payload = serde_json::to_string(entries)?;
	let script = format!("(() => {{ const entries = {payload}; for (const k in entries) localStorage.setItem(k, entries[k]); }})()");
	connection.send(Some(cdp_session_id), "Runtime.evaluate", json!({ "expression": script, "awaitPromise": true })).await?;
	Ok(())
}

fn is_restricted_origin_error(err: &Error) -> bool {
	matches!(err, Error::CdpProtocol(msg) if msg.to_ascii_lowercase().contains("cannot access") || msg.to_ascii_lowercase().contains("restricted"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn restricted_origin_error_is_recognized() {
		let err = Error::CdpProtocol("Cannot access a chrome:// url".into());
		assert!(is_restricted_origin_error(&err));
		let other = Error::CdpProtocol("boom".into());
		assert!(!is_restricted_origin_error(&other));
	}

	#[test]
	fn expired_cookie_filter_matches_model_semantics() {
		let now = 2_000.0;
		let expired = Cookie { name: "a".into(), value: "1".into(), domain: "x".into(), path: "/".into(), expires: 1_000.0, http_only: false, secure: false, same_site: None };
		let session = Cookie { name: "b".into(), value: "2".into(), domain: "x".into(), path: "/".into(), expires: -1.0, http_only: false, secure: false, same_site: None };
		assert!(expired.is_expired(now));
		assert!(!session.is_expired(now));
	}
}
