//! C5: keeps a reservoir of ready CDP tabs so acquiring one rarely pays the
//! cost of a fresh `Target.createTarget` round trip (§4.5). Shared across
//! every session, so the available/in-use bookkeeping lives behind a single
//! lock, the same shape as the teacher's `BrowserPool` instance map.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, info, warn};

use openchrome_protocol::Result;
use openchrome_runtime::Connection;

use crate::config::PoolConfig;

/// A pooled tab, tracked outside of any session's ownership.
struct PooledTab {
	tab_id: String,
	target_id: String,
	cdp_session_id: String,
	last_used: Instant,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStats {
	pub available: usize,
	pub in_use: usize,
	pub total_created: u64,
	pub reused: u64,
	pub created_on_demand: u64,
	pub average_acquire_ms: f64,
}

struct Inner {
	available: VecDeque<PooledTab>,
	in_use: std::collections::HashSet<String>,
	total_created: u64,
	reused: u64,
	created_on_demand: u64,
	acquire_samples: VecDeque<u64>,
}

impl Inner {
	fn new() -> Self {
		Self { available: VecDeque::new(), in_use: std::collections::HashSet::new(), total_created: 0, reused: 0, created_on_demand: 0, acquire_samples: VecDeque::new() }
	}

	fn record_acquire(&mut self, millis: u64) {
		self.acquire_samples.push_back(millis);
		if self.acquire_samples.len() > 100 {
			self.acquire_samples.pop_front();
		}
	}

	fn average_acquire_ms(&self) -> f64 {
		if self.acquire_samples.is_empty() {
			return 0.0;
		}
		self.acquire_samples.iter().sum::<u64>() as f64 / self.acquire_samples.len() as f64
	}
}

/// A tab handle checked out of the pool. `tab_id` is the externally visible
/// handle (equal to `target_id`, §3 `Tab`); `cdp_session_id` is the flat-mode
/// session id from `Target.attachToTarget`, which is what `Connection::send`
/// actually routes on.
#[derive(Debug, Clone)]
pub struct PooledHandle {
	pub tab_id: String,
	pub target_id: String,
	pub cdp_session_id: String,
}

/// The shared reservoir of ready tabs (§4.5).
pub struct TabPool {
	connection: Arc<Connection>,
	config: PoolConfig,
	inner: Mutex<Inner>,
}

impl TabPool {
	pub fn new(connection: Arc<Connection>, config: PoolConfig) -> Arc<Self> {
		let pool = Arc::new(Self { connection, config, inner: Mutex::new(Inner::new()) });
		if pool.config.pre_warm {
			let pool = pool.clone();
			tokio::spawn(async move {
				pool.top_up().await;
			});
		}
		pool
	}

	/// §4.5 acquire(): pop the most-recently-used pooled tab, or create one
	/// on demand. Kicks off a background top-up after every acquire.
	pub async fn acquire(self: &Arc<Self>) -> Result<PooledHandle> {
		let started = Instant::now();

		let popped = {
			let mut inner = self.inner.lock();
			inner.available.pop_back()
		};

		let handle = if let Some(tab) = popped {
			let mut inner = self.inner.lock();
			inner.in_use.insert(tab.tab_id.clone());
			inner.reused += 1;
			debug!(tab_id = tab.tab_id, "reused pooled tab");
			PooledHandle { tab_id: tab.tab_id, target_id: tab.target_id, cdp_session_id: tab.cdp_session_id }
		} else {
			let handle = self.create_tab().await?;
			let mut inner = self.inner.lock();
			inner.in_use.insert(handle.tab_id.clone());
			inner.created_on_demand += 1;
			handle
		};

		let elapsed_ms = started.elapsed().as_millis() as u64;
		self.inner.lock().record_acquire(elapsed_ms);

		let pool = self.clone();
		tokio::spawn(async move {
			pool.top_up().await;
		});

		Ok(handle)
	}

	/// §4.5 release(tab): close it outright at capacity, otherwise reset and
	/// return it to the pool. Any reset failure closes the tab instead.
	pub async fn release(self: &Arc<Self>, handle: PooledHandle) {
		{
			let mut inner = self.inner.lock();
			inner.in_use.remove(&handle.tab_id);
		}

		let at_capacity = self.inner.lock().available.len() >= self.config.max_pool_size;
		if at_capacity {
			self.close_tab(&handle).await;
			return;
		}

		match self.reset_tab(&handle).await {
			Ok(()) => {
				let mut inner = self.inner.lock();
				inner.available.push_back(PooledTab { tab_id: handle.tab_id, target_id: handle.target_id, cdp_session_id: handle.cdp_session_id, last_used: Instant::now() });
			}
			Err(err) => {
				warn!(tab_id = handle.tab_id, error = %err, "tab reset failed, closing instead of pooling");
				self.close_tab(&handle).await;
			}
		}
	}

	/// §4.5 maintenance: run every `maintenance_interval` on an unrefed
	/// timer, closing tabs idle past `page_idle_timeout` without dropping
	/// below `min_pool_size`.
	pub fn spawn_maintenance(self: &Arc<Self>) {
		let pool = self.clone();
		let mut ticker = tokio::time::interval(pool.config.maintenance_interval);
		tokio::spawn(async move {
			loop {
				ticker.tick().await;
				pool.run_maintenance().await;
			}
		});
	}

	async fn run_maintenance(self: &Arc<Self>) {
		let stale: Vec<PooledHandle> = {
			let mut inner = self.inner.lock();
			let now = Instant::now();
			let keep_at_least = self.config.min_pool_size;
			let mut victims = Vec::new();
			let mut kept = VecDeque::new();
			while let Some(tab) = inner.available.pop_front() {
				let idle_too_long = now.duration_since(tab.last_used) > self.config.page_idle_timeout;
				if idle_too_long && kept.len() + inner.available.len() >= keep_at_least {
					victims.push(PooledHandle { tab_id: tab.tab_id.clone(), target_id: tab.target_id.clone(), cdp_session_id: tab.cdp_session_id.clone() });
				} else {
					kept.push_back(tab);
				}
			}
			inner.available = kept;
			victims
		};

		for handle in stale {
			self.close_tab(&handle).await;
		}
	}

	async fn top_up(self: &Arc<Self>) {
		loop {
			let need_more = {
				let inner = self.inner.lock();
				inner.available.len() < self.config.min_pool_size
			};
			if !need_more {
				return;
			}
			match self.create_tab().await {
				Ok(handle) => {
					let mut inner = self.inner.lock();
					inner.available.push_back(PooledTab { tab_id: handle.tab_id, target_id: handle.target_id, cdp_session_id: handle.cdp_session_id, last_used: Instant::now() });
				}
				Err(err) => {
					warn!(error = %err, "pool top-up failed to create a tab");
					return;
				}
			}
		}
	}

	/// The tab id handed out to callers is the CDP target id itself (§3
	/// `Tab`: "opaque tab identifier (matches the underlying CDP target
	/// id)"), not a separately generated id. The attach step's `sessionId`
	/// is kept alongside it since every later `Connection::send` routes on
	/// that, not on the target id.
	async fn create_tab(&self) -> Result<PooledHandle> {
		let result = self.connection.send(None, "Target.createTarget", json!({ "url": "about:blank" })).await?;
		let target_id = result.get("targetId").and_then(|v| v.as_str()).unwrap_or_default().to_string();

		let attach = self.connection.send(None, "Target.attachToTarget", json!({ "targetId": target_id, "flatten": true })).await?;
		let cdp_session_id = attach.get("sessionId").and_then(|v| v.as_str()).unwrap_or_default().to_string();

		{
			let mut inner = self.inner.lock();
			inner.total_created += 1;
		}
		info!(target_id, "created new tab");
		Ok(PooledHandle { tab_id: target_id.clone(), target_id, cdp_session_id })
	}

	async fn close_tab(&self, handle: &PooledHandle) {
		if let Err(err) = self.connection.send(None, "Target.closeTarget", json!({ "targetId": handle.target_id })).await {
			warn!(tab_id = handle.tab_id, error = %err, "failed to close tab target");
		}
	}

	/// Navigate to a blank page, clear cookies, and clear per-origin storage
	/// (§4.5 release reset steps). `not supported` failures on uncommon
	/// storage types are swallowed; anything else propagates so the caller
	/// closes the tab instead of recycling it.
	async fn reset_tab(&self, handle: &PooledHandle) -> Result<()> {
		let deadline = Duration::from_secs(5);
		self.connection.send_with_timeout(Some(&handle.cdp_session_id), "Page.navigate", json!({ "url": "about:blank" }), deadline).await?;
		self.connection.send(Some(&handle.cdp_session_id), "Network.clearBrowserCookies", json!({})).await?;

		match self.connection.send(Some(&handle.cdp_session_id), "Storage.clearDataForOrigin", json!({ "origin": "*", "storageTypes": "all" })).await {
			Ok(_) => {}
			Err(err) if is_unsupported_storage_error(&err) => {}
			Err(err) => return Err(err),
		}
		Ok(())
	}

	pub fn stats(&self) -> PoolStats {
		let inner = self.inner.lock();
		PoolStats { available: inner.available.len(), in_use: inner.in_use.len(), total_created: inner.total_created, reused: inner.reused, created_on_demand: inner.created_on_demand, average_acquire_ms: inner.average_acquire_ms() }
	}
}

fn is_unsupported_storage_error(err: &openchrome_protocol::Error) -> bool {
	matches!(err, openchrome_protocol::Error::CdpProtocol(msg) if msg.to_ascii_lowercase().contains("not supported"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pool_stats_start_empty() {
		let inner = Inner::new();
		assert_eq!(inner.average_acquire_ms(), 0.0);
	}

	#[test]
	fn average_acquire_caps_sample_window_at_100() {
		let mut inner = Inner::new();
		for i in 0..150u64 {
			inner.record_acquire(i);
		}
		assert_eq!(inner.acquire_samples.len(), 100);
	}

	#[test]
	fn unsupported_storage_error_is_recognized() {
		let err = openchrome_protocol::Error::CdpProtocol("Storage type not supported".into());
		assert!(is_unsupported_storage_error(&err));
		let other = openchrome_protocol::Error::CdpProtocol("boom".into());
		assert!(!is_unsupported_storage_error(&other));
	}
}
