//! A tab handle owned by exactly one session (§3 `Tab`). Does not own any
//! resources itself — the pool owns the underlying CDP target, the session
//! owns the id mapping.

use std::time::Instant;

/// A tab's viewport size (§3 `Tab.viewport`). Chrome's own headless default
/// (800x600) is overridden at launch to the more representative 1280x720
/// used throughout the DOM page-stats scripts; a per-tab override is not
/// wired to `Emulation.setDeviceMetricsOverride` yet (no caller needs it),
/// so this just records the size a tab was created with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
	pub width: f64,
	pub height: f64,
}

impl Default for Viewport {
	fn default() -> Self {
		Self { width: 1280.0, height: 720.0 }
	}
}

/// §3 `Tab` attributes. `current_url` is observed, not authoritative: it is
/// only as fresh as the last navigation/read this tab performed.
#[derive(Debug, Clone)]
pub struct Tab {
	pub tab_id: String,
	pub target_id: String,
	/// The CDP flat-mode session id this tab's target was attached under;
	/// what `Connection::send` actually routes calls on.
	pub cdp_session_id: String,
	pub session_id: String,
	/// §6 `createTab(sessionId, url?, workerId?)`: the worker-group label a
	/// tab was created under (§3 "owning worker id"), opaque to the core.
	pub worker_id: String,
	pub viewport: Viewport,
	pub created_at: Instant,
	pub last_used: Instant,
	pub current_url: Option<String>,
}

impl Tab {
	pub fn new(tab_id: String, target_id: String, cdp_session_id: String, session_id: String, worker_id: String) -> Self {
		let now = Instant::now();
		Self { tab_id, target_id, cdp_session_id, session_id, worker_id, viewport: Viewport::default(), created_at: now, last_used: now, current_url: None }
	}

	pub fn touch(&mut self) {
		self.last_used = Instant::now();
	}
}
