//! `openchrome-core`: everything from the Tab Pool (C5) through Storage
//! State (C12), parametrized over a shared `openchrome_runtime::Connection`
//! and `openchrome_runtime::Launcher` (SPEC_FULL §2).
//!
//! `Core::bootstrap` assembles every collaborator and is the crate's single
//! entry point; downstream callers (the CLI, the daemon) only ever reach
//! the system through the four surfaces named in §1: `Core.acquireSession`,
//! `Session.run(op)`, `Session.getTab(tabId)`, and
//! `Tab.evaluate/serialize/mutate`.

pub mod config;
pub mod dom;
pub mod mutate;
pub mod pool;
pub mod queue;
pub mod ref_table;
pub mod session;
pub mod storage;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use openchrome_protocol::{Error, Result};
use openchrome_runtime::launcher::{LaunchOptions, Launcher};
use openchrome_runtime::profile::{ProfileManager, ProfileOptions, ProfileType};
use openchrome_runtime::Connection;

pub use config::Config;
pub use dom::{Candidate, DeltaOptions, FoundElement, SerializeOptions, SerializeResult};
pub use mutate::MutateAction;
pub use queue::QueueManager;
pub use ref_table::RefTable;
pub use session::{SessionEvent, SessionInfo, SessionManager, Tab, Viewport};
pub use storage::StorageStateManager;

use pool::TabPool;

/// Everything needed to stand up the shared browser process and transport
/// before any session exists. Mirrors the teacher's `BrowserSession::new`
/// cascade (resolve profile -> ensure process -> connect transport) but
/// built once per `Core` rather than once per invocation.
struct Shared {
	launcher: Launcher,
	profile: ProfileManager,
	process: AsyncMutex<Option<tokio::process::Child>>,
	user_data_dir: std::path::PathBuf,
	profile_type: ProfileType,
}

/// The assembled system: one shared Chrome process and CDP connection,
/// the C5-C12 collaborators built on top of it, and the config that shaped
/// their construction (SPEC_FULL §4.15).
pub struct Core {
	pub connection: Arc<Connection>,
	pub pool: Arc<TabPool>,
	pub queues: Arc<QueueManager>,
	pub ref_table: Arc<RefTable>,
	pub sessions: Arc<SessionManager>,
	pub storage: Arc<StorageStateManager>,
	pub config: Config,
	shared: Shared,
}

impl Core {
	/// Resolves the profile, ensures a Chrome process is reachable, connects
	/// the CDP transport, and wires up the pool/queue/ref-table/session
	/// manager/storage collaborators (§4.2-§4.5, §4.11-§4.12). Spawns the
	/// pool's maintenance timer and the session manager's idle-TTL sweep
	/// (§5 "background tasks that do not keep the process alive").
	pub async fn bootstrap(config: Config) -> Result<Arc<Self>> {
		let home_dir = dirs::home_dir().ok_or_else(|| Error::Other("no home directory available for profile resolution".into()))?;
		let profile = ProfileManager::new(&home_dir);

		let profile_opts = ProfileOptions {
			explicit_dir: config.profile.explicit_dir.clone(),
			force_temp: config.profile.force_temp,
			headless_shell: config.launcher.headless_shell_binary.is_some(),
			real_profile_dir: config.profile.real_profile_dir.clone(),
		};
		let resolved = profile.resolve(&profile_opts).await?;
		if let Some(warning) = &resolved.snapshot_warning {
			warn!(warning, "profile snapshot fell back to a non-atomic copy");
		}
		info!(dir = %resolved.dir.display(), profile_type = ?resolved.profile_type, "profile resolved");

		let launcher = Launcher::new();
		let launch_opts = LaunchOptions {
			user_data_dir: resolved.dir.clone(),
			profile_type: resolved.profile_type,
			debug_port: config.launcher.debug_port,
			headless: config.launcher.headless,
			auto_launch: config.launcher.auto_launch,
			explicit_binary: config.launcher.explicit_binary.clone().or_else(|| config.launcher.headless_shell_binary.clone()),
			ci_sandbox_disable: config.launcher.ci_sandbox_disable,
		};
		let ensured = launcher.ensure(&launch_opts).await?;
		info!(ws = %ensured.ws_endpoint, "browser ensured");

		let connection = Connection::connect(ensured.ws_endpoint).await?;

		let pool = TabPool::new(connection.clone(), config.pool.clone());
		pool.spawn_maintenance();

		let queues = Arc::new(QueueManager::new(config.queue.item_timeout));
		let ref_table = Arc::new(RefTable::new());
		let sessions = SessionManager::new(pool.clone(), ref_table.clone(), queues.clone(), config.session);
		sessions.spawn_ttl_sweep();

		let storage = Arc::new(StorageStateManager::new(home_dir.join(".openchrome").join("backups")));

		let shared = Shared { launcher, profile, process: AsyncMutex::new(ensured.process), user_data_dir: resolved.dir, profile_type: ensured.profile_type };

		Ok(Arc::new(Self { connection, pool, queues, ref_table, sessions, storage, config, shared }))
	}

	/// §6 `Core.acquireSession`: reuses an existing session by id, or
	/// creates one implicitly.
	pub fn acquire_session(self: &Arc<Self>, id: Option<String>) -> SessionHandle {
		let session_id = match id {
			Some(id) if self.sessions.info(&id).is_ok() => id,
			Some(id) => {
				self.sessions.create_session_with_id(id.clone());
				id
			}
			None => self.sessions.create_session(),
		};
		SessionHandle { core: self.clone(), session_id }
	}

	/// Terminates the browser process this `Core` launched (no-op if it
	/// attached to an already-running instance) and removes the profile
	/// directory if it was a temp one (§4.3 shutdown).
	pub async fn shutdown(&self) {
		let process = self.shared.process.lock().await.take();
		self.shared.launcher.shutdown(process, self.shared.profile_type, &self.shared.user_data_dir).await;
	}

	fn home_profile_manager(&self) -> &ProfileManager {
		&self.shared.profile
	}
}

/// A logical automation session: dispatches through its own FIFO queue and
/// owns the tabs it created (§4.11). Cheap to clone-by-id; every method
/// re-resolves the session id against the shared `Core`.
#[derive(Clone)]
pub struct SessionHandle {
	core: Arc<Core>,
	session_id: String,
}

impl SessionHandle {
	pub fn id(&self) -> &str {
		&self.session_id
	}

	pub fn info(&self) -> Result<SessionInfo> {
		self.core.sessions.info(&self.session_id)
	}

	/// §6 `SessionManager.createTab(sessionId, url?, workerId?)`: acquires a
	/// pooled tab under `worker_id` (or the default worker) and navigates it
	/// if `url` is given.
	pub async fn create_tab(&self, url: Option<&str>, worker_id: Option<&str>) -> Result<TabHandle> {
		let created = self.core.sessions.create_tab(&self.session_id, worker_id.map(str::to_string)).await?;
		let tab_id = created.tab_id;
		if let Some(url) = url {
			let tab = self.core.sessions.get_tab(&self.session_id, &tab_id)?;
			self.core.connection.send(Some(&tab.cdp_session_id), "Page.navigate", serde_json::json!({ "url": url })).await?;
		}
		let tab = self.core.sessions.get_tab(&self.session_id, &tab_id)?;
		Ok(TabHandle { core: self.core.clone(), session_id: self.session_id.clone(), tab })
	}

	/// §6 `SessionManager.getTab(sessionId, tabId)`.
	pub fn get_tab(&self, tab_id: &str) -> Result<TabHandle> {
		let tab = self.core.sessions.get_tab(&self.session_id, tab_id)?;
		Ok(TabHandle { core: self.core.clone(), session_id: self.session_id.clone(), tab })
	}

	pub async fn close_tab(&self, tab_id: &str) -> Result<()> {
		self.core.sessions.close_tab(&self.session_id, tab_id).await
	}

	/// §6 `Session.queue.enqueue(op)`: runs `op` through this session's FIFO
	/// queue, serialized against every other operation on the same session.
	pub async fn run(&self, op: impl std::future::Future<Output = Result<serde_json::Value>> + Send + 'static) -> Result<serde_json::Value> {
		self.core.sessions.run(&self.session_id, op).await
	}

	pub async fn save_storage(&self, tab_id: &str, path: &std::path::Path) -> Result<()> {
		let tab = self.get_tab(tab_id)?;
		self.core.storage.save(&self.core.connection, &tab.tab.cdp_session_id, path).await
	}

	pub async fn restore_storage(&self, tab_id: &str, path: &std::path::Path) -> Result<bool> {
		let tab = self.get_tab(tab_id)?;
		self.core.storage.restore(&self.core.connection, &tab.tab.cdp_session_id, path).await
	}

	/// §6 `SessionManager.cleanupSession(id)`.
	pub async fn destroy(&self) -> Result<()> {
		self.core.sessions.destroy_session(&self.session_id).await
	}
}

/// A single owned tab. The three operations named in §1
/// (`evaluate`/`serialize`/`mutate`) are the entire surface every concrete
/// end-user tool builds on.
pub struct TabHandle {
	core: Arc<Core>,
	session_id: String,
	tab: Tab,
}

impl TabHandle {
	pub fn tab_id(&self) -> &str {
		&self.tab.tab_id
	}

	pub fn worker_id(&self) -> &str {
		&self.tab.worker_id
	}

	pub fn viewport(&self) -> Viewport {
		self.tab.viewport
	}

	/// `Tab.evaluate`: a raw `Runtime.evaluate` passthrough.
	pub async fn evaluate(&self, expression: &str) -> Result<serde_json::Value> {
		let result = self.core.connection.send(Some(&self.tab.cdp_session_id), "Runtime.evaluate", serde_json::json!({ "expression": expression, "returnByValue": true, "awaitPromise": true })).await?;
		if let Some(exc) = result.get("exceptionDetails") {
			return Err(Error::CdpProtocol(format!("Runtime.evaluate threw: {exc}")));
		}
		Ok(result.get("result").and_then(|r| r.get("value")).cloned().unwrap_or(serde_json::Value::Null))
	}

	/// `Tab.serialize`: §6 `DOM.serialize(tab, opts)`.
	pub async fn serialize(&self, opts: &SerializeOptions) -> Result<SerializeResult> {
		dom::serialize(&self.core.connection, &self.tab.cdp_session_id, opts).await
	}

	/// §6 `Finder.findBest(tab, query)`, generating a ref for the winner so
	/// callers can act on it through `mutate` without re-harvesting (§4.6).
	pub async fn find(&self, query: &str) -> Result<(String, FoundElement)> {
		let found = dom::find_best_on_tab(&self.core.connection, &self.tab.cdp_session_id, query).await?;
		let reference = self.core.ref_table.generate(
			&self.session_id,
			&self.tab.tab_id,
			found.candidate.backend_node_id,
			&found.candidate.role,
			&found.candidate.name,
			Some(&found.candidate.tag),
			Some(&found.candidate.text_prefix),
		);
		Ok((reference, found))
	}

	/// `Tab.mutate`: resolves the action's ref and performs it (§6, the
	/// "`Tab.evaluate/serialize/mutate`" surface).
	pub async fn mutate(&self, action: MutateAction) -> Result<serde_json::Value> {
		mutate::mutate(&self.core.connection, &self.tab.cdp_session_id, &self.core.ref_table, &self.session_id, &self.tab.tab_id, &action).await
	}

	/// Composes `mutate` with `Delta.withDelta` (§4.10, §6): the pattern the
	/// CLI's `click` subcommand and any click_element-style adapter use.
	pub async fn mutate_with_delta(&self, action: MutateAction, opts: DeltaOptions) -> Result<(serde_json::Value, String)> {
		let connection = &self.core.connection;
		let cdp_session_id = &self.tab.cdp_session_id;
		let ref_table = &self.core.ref_table;
		let session_id = &self.session_id;
		let tab_id = &self.tab.tab_id;
		dom::with_delta(connection, cdp_session_id, || mutate::mutate(connection, cdp_session_id, ref_table, session_id, tab_id, &action), Some(150), Some(opts.max_chars)).await
	}

	pub async fn navigate(&self, url: &str) -> Result<()> {
		self.core.connection.send_with_timeout(Some(&self.tab.cdp_session_id), "Page.navigate", serde_json::json!({ "url": url }), Duration::from_secs(30)).await?;
		Ok(())
	}

	/// `Page.captureScreenshot`, returned already base64-decoded.
	pub async fn screenshot(&self, format: &str, quality: Option<u8>) -> Result<Vec<u8>> {
		let mut params = serde_json::json!({ "format": format });
		if let Some(q) = quality {
			params["quality"] = serde_json::json!(q);
		}
		let result = self.core.connection.send(Some(&self.tab.cdp_session_id), "Page.captureScreenshot", params).await?;
		let data = result.get("data").and_then(|v| v.as_str()).ok_or_else(|| Error::CdpProtocol("Page.captureScreenshot returned no data".into()))?;
		use base64::Engine;
		base64::engine::general_purpose::STANDARD.decode(data).map_err(|e| Error::CdpProtocol(format!("screenshot base64 decode failed: {e}")))
	}
}
