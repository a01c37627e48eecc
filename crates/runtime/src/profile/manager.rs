//! Profile directory resolution (§4.2 "Directory resolution priority") and
//! the atomic cookie-snapshot pipeline used when the real profile is locked.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use openchrome_protocol::model::SyncMetadata;
use openchrome_protocol::{Error, Result};
use tracing::{debug, info, warn};

use super::atomic_store::{AtomicStore, WriteOptions};

/// How a resolved profile directory came to be chosen (§3 directory
/// resolution priority).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileType {
	Explicit,
	Temp,
	Real,
	Persistent,
}

/// Result of `ProfileManager::resolve` (§6 `Profile.resolve`).
#[derive(Debug, Clone)]
pub struct ResolvedProfile {
	pub dir: PathBuf,
	pub profile_type: ProfileType,
	pub snapshotted: bool,
	/// Set when the snapshot fell back to a non-atomic raw copy
	/// (`profile.snapshot-non-atomic`, a warning per §7, not an error).
	pub snapshot_warning: Option<String>,
}

/// Inputs to directory resolution (§4.2 priority list).
#[derive(Debug, Clone, Default)]
pub struct ProfileOptions {
	/// Priority 1: caller-supplied directory.
	pub explicit_dir: Option<PathBuf>,
	/// Priority 2a: force a fresh temp directory regardless of anything else.
	pub force_temp: bool,
	/// Priority 2b: headless-shell mode always gets a fresh temp directory.
	pub headless_shell: bool,
	/// The real Chrome profile directory to probe for existence/lock state,
	/// if the platform default is known. `None` skips priorities 3-4.
	pub real_profile_dir: Option<PathBuf>,
}

const SNAPSHOT_MAX_AGE: Duration = Duration::from_secs(30 * 60);
const COOKIES_RELATIVE_PATH: &str = "Default/Cookies";

pub struct ProfileManager {
	home_dir: PathBuf,
	store: AtomicStore,
}

impl ProfileManager {
	pub fn new(home_dir: impl Into<PathBuf>) -> Self {
		let home_dir = home_dir.into();
		let store = AtomicStore::new(home_dir.join(".openchrome").join("backups"));
		Self { home_dir, store }
	}

	pub fn persistent_profile_dir(&self) -> PathBuf {
		self.home_dir.join(".openchrome").join("profile")
	}

	fn sync_metadata_path(&self) -> PathBuf {
		self.home_dir.join(".openchrome").join("sync-metadata.json")
	}

	/// §4.2 directory resolution priority, first match wins.
	pub async fn resolve(&self, opts: &ProfileOptions) -> Result<ResolvedProfile> {
		if let Some(dir) = &opts.explicit_dir {
			info!(dir = %dir.display(), "profile: explicit directory");
			return Ok(ResolvedProfile { dir: dir.clone(), profile_type: ProfileType::Explicit, snapshotted: false, snapshot_warning: None });
		}

		if opts.force_temp || opts.headless_shell {
			let dir = std::env::temp_dir().join(format!("openchrome-profile-{}", uuid::Uuid::new_v4()));
			tokio::fs::create_dir_all(&dir).await?;
			info!(dir = %dir.display(), "profile: fresh temp directory");
			return Ok(ResolvedProfile { dir, profile_type: ProfileType::Temp, snapshotted: false, snapshot_warning: None });
		}

		let Some(real_dir) = &opts.real_profile_dir else {
			let dir = self.persistent_profile_dir();
			tokio::fs::create_dir_all(&dir).await?;
			info!(dir = %dir.display(), "profile: persistent mirror, no real profile candidate given");
			return Ok(ResolvedProfile { dir, profile_type: ProfileType::Persistent, snapshotted: false, snapshot_warning: None });
		};

		if !tokio::fs::try_exists(real_dir).await.unwrap_or(false) {
			let dir = self.persistent_profile_dir();
			tokio::fs::create_dir_all(&dir).await?;
			info!(dir = %dir.display(), "profile: real profile does not exist, using persistent mirror");
			return Ok(ResolvedProfile { dir, profile_type: ProfileType::Persistent, snapshotted: false, snapshot_warning: None });
		}

		if !is_locked(real_dir).await {
			info!(dir = %real_dir.display(), "profile: real profile unlocked, using directly");
			return Ok(ResolvedProfile { dir: real_dir.clone(), profile_type: ProfileType::Real, snapshotted: false, snapshot_warning: None });
		}

		info!(real = %real_dir.display(), "profile: real profile is locked, falling back to persistent mirror");
		let mirror_dir = self.persistent_profile_dir();
		tokio::fs::create_dir_all(&mirror_dir).await?;

		let needs = self.needs_sync(real_dir).await?;
		if !needs {
			debug!("profile: persistent mirror already fresh, skipping snapshot");
			return Ok(ResolvedProfile { dir: mirror_dir, profile_type: ProfileType::Persistent, snapshotted: false, snapshot_warning: None });
		}

		match self.snapshot(real_dir, &mirror_dir).await {
			Ok(warning) => Ok(ResolvedProfile { dir: mirror_dir, profile_type: ProfileType::Persistent, snapshotted: true, snapshot_warning: warning }),
			Err(e) => {
				// §7: individual snapshot failures are swallowed; the mirror is still usable.
				warn!(error = %e, "profile: cookie snapshot failed, continuing with existing mirror contents");
				Ok(ResolvedProfile { dir: mirror_dir, profile_type: ProfileType::Persistent, snapshotted: false, snapshot_warning: None })
			}
		}
	}

	/// §4.2 snapshot staleness rule / §8 `needsSync` testable property.
	///
	/// Resolved open question (see `DESIGN.md`): a missing source cookies
	/// file is treated as "a sync attempt should happen" rather than
	/// silently suppressing sync, differing from the source behavior the
	/// core spec flags as possibly unintended.
	pub async fn needs_sync(&self, real_profile_dir: &Path) -> Result<bool> {
		let outcome = self.store.read::<SyncMetadata>(&self.sync_metadata_path()).await;
		let Some(metadata) = outcome.value else {
			return Ok(true);
		};

		let cookies_path = real_profile_dir.join(COOKIES_RELATIVE_PATH);
		let current_hash = match source_hash(&cookies_path).await {
			Some(h) => h,
			None => return Ok(true),
		};

		if current_hash != metadata.source_profile_hash {
			return Ok(true);
		}

		let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
		let age = now.saturating_sub(metadata.last_sync_timestamp);
		Ok(Duration::from_secs(age) > SNAPSHOT_MAX_AGE)
	}

	/// The atomic three-tier cookie snapshot (§4.2), plus auxiliary copies
	/// of `Local State`/`Preferences`. Returns `Some(warning)` when the
	/// fallback tier (raw main-file copy) was used.
	async fn snapshot(&self, source_dir: &Path, dest_dir: &Path) -> Result<Option<String>> {
		let source_cookies = source_dir.join(COOKIES_RELATIVE_PATH);
		let dest_cookies_dir = dest_dir.join("Default");
		tokio::fs::create_dir_all(&dest_cookies_dir).await?;
		let dest_cookies = dest_cookies_dir.join("Cookies");

		delete_stale_wal_shm(&dest_cookies).await;

		let warning = match vacuum_into(&source_cookies, &dest_cookies).await {
			Ok(()) => {
				debug!("profile: snapshot via VACUUM INTO succeeded");
				None
			}
			Err(e1) => {
				debug!(error = %e1, "profile: VACUUM INTO failed, trying sqlite3 CLI .backup");
				match sqlite_cli_backup(&source_cookies, &dest_cookies).await {
					Ok(()) => {
						debug!("profile: snapshot via sqlite3 CLI .backup succeeded");
						None
					}
					Err(e2) => {
						warn!(error = %e2, "profile: sqlite3 CLI backup failed, falling back to raw file copy (non-atomic)");
						raw_copy(&source_cookies, &dest_cookies).await?;
						Some("cookie snapshot used a non-atomic raw file copy; concurrent Chrome writes may have produced an inconsistent result".to_string())
					}
				}
			}
		};

		copy_aux_file(source_dir, dest_dir, "Local State").await;
		copy_and_patch_preferences(source_dir, dest_dir).await;

		let hash = source_hash(&source_cookies).await.unwrap_or_default();
		let prior_count = self.store.read::<SyncMetadata>(&self.sync_metadata_path()).await.value.map(|m| m.sync_count).unwrap_or(0);
		let metadata = SyncMetadata {
			last_sync_timestamp: SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs(),
			source_profile_dir: source_dir.display().to_string(),
			source_profile_hash: hash,
			sync_count: prior_count + 1,
		};
		self.store.write(&self.sync_metadata_path(), &metadata, WriteOptions { backup: true }).await?;

		Ok(warning)
	}
}

/// `"<mtime_ms>:<size>"` per §3 `SyncMetadata.sourceFileHash`.
async fn source_hash(path: &Path) -> Option<String> {
	let meta = tokio::fs::metadata(path).await.ok()?;
	let mtime_ms = meta.modified().ok()?.duration_since(UNIX_EPOCH).ok()?.as_millis();
	Some(format!("{mtime_ms}:{}", meta.len()))
}

/// Deletes any destination WAL/SHM/journal left over from a previous clean
/// snapshot, so the new Chrome does not attempt to replay stale logs over a
/// freshly copied main file (§4.2, and resolved open question #2 in
/// `DESIGN.md`: always delete at the destination, never copy the source's).
async fn delete_stale_wal_shm(dest_cookies: &Path) {
	for suffix in ["-wal", "-shm", "-journal"] {
		let mut path = dest_cookies.as_os_str().to_os_string();
		path.push(suffix);
		let _ = tokio::fs::remove_file(PathBuf::from(path)).await;
	}
}

/// Preferred tier: `VACUUM INTO` is synchronous, WAL-aware, and produces a
/// single consistent file even while the source connection is open
/// elsewhere.
async fn vacuum_into(source: &Path, dest: &Path) -> Result<()> {
	if !tokio::fs::try_exists(source).await.unwrap_or(false) {
		return Err(Error::Other("source cookies file does not exist".into()));
	}
	let source = source.to_path_buf();
	let dest = dest.to_path_buf();
	tokio::task::spawn_blocking(move || -> Result<()> {
		let conn = rusqlite::Connection::open_with_flags(&source, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(|e| Error::Other(e.to_string()))?;
		let dest_str = dest.to_string_lossy().replace('\'', "''");
		conn.execute_batch(&format!("VACUUM INTO '{dest_str}';")).map_err(|e| Error::Other(e.to_string()))?;
		Ok(())
	})
	.await
	.map_err(|e| Error::Other(e.to_string()))?
}

/// Fallback tier: shell out to the system `sqlite3` binary's `.backup`
/// command, which has the same atomicity guarantees without an in-process
/// SQLite dependency. Paths are passed as separate argv entries, never
/// interpolated into a shell string, so no quoting/escaping vulnerability
/// applies.
async fn sqlite_cli_backup(source: &Path, dest: &Path) -> Result<()> {
	let command = format!(".backup '{}'", dest.display());
	let output = tokio::process::Command::new("sqlite3").arg(source).arg(&command).output().await.map_err(|e| Error::Other(e.to_string()))?;
	if !output.status.success() {
		return Err(Error::Other(format!("sqlite3 exited with {}: {}", output.status, String::from_utf8_lossy(&output.stderr))));
	}
	Ok(())
}

/// Last resort: copy only the main DB file, explicitly non-atomic. The
/// source's WAL is deliberately never copied alongside it here (resolved
/// open question #2): a raw main-file copy without its matching WAL
/// generation is a flagged, known-inconsistent snapshot; pairing it with a
/// mismatched WAL would make it worse, not better.
async fn raw_copy(source: &Path, dest: &Path) -> Result<()> {
	tokio::fs::copy(source, dest).await?;
	Ok(())
}

async fn copy_aux_file(source_dir: &Path, dest_dir: &Path, name: &str) {
	let src = source_dir.join(name);
	let dst = dest_dir.join(name);
	if let Err(e) = tokio::fs::copy(&src, &dst).await {
		debug!(file = name, error = %e, "profile: auxiliary file copy skipped (non-fatal)");
	}
}

/// Copies `Preferences` and patches it to suppress Chrome's "didn't shut
/// down correctly" restore prompt and disable session restore (§4.2).
async fn copy_and_patch_preferences(source_dir: &Path, dest_dir: &Path) {
	let src = source_dir.join("Preferences");
	let Ok(text) = tokio::fs::read_to_string(&src).await else {
		debug!("profile: no Preferences file to patch (non-fatal)");
		return;
	};
	let Ok(mut value) = serde_json::from_str::<serde_json::Value>(&text) else {
		debug!("profile: Preferences file is not valid JSON, copying verbatim");
		let _ = tokio::fs::copy(&src, dest_dir.join("Preferences")).await;
		return;
	};

	if let Some(profile) = value.get_mut("profile").and_then(|v| v.as_object_mut()) {
		profile.insert("exit_type".into(), serde_json::Value::String("Normal".into()));
		profile.insert("exited_cleanly".into(), serde_json::Value::Bool(true));
	}
	if let Some(session) = value.get_mut("session").and_then(|v| v.as_object_mut()) {
		session.insert("restore_on_startup".into(), serde_json::Value::Number(5.into()));
	}

	if let Ok(patched) = serde_json::to_vec(&value) {
		let _ = tokio::fs::write(dest_dir.join("Preferences"), patched).await;
	}
}

/// Unix lock detection per §4.2: the presence of `SingletonLock` (a symlink
/// whose target encodes `<host>-<pid>`), `SingletonSocket`, or
/// `SingletonCookie`, with a live-pid probe so a dangling lock from a
/// crashed instance is treated as unlocked.
#[cfg(unix)]
async fn is_locked(profile_dir: &Path) -> bool {
	let lock_path = profile_dir.join("SingletonLock");
	let target = match tokio::fs::read_link(&lock_path).await {
		Ok(t) => t,
		Err(_) => return tokio::fs::try_exists(profile_dir.join("SingletonSocket")).await.unwrap_or(false),
	};

	let Some(target_str) = target.to_str() else { return true };
	let Some((_, pid_str)) = target_str.rsplit_once('-') else { return true };
	let Ok(pid) = pid_str.parse::<i32>() else { return true };

	if pid_is_alive(pid) {
		true
	} else {
		debug!(pid, "profile: SingletonLock points at a dead pid, treating as unlocked");
		false
	}
}

#[cfg(not(unix))]
async fn is_locked(profile_dir: &Path) -> bool {
	tokio::fs::try_exists(profile_dir.join("lockfile")).await.unwrap_or(false)
}

#[cfg(unix)]
fn pid_is_alive(pid: i32) -> bool {
	unsafe extern "C" {
		fn kill(pid: i32, sig: i32) -> i32;
	}
	// Signal 0 performs no actual signal delivery, only existence/permission checks.
	unsafe { kill(pid, 0) == 0 }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn resolve_prefers_explicit_directory() {
		let home = tempfile::tempdir().unwrap();
		let explicit = tempfile::tempdir().unwrap();
		let mgr = ProfileManager::new(home.path());
		let opts = ProfileOptions { explicit_dir: Some(explicit.path().to_path_buf()), ..Default::default() };
		let resolved = mgr.resolve(&opts).await.unwrap();
		assert_eq!(resolved.profile_type, ProfileType::Explicit);
		assert_eq!(resolved.dir, explicit.path());
		assert!(!resolved.snapshotted);
	}

	#[tokio::test]
	async fn resolve_force_temp_always_gets_fresh_directory() {
		let home = tempfile::tempdir().unwrap();
		let mgr = ProfileManager::new(home.path());
		let opts = ProfileOptions { force_temp: true, ..Default::default() };
		let a = mgr.resolve(&opts).await.unwrap();
		let b = mgr.resolve(&opts).await.unwrap();
		assert_eq!(a.profile_type, ProfileType::Temp);
		assert_ne!(a.dir, b.dir, "each temp launch gets its own directory");
	}

	#[tokio::test]
	async fn resolve_missing_real_profile_falls_back_to_persistent_mirror() {
		let home = tempfile::tempdir().unwrap();
		let mgr = ProfileManager::new(home.path());
		let missing = home.path().join("does-not-exist");
		let opts = ProfileOptions { real_profile_dir: Some(missing), ..Default::default() };
		let resolved = mgr.resolve(&opts).await.unwrap();
		assert_eq!(resolved.profile_type, ProfileType::Persistent);
		assert!(!resolved.snapshotted);
		assert_eq!(resolved.dir, mgr.persistent_profile_dir());
	}

	#[tokio::test]
	async fn resolve_unlocked_real_profile_used_directly() {
		let home = tempfile::tempdir().unwrap();
		let real = tempfile::tempdir().unwrap();
		let mgr = ProfileManager::new(home.path());
		let opts = ProfileOptions { real_profile_dir: Some(real.path().to_path_buf()), ..Default::default() };
		let resolved = mgr.resolve(&opts).await.unwrap();
		assert_eq!(resolved.profile_type, ProfileType::Real);
		assert_eq!(resolved.dir, real.path());
	}

	#[tokio::test]
	async fn needs_sync_true_when_no_prior_metadata() {
		let home = tempfile::tempdir().unwrap();
		let mgr = ProfileManager::new(home.path());
		let real = tempfile::tempdir().unwrap();
		assert!(mgr.needs_sync(real.path()).await.unwrap());
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn dangling_lock_from_dead_pid_is_treated_as_unlocked() {
		let real = tempfile::tempdir().unwrap();
		// pid 1 is generally alive (init); use an implausible high pid instead,
		// accepting the tiny race in CI sandboxes where pid reuse is unlikely.
		let dead_pid = 999_999;
		let target = format!("host-{dead_pid}");
		tokio::fs::symlink(target, real.path().join("SingletonLock")).await.unwrap();
		assert!(!is_locked(real.path()).await);
	}

	#[test]
	fn pid_1_init_is_alive() {
		assert!(pid_is_alive(1));
	}

	#[test]
	fn implausible_pid_is_not_alive() {
		assert!(!pid_is_alive(999_999));
	}
}
