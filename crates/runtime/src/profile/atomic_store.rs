//! C1: atomic write/read/backup/restore over small on-disk JSON blobs.
//!
//! Single discipline used everywhere a managed config blob touches disk:
//! write to a uniquely-named temp file next to the target, `fsync`, then
//! rename over the target. A `rename` within one filesystem is atomic on
//! every platform this crate targets; crossing filesystem boundaries is the
//! caller's problem (§4.1).

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use openchrome_protocol::Result;

/// Outcome of a `read`: either the parsed value, or a non-fatal failure
/// description (§4.1 "read failures are non-fatal").
pub struct ReadOutcome<T> {
	pub ok: bool,
	pub value: Option<T>,
	pub corrupted: bool,
	pub error: Option<String>,
}

impl<T> ReadOutcome<T> {
	fn missing() -> Self {
		Self { ok: false, value: None, corrupted: false, error: None }
	}

	fn corrupted(error: String) -> Self {
		Self { ok: false, value: None, corrupted: true, error: Some(error) }
	}

	fn success(value: T) -> Self {
		Self { ok: true, value: Some(value), corrupted: false, error: None }
	}
}

/// Options for `write` (§4.1).
#[derive(Default, Clone, Copy)]
pub struct WriteOptions {
	pub backup: bool,
}

/// Detects the `}{` concatenation corruption pattern outside of string
/// literals: two JSON objects written back-to-back by a non-atomic writer
/// that was interrupted mid-append. A naive substring search would false
/// positive on a legitimate `"}{"` string value, so this walks the text
/// tracking string-literal state.
fn looks_corrupted(text: &str) -> bool {
	let mut in_string = false;
	let mut escaped = false;
	let mut prev_close_brace = false;
	for ch in text.chars() {
		if in_string {
			if escaped {
				escaped = false;
			} else if ch == '\\' {
				escaped = true;
			} else if ch == '"' {
				in_string = false;
			}
			continue;
		}
		match ch {
			'"' => in_string = true,
			'}' => prev_close_brace = true,
			'{' if prev_close_brace => return true,
			c if c.is_whitespace() => {}
			_ => prev_close_brace = false,
		}
		if ch != '}' {
			prev_close_brace = false;
		}
	}
	false
}

/// Atomic file store rooted at nothing in particular; every method takes an
/// absolute path. Backups for a given logical name live in `backups_dir`.
pub struct AtomicStore {
	backups_dir: PathBuf,
}

impl AtomicStore {
	pub fn new(backups_dir: impl Into<PathBuf>) -> Self {
		Self { backups_dir: backups_dir.into() }
	}

	/// Writes `value` to `path` via temp-file-plus-rename. If `opts.backup`
	/// and `path` already exists, the prior content is copied into the
	/// backups directory under a timestamp-suffixed name first.
	pub async fn write<T: Serialize>(&self, path: &Path, value: &T, opts: WriteOptions) -> Result<()> {
		if opts.backup && tokio::fs::try_exists(path).await.unwrap_or(false) {
			self.backup(path).await?;
		}

		let bytes = serde_json::to_vec_pretty(value)?;
		self.write_raw(path, &bytes).await
	}

	/// Same discipline as `write` but for opaque bytes rather than JSON.
	pub async fn write_raw(&self, path: &Path, bytes: &[u8]) -> Result<()> {
		let unique = uuid::Uuid::new_v4();
		let mut tmp_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("blob").to_string();
		tmp_name.push_str(&format!(".tmp-{unique}"));
		let tmp_path = path.with_file_name(tmp_name);

		if let Some(parent) = path.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}

		{
			let mut file = tokio::fs::File::create(&tmp_path).await?;
			file.write_all(bytes).await?;
			file.sync_all().await?;
		}

		tokio::fs::rename(&tmp_path, path).await?;
		debug!(path = %path.display(), bytes = bytes.len(), "atomic write complete");
		Ok(())
	}

	/// Reads and parses `path`. Missing files are reported as `ok: false`
	/// with no error (not corruption); parse failures and the `}{`
	/// concatenation pattern are reported as `corrupted: true`.
	pub async fn read<T: DeserializeOwned>(&self, path: &Path) -> ReadOutcome<T> {
		let text = match tokio::fs::read_to_string(path).await {
			Ok(t) => t,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return ReadOutcome::missing(),
			Err(e) => return ReadOutcome::corrupted(e.to_string()),
		};

		if looks_corrupted(&text) {
			warn!(path = %path.display(), "detected concatenated-JSON corruption pattern");
			return ReadOutcome::corrupted("concatenated JSON objects (`}{` pattern)".into());
		}

		match serde_json::from_str::<T>(&text) {
			Ok(value) => ReadOutcome::success(value),
			Err(e) => ReadOutcome::corrupted(e.to_string()),
		}
	}

	async fn backup(&self, path: &Path) -> Result<()> {
		tokio::fs::create_dir_all(&self.backups_dir).await?;
		let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("blob");
		let stamp = iso_timestamp_now();
		let backup_path = self.backups_dir.join(format!("{name}.{stamp}.bak"));
		tokio::fs::copy(path, &backup_path).await?;
		debug!(backup = %backup_path.display(), "wrote config backup");
		Ok(())
	}

	/// Lists backups for `name`, sorted lexicographically — the
	/// timestamp-suffixed naming scheme makes lexicographic order equal
	/// chronological order.
	pub async fn list_backups(&self, name: &str) -> Result<Vec<PathBuf>> {
		let mut entries = Vec::new();
		let mut dir = match tokio::fs::read_dir(&self.backups_dir).await {
			Ok(d) => d,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(e.into()),
		};
		let prefix = format!("{name}.");
		while let Some(entry) = dir.next_entry().await? {
			let file_name = entry.file_name();
			let file_name = file_name.to_string_lossy();
			if file_name.starts_with(&prefix) && file_name.ends_with(".bak") {
				entries.push(entry.path());
			}
		}
		entries.sort();
		Ok(entries)
	}

	/// Copies `backup_path` over `target_path`, atomically.
	pub async fn restore(&self, backup_path: &Path, target_path: &Path) -> Result<()> {
		let bytes = tokio::fs::read(backup_path).await?;
		self.write_raw(target_path, &bytes).await
	}

	/// Keeps the newest `keep` backups for `name`, deletes the rest.
	pub async fn cleanup(&self, name: &str, keep: usize) -> Result<()> {
		let mut backups = self.list_backups(name).await?;
		if backups.len() <= keep {
			return Ok(());
		}
		let to_delete = backups.drain(..backups.len() - keep);
		for path in to_delete {
			if let Err(e) = tokio::fs::remove_file(&path).await {
				warn!(path = %path.display(), error = %e, "failed to remove old backup");
			}
		}
		Ok(())
	}
}

fn iso_timestamp_now() -> String {
	let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default();
	let secs = now.as_secs();
	let millis = now.subsec_millis();
	format!("{secs}-{millis:03}")
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde::Deserialize;

	#[derive(Debug, Serialize, Deserialize, PartialEq)]
	struct Blob {
		n: u32,
	}

	#[tokio::test]
	async fn write_then_read_roundtrips() {
		let dir = tempfile::tempdir().unwrap();
		let store = AtomicStore::new(dir.path().join("backups"));
		let path = dir.path().join("blob.json");

		store.write(&path, &Blob { n: 7 }, WriteOptions::default()).await.unwrap();
		let out = store.read::<Blob>(&path).await;
		assert!(out.ok);
		assert_eq!(out.value.unwrap(), Blob { n: 7 });
	}

	#[tokio::test]
	async fn read_missing_file_is_non_fatal_and_not_corrupted() {
		let dir = tempfile::tempdir().unwrap();
		let store = AtomicStore::new(dir.path().join("backups"));
		let out = store.read::<Blob>(&dir.path().join("nope.json")).await;
		assert!(!out.ok);
		assert!(!out.corrupted);
	}

	#[tokio::test]
	async fn corrupted_concatenation_is_detected() {
		let dir = tempfile::tempdir().unwrap();
		let store = AtomicStore::new(dir.path().join("backups"));
		let path = dir.path().join("blob.json");
		tokio::fs::write(&path, br#"{"n":1}{"n":2}"#).await.unwrap();
		let out = store.read::<Blob>(&path).await;
		assert!(!out.ok);
		assert!(out.corrupted);
	}

	#[tokio::test]
	async fn string_value_containing_brace_pattern_is_not_flagged() {
		let dir = tempfile::tempdir().unwrap();
		let store = AtomicStore::new(dir.path().join("backups"));
		let path = dir.path().join("blob.json");
		#[derive(Debug, Serialize, Deserialize)]
		struct S {
			text: String,
		}
		tokio::fs::write(&path, br#"{"text":"}{"}"#).await.unwrap();
		let out = store.read::<S>(&path).await;
		assert!(out.ok, "error: {:?}", out.error);
	}

	#[tokio::test]
	async fn backup_then_cleanup_keeps_newest_n() {
		let dir = tempfile::tempdir().unwrap();
		let store = AtomicStore::new(dir.path().join("backups"));
		let path = dir.path().join("blob.json");

		for n in 0..5u32 {
			store.write(&path, &Blob { n }, WriteOptions { backup: true }).await.unwrap();
			tokio::time::sleep(std::time::Duration::from_millis(2)).await;
		}

		let backups = store.list_backups("blob.json").await.unwrap();
		assert_eq!(backups.len(), 4, "4 backups precede the 5th write (no self-backup on first write)");

		store.cleanup("blob.json", 2).await.unwrap();
		let remaining = store.list_backups("blob.json").await.unwrap();
		assert_eq!(remaining.len(), 2);
	}
}
