//! C6: stable opaque element references scoped to `(session, tab)`,
//! mapped to CDP backend node ids (§4.6, §3 `ElementRef`).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// A ref is stale (but still usable) after this long (§3, §4.6).
pub const REF_TTL: Duration = Duration::from_secs(30);
/// The largest backend node id `resolve` will accept as a raw integer form.
const MAX_BACKEND_NODE_ID: i64 = i32::MAX as i64;

#[derive(Debug, Clone)]
pub struct RefEntry {
	pub backend_node_id: i64,
	pub role: String,
	pub name: String,
	pub tag_name: Option<String>,
	pub text_prefix: Option<String>,
	pub created_at: Instant,
}

/// Outcome of `validate` (§4.6).
#[derive(Debug, Clone)]
pub struct ValidateOutcome {
	pub valid: bool,
	pub stale: bool,
	pub reason: Option<String>,
}

#[derive(Default)]
struct TabPartition {
	counter: AtomicU64,
	refs: parking_lot::RwLock<BTreeMap<u64, RefEntry>>,
}

/// Keyed by `(session_id, tab_id)`. Each partition's generate/resolve is
/// implicitly serialized by that session's FIFO queue (§5); `clearSession`
/// is the only operation that must exclude concurrent access across an
/// entire session's partitions, which the outer `DashMap` entry removal
/// handles atomically per key.
#[derive(Default)]
pub struct RefTable {
	partitions: DashMap<(String, String), TabPartition>,
}

impl RefTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// §4.6 `generate`: assigns the next `ref_<N>` for this tab.
	pub fn generate(&self, session: &str, tab: &str, backend_node_id: i64, role: &str, name: &str, tag_name: Option<&str>, text_prefix: Option<&str>) -> String {
		let partition = self.partitions.entry((session.to_string(), tab.to_string())).or_default();
		let n = partition.counter.fetch_add(1, Ordering::SeqCst) + 1;
		let entry = RefEntry {
			backend_node_id,
			role: role.to_string(),
			name: name.to_string(),
			tag_name: tag_name.map(str::to_string),
			text_prefix: text_prefix.map(|t| clip_text_prefix(t)),
			created_at: Instant::now(),
		};
		partition.refs.write().insert(n, entry);
		format!("ref_{n}")
	}

	/// §4.6 `resolve`: accepts `ref_<N>`, a plain positive integer string,
	/// or `node_<integer>` — the latter two are treated directly as a
	/// backend node id.
	pub fn resolve(&self, session: &str, tab: &str, input: &str) -> Option<i64> {
		if let Some(n_str) = input.strip_prefix("ref_") {
			let n: u64 = n_str.parse().ok()?;
			let partition = self.partitions.get(&(session.to_string(), tab.to_string()))?;
			return partition.refs.read().get(&n).map(|e| e.backend_node_id);
		}

		let raw = input.strip_prefix("node_").unwrap_or(input);
		let id: i64 = raw.parse().ok()?;
		if id <= 0 || id > MAX_BACKEND_NODE_ID {
			return None;
		}
		// Reject non-canonical forms like "007" or "+5" that `parse` accepts
		// loosely but which aren't how backend node ids are ever printed.
		if raw.to_string() != id.to_string() {
			return None;
		}
		Some(id)
	}

	/// §4.6 `validate`: compares stored tag (case-insensitive) and the
	/// first-30-chars text prefix against the caller's current observation
	/// of the element. Age beyond `REF_TTL` marks the ref `stale` without
	/// invalidating it.
	pub fn validate(&self, session: &str, tab: &str, reference: &str, current_tag: &str, current_text_prefix: &str) -> ValidateOutcome {
		let Some(n_str) = reference.strip_prefix("ref_") else {
			return ValidateOutcome { valid: false, stale: false, reason: Some("not a ref_<N> handle".into()) };
		};
		let Ok(n) = n_str.parse::<u64>() else {
			return ValidateOutcome { valid: false, stale: false, reason: Some("malformed ref id".into()) };
		};
		let Some(partition) = self.partitions.get(&(session.to_string(), tab.to_string())) else {
			return ValidateOutcome { valid: false, stale: false, reason: Some("no refs for this tab".into()) };
		};
		let refs = partition.refs.read();
		let Some(entry) = refs.get(&n) else {
			return ValidateOutcome { valid: false, stale: false, reason: Some("ref not found (tab likely re-scanned)".into()) };
		};

		if let Some(stored_tag) = &entry.tag_name
			&& !stored_tag.eq_ignore_ascii_case(current_tag)
		{
			return ValidateOutcome { valid: false, stale: false, reason: Some(format!("tag changed: {stored_tag} -> {current_tag}")) };
		}

		let clipped_current = clip_text_prefix(current_text_prefix);
		if let Some(stored_text) = &entry.text_prefix
			&& *stored_text != clipped_current
		{
			return ValidateOutcome { valid: false, stale: false, reason: Some("text content changed".into()) };
		}

		let stale = entry.created_at.elapsed() > REF_TTL;
		ValidateOutcome { valid: true, stale, reason: None }
	}

	/// §4.6 `clearTab`: drops all refs for `(session, tab)` and resets its
	/// counter so the next scan's refs start at `ref_1` again (§8 ref
	/// determinism property).
	pub fn clear_tab(&self, session: &str, tab: &str) {
		if let Some(partition) = self.partitions.get(&(session.to_string(), tab.to_string())) {
			partition.refs.write().clear();
			partition.counter.store(0, Ordering::SeqCst);
		}
	}

	/// §4.6 `clearSession`: drops every partition belonging to `session`.
	pub fn clear_session(&self, session: &str) {
		self.partitions.retain(|(s, _), _| s != session);
	}
}

fn clip_text_prefix(text: &str) -> String {
	let trimmed = text.trim();
	trimmed.chars().take(30).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ref_determinism_after_clear_tab() {
		let table = RefTable::new();
		table.generate("s", "t", 1, "button", "old", None, None);
		table.clear_tab("s", "t");
		let r1 = table.generate("s", "t", 10, "button", "A", None, None);
		let r2 = table.generate("s", "t", 11, "link", "B", None, None);
		let r3 = table.generate("s", "t", 12, "textbox", "C", None, None);
		assert_eq!(r1, "ref_1");
		assert_eq!(r2, "ref_2");
		assert_eq!(r3, "ref_3");
	}

	#[test]
	fn resolve_accepts_all_three_forms() {
		let table = RefTable::new();
		let r = table.generate("s", "t", 142, "button", "OK", Some("button"), Some("OK"));
		assert_eq!(r, "ref_1");
		assert_eq!(table.resolve("s", "t", "ref_1"), Some(142));
		assert_eq!(table.resolve("s", "t", "142"), Some(142));
		assert_eq!(table.resolve("s", "t", "node_142"), Some(142));
		assert_eq!(table.resolve("s", "t", "totally_invalid"), None);
	}

	#[test]
	fn resolve_rejects_non_canonical_and_out_of_range() {
		let table = RefTable::new();
		assert_eq!(table.resolve("s", "t", "007"), None);
		assert_eq!(table.resolve("s", "t", "0"), None);
		assert_eq!(table.resolve("s", "t", "-5"), None);
		assert_eq!(table.resolve("s", "t", "9999999999999"), None);
	}

	#[test]
	fn resolve_is_scoped_per_session_and_tab() {
		let table = RefTable::new();
		table.generate("s1", "t1", 5, "button", "x", None, None);
		assert_eq!(table.resolve("s1", "t1", "ref_1"), Some(5));
		assert_eq!(table.resolve("s2", "t1", "ref_1"), None);
		assert_eq!(table.resolve("s1", "t2", "ref_1"), None);
	}

	#[test]
	fn validate_detects_tag_and_text_mismatch() {
		let table = RefTable::new();
		let r = table.generate("s", "t", 1, "button", "OK", Some("button"), Some("OK"));
		let n = r.strip_prefix("ref_").unwrap();
		let _ = n;
		let good = table.validate("s", "t", &r, "button", "OK");
		assert!(good.valid);
		assert!(!good.stale);

		let bad_tag = table.validate("s", "t", &r, "a", "OK");
		assert!(!bad_tag.valid);

		let bad_text = table.validate("s", "t", &r, "button", "Cancel");
		assert!(!bad_text.valid);
	}

	#[test]
	fn clear_session_drops_every_owned_partition() {
		let table = RefTable::new();
		table.generate("s1", "t1", 1, "button", "a", None, None);
		table.generate("s1", "t2", 2, "button", "b", None, None);
		table.generate("s2", "t1", 3, "button", "c", None, None);
		table.clear_session("s1");
		assert_eq!(table.resolve("s1", "t1", "ref_1"), None);
		assert_eq!(table.resolve("s1", "t2", "ref_1"), None);
		assert_eq!(table.resolve("s2", "t1", "ref_1"), Some(3));
	}
}
