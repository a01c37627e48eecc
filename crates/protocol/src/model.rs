//! On-disk data model types (§3): persisted through the Atomic File Store.

use serde::{Deserialize, Serialize};

/// `SameSite` cookie attribute, matching CDP's `Network.CookieSameSite`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SameSite {
	Strict,
	Lax,
	None,
}

/// A single cookie, in the shape CDP's `Network.getAllCookies`/`setCookies`
/// and the storage-state blob (§4.12) both use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
	pub name: String,
	pub value: String,
	pub domain: String,
	pub path: String,
	/// Unix seconds; `-1` (or absent) means a session cookie.
	#[serde(default = "default_session_expiry")]
	pub expires: f64,
	#[serde(default)]
	pub http_only: bool,
	#[serde(default)]
	pub secure: bool,
	#[serde(default)]
	pub same_site: Option<SameSite>,
}

fn default_session_expiry() -> f64 {
	-1.0
}

impl Cookie {
	/// Session cookies (no expiry) are never dropped by restore filtering.
	pub fn is_session(&self) -> bool {
		self.expires <= 0.0
	}

	/// §4.12 / §8 restore filter: drop expired non-session cookies.
	pub fn is_expired(&self, now_secs: f64) -> bool {
		!self.is_session() && self.expires < now_secs
	}
}

/// Records the most recent atomic snapshot of the real Chrome profile's
/// cookies (§3 `SyncMetadata`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncMetadata {
	pub last_sync_timestamp: u64,
	pub source_profile_dir: String,
	/// `"<mtime_ms>:<size>"` of the source cookies file at snapshot time.
	pub source_profile_hash: String,
	pub sync_count: u64,
}

/// Schema version for `SyncMetadata`, bumped on breaking changes.
pub const SYNC_METADATA_SCHEMA: u32 = 1;

/// A versioned export of a page's cookies and localStorage (§3
/// `StorageState`, §4.12).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageState {
	pub version: u32,
	pub timestamp: u64,
	pub cookies: Vec<Cookie>,
	pub local_storage: std::collections::BTreeMap<String, String>,
}

/// Current `StorageState.version`; restore rejects any other value (§4.12).
pub const STORAGE_STATE_SCHEMA: u32 = 1;

impl StorageState {
	pub fn new(cookies: Vec<Cookie>, local_storage: std::collections::BTreeMap<String, String>, timestamp: u64) -> Self {
		Self { version: STORAGE_STATE_SCHEMA, timestamp, cookies, local_storage }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn session_cookie_is_never_expired() {
		let c = Cookie {
			name: "sid".into(),
			value: "x".into(),
			domain: "example.com".into(),
			path: "/".into(),
			expires: -1.0,
			http_only: true,
			secure: true,
			same_site: Some(SameSite::Lax),
		};
		assert!(c.is_session());
		assert!(!c.is_expired(1_900_000_000.0));
	}

	#[test]
	fn expired_non_session_cookie_is_dropped() {
		let c = Cookie {
			name: "old".into(),
			value: "x".into(),
			domain: "example.com".into(),
			path: "/".into(),
			expires: 100.0,
			http_only: false,
			secure: false,
			same_site: None,
		};
		assert!(c.is_expired(200.0));
		assert!(!c.is_expired(50.0));
	}
}
