//! The discriminated error taxonomy from the core error-handling design (§7).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Structured error values carrying a stable `kind` and a human message.
///
/// `profile.snapshot-non-atomic` from §7 is deliberately *not* a variant
/// here: it is a warning attached to a successful `Profile::resolve`
/// result, not a failure (see `openchrome_runtime::profile::ResolvedProfile`).
#[derive(Debug, Error)]
pub enum Error {
	#[error("tab {tab} does not belong to session {session}")]
	SessionIsolation { session: String, tab: String },

	#[error("session not found: {0}")]
	SessionNotFound(String),

	#[error("tab not found: {0}")]
	TabNotFound(String),

	#[error("operation timed out after {ms}ms")]
	QueueTimeout { ms: u64 },

	#[error("session torn down, operation cancelled")]
	QueueCancelled,

	#[error("cdp call {method} timed out after {ms}ms")]
	CdpTimeout { method: String, ms: u64 },

	#[error("cdp protocol error: {0}")]
	CdpProtocol(String),

	#[error("debug port never opened: {0}")]
	LauncherPortUnreachable(String),

	#[error("no element matched query {query:?} (best candidate: {best_name:?}, score {best_score})")]
	FinderNoMatch {
		query: String,
		best_name: Option<String>,
		best_score: i32,
	},

	#[error("best match for {query:?} scored only {score} (minimum 10): {name:?}")]
	FinderLowConfidence {
		query: String,
		name: Option<String>,
		score: i32,
	},

	#[error("ref {reference} is stale: {reason}")]
	RefStale { reference: String, reason: String },

	#[error("config blob at {path} is corrupted: {reason}")]
	ConfigCorrupted { path: String, reason: String },

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error("{0}")]
	Other(String),
}

impl Error {
	/// Maps to the `kind` string used in the RPC error envelope (§7).
	pub fn kind(&self) -> &'static str {
		match self {
			Error::SessionIsolation { .. } => "session.isolation",
			Error::SessionNotFound(_) => "session.not-found",
			Error::TabNotFound(_) => "tab.not-found",
			Error::QueueTimeout { .. } => "queue.timeout",
			Error::QueueCancelled => "queue.cancelled",
			Error::CdpTimeout { .. } => "cdp.timeout",
			Error::CdpProtocol(_) => "cdp.protocol",
			Error::LauncherPortUnreachable(_) => "launcher.port-unreachable",
			Error::FinderNoMatch { .. } => "finder.no-match",
			Error::FinderLowConfidence { .. } => "finder.low-confidence",
			Error::RefStale { .. } => "ref.stale",
			Error::ConfigCorrupted { .. } => "config.corrupted",
			Error::Io(_) => "io",
			Error::Json(_) => "json",
			Error::Other(_) => "internal",
		}
	}

	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::QueueTimeout { .. } | Error::CdpTimeout { .. })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn kind_strings_match_error_handling_table() {
		assert_eq!(Error::SessionIsolation { session: "s".into(), tab: "t".into() }.kind(), "session.isolation");
		assert_eq!(Error::QueueTimeout { ms: 1 }.kind(), "queue.timeout");
		assert_eq!(Error::CdpTimeout { method: "Page.navigate".into(), ms: 1 }.kind(), "cdp.timeout");
	}

	#[test]
	fn timeout_classification() {
		assert!(Error::QueueTimeout { ms: 1 }.is_timeout());
		assert!(Error::CdpTimeout { method: "x".into(), ms: 1 }.is_timeout());
		assert!(!Error::QueueCancelled.is_timeout());
	}
}
