//! CLI-level error type (SPEC_FULL §4.14 "the RPC boundary ... the CLI
//! prints the message to stderr and exits non-zero"). Grounded on the
//! teacher's `error.rs` `PwError` shape (a `thiserror` enum with a
//! `to_command_error` conversion and an `OutputAlreadyPrinted` sentinel for
//! commands that already streamed partial output before failing), re-keyed
//! to the `openchrome_protocol::Error` taxonomy instead of Playwright's.

use thiserror::Error;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error(transparent)]
	Core(#[from] openchrome_protocol::Error),

	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error(transparent)]
	Rpc(#[from] jsonrpsee::core::ClientError),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl CliError {
	pub fn to_command_error(&self) -> CommandError {
		let (code, message, details) = match self {
			CliError::Core(err) => (core_error_code(err), err.to_string(), None),
			CliError::InvalidInput(msg) => (ErrorCode::InvalidInput, msg.clone(), None),
			CliError::Rpc(err) => (ErrorCode::InternalError, format!("daemon RPC failed: {err}"), None),
			CliError::Io(err) => (ErrorCode::IoError, err.to_string(), None),
			CliError::Json(err) => (ErrorCode::InternalError, format!("JSON error: {err}"), None),
			CliError::Anyhow(err) => (ErrorCode::InternalError, err.to_string(), None),
		};
		CommandError { code, message, details }
	}
}

/// Maps `openchrome_protocol::Error::kind()` (§7) onto the wire `ErrorCode`.
fn core_error_code(err: &openchrome_protocol::Error) -> ErrorCode {
	use openchrome_protocol::Error::*;
	match err {
		SessionIsolation { .. } => ErrorCode::SessionIsolation,
		SessionNotFound(_) => ErrorCode::SessionNotFound,
		TabNotFound(_) => ErrorCode::TabNotFound,
		QueueTimeout { .. } => ErrorCode::QueueTimeout,
		QueueCancelled => ErrorCode::QueueCancelled,
		CdpTimeout { .. } => ErrorCode::CdpTimeout,
		CdpProtocol(_) => ErrorCode::CdpProtocol,
		LauncherPortUnreachable(_) => ErrorCode::LauncherPortUnreachable,
		FinderNoMatch { .. } => ErrorCode::FinderNoMatch,
		FinderLowConfidence { .. } => ErrorCode::FinderLowConfidence,
		RefStale { .. } => ErrorCode::RefStale,
		ConfigCorrupted { .. } => ErrorCode::ConfigCorrupted,
		Io(_) => ErrorCode::IoError,
		Json(_) => ErrorCode::InternalError,
		Other(_) => ErrorCode::InternalError,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn session_isolation_maps_to_matching_error_code() {
		let err = CliError::Core(openchrome_protocol::Error::SessionIsolation { session: "s".into(), tab: "t".into() });
		assert_eq!(err.to_command_error().code, ErrorCode::SessionIsolation);
	}

	#[test]
	fn invalid_input_carries_message_through() {
		let err = CliError::InvalidInput("missing --url".into());
		let cmd_err = err.to_command_error();
		assert_eq!(cmd_err.code, ErrorCode::InvalidInput);
		assert_eq!(cmd_err.message, "missing --url");
	}
}
