//! Structured output envelope for every CLI command (SPEC_FULL §4.2 "CLI
//! front-end"). Grounded on the teacher's `output/mod.rs` `CommandResult`/
//! `ResultBuilder` pair, trimmed to the three formats this workspace needs
//! (`json`/`ndjson`/`text` — the `toon` token-efficient codec is dropped,
//! see `DESIGN.md`).
//!
//! ```json
//! { "ok": true, "command": "navigate", "data": { ... }, "timings": { "durationMs": 12 } }
//! ```
//! ```json
//! { "ok": false, "command": "navigate", "error": { "code": "NAVIGATION_FAILED", "message": "..." } }
//! ```

use std::io::{self, Write};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	#[default]
	Json,
	Ndjson,
	Text,
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutputFormat::Json => write!(f, "json"),
			OutputFormat::Ndjson => write!(f, "ndjson"),
			OutputFormat::Text => write!(f, "text"),
		}
	}
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	pub schema_version: u32,
	pub ok: bool,
	pub command: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,
	pub timings: Timings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
	pub code: ErrorCode,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Mirrors the `ErrorKind` taxonomy from the core spec's §7 error table,
/// spelled as `SCREAMING_SNAKE_CASE` for the wire envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	SessionIsolation,
	SessionNotFound,
	TabNotFound,
	QueueTimeout,
	QueueCancelled,
	CdpTimeout,
	CdpProtocol,
	LauncherPortUnreachable,
	FinderNoMatch,
	FinderLowConfidence,
	RefStale,
	ConfigCorrupted,
	IoError,
	InvalidInput,
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			ErrorCode::SessionIsolation => "SESSION_ISOLATION",
			ErrorCode::SessionNotFound => "SESSION_NOT_FOUND",
			ErrorCode::TabNotFound => "TAB_NOT_FOUND",
			ErrorCode::QueueTimeout => "QUEUE_TIMEOUT",
			ErrorCode::QueueCancelled => "QUEUE_CANCELLED",
			ErrorCode::CdpTimeout => "CDP_TIMEOUT",
			ErrorCode::CdpProtocol => "CDP_PROTOCOL",
			ErrorCode::LauncherPortUnreachable => "LAUNCHER_PORT_UNREACHABLE",
			ErrorCode::FinderNoMatch => "FINDER_NO_MATCH",
			ErrorCode::FinderLowConfidence => "FINDER_LOW_CONFIDENCE",
			ErrorCode::RefStale => "REF_STALE",
			ErrorCode::ConfigCorrupted => "CONFIG_CORRUPTED",
			ErrorCode::IoError => "IO_ERROR",
			ErrorCode::InvalidInput => "INVALID_INPUT",
			ErrorCode::InternalError => "INTERNAL_ERROR",
		};
		write!(f, "{s}")
	}
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
	pub duration_ms: u64,
}

impl From<Duration> for Timings {
	fn from(duration: Duration) -> Self {
		Timings { duration_ms: duration.as_millis() as u64 }
	}
}

pub struct ResultBuilder<T: Serialize> {
	command: String,
	data: Option<T>,
	error: Option<CommandError>,
	start_time: Instant,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(command: impl Into<String>) -> Self {
		Self { command: command.into(), data: None, error: None, start_time: Instant::now() }
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(mut self, code: ErrorCode, message: impl Into<String>, details: Option<serde_json::Value>) -> Self {
		self.error = Some(CommandError { code, message: message.into(), details });
		self
	}

	pub fn build(self) -> CommandResult<T> {
		CommandResult {
			schema_version: SCHEMA_VERSION,
			ok: self.error.is_none(),
			command: self.command,
			data: self.data,
			error: self.error,
			timings: Timings::from(self.start_time.elapsed()),
		}
	}
}

pub fn print_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) {
	match format {
		OutputFormat::Json => {
			if let Ok(json) = serde_json::to_string_pretty(result) {
				println!("{json}");
			}
		}
		OutputFormat::Ndjson => {
			if let Ok(json) = serde_json::to_string(result) {
				println!("{json}");
			}
		}
		OutputFormat::Text => print_result_text(result),
	}
}

fn print_result_text<T: Serialize>(result: &CommandResult<T>) {
	let mut stdout = io::stdout().lock();

	if result.ok {
		if let Some(ref data) = result.data
			&& let Ok(json) = serde_json::to_string_pretty(data)
		{
			let _ = writeln!(stdout, "{json}");
		}
	} else if let Some(ref error) = result.error {
		let _ = writeln!(stdout, "Error [{}]: {}", error.code, error.message);
		if let Some(ref details) = error.details
			&& let Ok(json) = serde_json::to_string_pretty(details)
		{
			let _ = writeln!(stdout, "Details: {json}");
		}
	}

	let _ = writeln!(stdout, "Completed in {}ms", result.timings.duration_ms);
}

pub fn print_error_stderr(error: &CommandError) {
	eprintln!("Error [{}]: {}", error.code, error.message);
}

pub type EmptyResult = CommandResult<()>;
