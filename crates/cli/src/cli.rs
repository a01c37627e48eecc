//! Argument parsing (SPEC_FULL §6 "CLI subcommands"): one subcommand per
//! core operation, 1:1 onto the `SessionManager`/`Session`/`Profile`/
//! `Launcher`/`DOM`/`Finder`/`Storage` surfaces. Grounded on the teacher's
//! `cli/mod.rs` (`clap` derive `Cli`/`Commands` split, `-v`/`-f` globals,
//! `cli_styles()`).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;
use crate::styles::cli_styles;

#[derive(Parser, Debug)]
#[command(name = "openchrome")]
#[command(about = "Headless-capable browser automation server fronting a single Chrome process")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug).
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format.
	#[arg(short = 'f', long, global = true, value_enum, default_value = "json")]
	pub format: OutputFormat,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Create, inspect, or tear down a logical session.
	Session(SessionArgs),
	/// Create or list tabs within a session.
	Tab(TabArgs),
	/// Navigate a tab to a URL.
	Navigate(NavigateArgs),
	/// Evaluate a JavaScript expression in a tab.
	Eval(EvalArgs),
	/// Capture a screenshot of a tab.
	Screenshot(ScreenshotArgs),
	/// Serialize a tab's DOM to compact text (C8).
	Read(ReadArgs),
	/// Resolve a natural-language query to a stable element ref (C9).
	Find(FindArgs),
	/// Find an element and click it, reporting the DOM delta (C9 + C10).
	Click(ClickArgs),
	/// Save or restore cookies/localStorage (C12).
	Storage(StorageArgs),
	/// Manage the background daemon that hosts one shared `Core`.
	Daemon(DaemonArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
	#[command(subcommand)]
	pub action: SessionAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SessionAction {
	/// Create a session, optionally under a caller-chosen id.
	Start {
		#[arg(long)]
		id: Option<String>,
	},
	/// Destroy a session, cascading to its tabs.
	Stop {
		#[arg(value_name = "SESSION_ID")]
		id: String,
	},
	/// Show a session's tab ids and activity timestamps.
	Status {
		#[arg(value_name = "SESSION_ID")]
		id: String,
	},
}

#[derive(Args, Debug, Clone)]
pub struct TabArgs {
	#[command(subcommand)]
	pub action: TabAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TabAction {
	/// Acquire a pooled tab for a session, optionally navigating it.
	New {
		#[arg(long)]
		session: String,
		#[arg(long)]
		url: Option<String>,
		/// Worker-group label for the new tab; defaults to the unlabeled worker.
		#[arg(long)]
		worker: Option<String>,
	},
	/// List tab ids owned by a session.
	List {
		#[arg(long)]
		session: String,
	},
}

#[derive(Args, Debug, Clone)]
pub struct TabSelector {
	#[arg(long)]
	pub session: String,
	#[arg(long)]
	pub tab: String,
}

#[derive(Args, Debug, Clone)]
pub struct NavigateArgs {
	#[command(flatten)]
	pub tab: TabSelector,
	#[arg(value_name = "URL")]
	pub url: String,
}

#[derive(Args, Debug, Clone)]
pub struct EvalArgs {
	#[command(flatten)]
	pub tab: TabSelector,
	#[arg(value_name = "EXPRESSION")]
	pub expression: String,
}

#[derive(Args, Debug, Clone)]
pub struct ScreenshotArgs {
	#[command(flatten)]
	pub tab: TabSelector,
	#[arg(value_name = "PATH")]
	pub path: PathBuf,
	#[arg(long, default_value = "png")]
	pub format: String,
	#[arg(long)]
	pub quality: Option<u8>,
}

#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
	#[command(flatten)]
	pub tab: TabSelector,
	/// -1 for unlimited (§4.8 default).
	#[arg(long, default_value_t = -1)]
	pub max_depth: i64,
	#[arg(long, default_value_t = 50_000)]
	pub max_output_chars: usize,
	#[arg(long)]
	pub interactive_only: bool,
	#[arg(long)]
	pub no_page_stats: bool,
	#[arg(long)]
	pub no_pierce_iframes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct FindArgs {
	#[command(flatten)]
	pub tab: TabSelector,
	#[arg(value_name = "QUERY")]
	pub query: String,
}

#[derive(Args, Debug, Clone)]
pub struct ClickArgs {
	#[command(flatten)]
	pub tab: TabSelector,
	#[arg(value_name = "QUERY")]
	pub query: String,
	#[arg(long, default_value_t = 500)]
	pub max_chars: usize,
}

#[derive(Args, Debug, Clone)]
pub struct StorageArgs {
	#[command(subcommand)]
	pub action: StorageAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum StorageAction {
	Save {
		#[command(flatten)]
		tab: TabSelector,
		#[arg(value_name = "PATH")]
		path: PathBuf,
	},
	Restore {
		#[command(flatten)]
		tab: TabSelector,
		#[arg(value_name = "PATH")]
		path: PathBuf,
	},
}

#[derive(Args, Debug, Clone)]
pub struct DaemonArgs {
	#[command(subcommand)]
	pub action: DaemonAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum DaemonAction {
	/// Start the daemon (foregrounded; run under a process supervisor or `&` to background it).
	Start,
	Stop,
	Status,
}
