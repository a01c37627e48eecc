//! Entry point (SPEC_FULL §4.2 "CLI front-end"). Grounded on the teacher's
//! `main.rs`: parse args, init logging, dispatch, print a JSON error envelope
//! to stdout and a human line to stderr on failure, exit non-zero.

mod cli;
mod commands;
mod daemon;
mod error;
mod logging;
mod output;
mod styles;

use clap::Parser;

use cli::Cli;
use output::print_error_stderr;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let format = cli.format;
	if let Err(err) = commands::dispatch(cli, format).await {
		handle_error(&err, format);
		std::process::exit(1);
	}
}

fn handle_error(err: &error::CliError, format: output::OutputFormat) {
	let command_error = err.to_command_error();
	print_error_stderr(&command_error);

	let envelope = output::CommandResult::<()> {
		schema_version: output::SCHEMA_VERSION,
		ok: false,
		command: "unknown".to_string(),
		data: None,
		error: Some(command_error),
		timings: output::Timings { duration_ms: 0 },
	};
	output::print_result(&envelope, format);
}
