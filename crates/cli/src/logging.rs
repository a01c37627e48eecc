//! Structured logging (SPEC_FULL §4.13): a `-v`/`-vv` flag selects one of
//! three `EnvFilter` presets; `RUST_LOG` always takes precedence when set.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

pub fn init_logging(verbosity: u8) {
	// 0 = quiet (core crates at warn)
	// 1 (-v) = info, core crates kept at warn to cut CDP chatter
	// 2+ (-vv) = debug everywhere
	let filter = match verbosity {
		0 => "warn,openchrome_core=warn,openchrome_runtime=warn",
		1 => "info,openchrome_core=warn,openchrome_runtime=warn",
		_ => "debug",
	};

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}
