//! Typed configuration aggregating the numeric defaults scattered through
//! §4 of the core spec into one place loaded once at startup (SPEC_FULL §3
//! "Config"), instead of ambient magic numbers at each call site.

use std::path::PathBuf;
use std::time::Duration;

/// C5 Tab Pool configuration (§4.5).
#[derive(Debug, Clone)]
pub struct PoolConfig {
	pub min_pool_size: usize,
	pub max_pool_size: usize,
	pub page_idle_timeout: Duration,
	pub pre_warm: bool,
	pub maintenance_interval: Duration,
}

impl Default for PoolConfig {
	fn default() -> Self {
		Self { min_pool_size: 2, max_pool_size: 10, page_idle_timeout: Duration::from_millis(300_000), pre_warm: true, maintenance_interval: Duration::from_secs(30) }
	}
}

/// C3 Browser Launcher configuration (§4.3, §6 env vars).
#[derive(Debug, Clone)]
pub struct LauncherConfig {
	pub explicit_binary: Option<PathBuf>,
	pub headless_shell_binary: Option<PathBuf>,
	pub debug_port: u16,
	pub headless: bool,
	pub auto_launch: bool,
	pub ci_sandbox_disable: bool,
}

impl Default for LauncherConfig {
	fn default() -> Self {
		Self {
			explicit_binary: std::env::var("CHROME_PATH").ok().map(PathBuf::from),
			headless_shell_binary: std::env::var("CHROME_HEADLESS_SHELL").ok().map(PathBuf::from),
			debug_port: 9222,
			headless: true,
			auto_launch: true,
			ci_sandbox_disable: openchrome_runtime::launcher::is_ci_environment(),
		}
	}
}

/// C7 Request Queue configuration (§4.7).
#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
	pub item_timeout: Duration,
}

impl Default for QueueConfig {
	fn default() -> Self {
		Self { item_timeout: Duration::from_secs(120) }
	}
}

/// C11 Session Manager configuration. The core spec leaves the idle-TTL
/// default an open question (§3 only says "configurable idle TTL"); resolved
/// in DESIGN.md in favor of 15 minutes, matching the tab pool's much shorter
/// `page_idle_timeout` scaled up for a logical client workspace rather than
/// a single pooled page.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
	pub idle_ttl: Duration,
	pub ttl_sweep_interval: Duration,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self { idle_ttl: Duration::from_secs(900), ttl_sweep_interval: Duration::from_secs(60) }
	}
}

/// C2 Profile Manager configuration (§4.2).
#[derive(Debug, Clone, Default)]
pub struct ProfileConfig {
	pub explicit_dir: Option<PathBuf>,
	pub force_temp: bool,
	pub real_profile_dir: Option<PathBuf>,
}

/// Aggregates every layer's config, built once at startup (SPEC_FULL §4.15).
#[derive(Debug, Clone, Default)]
pub struct Config {
	pub pool: PoolConfig,
	pub launcher: LauncherConfig,
	pub queue: QueueConfig,
	pub profile: ProfileConfig,
	pub session: SessionConfig,
}

impl Config {
	/// Loads defaults, then applies environment-variable overrides named in
	/// §6 of the core spec. CLI flags, where present, override these in
	/// turn (applied by the caller after `from_env`).
	pub fn from_env() -> Self {
		let mut cfg = Self::default();
		if let Some(home) = dirs::home_dir() {
			cfg.profile.real_profile_dir = default_real_profile_dir(&home);
		}
		cfg
	}
}

#[cfg(target_os = "linux")]
fn default_real_profile_dir(home: &std::path::Path) -> Option<PathBuf> {
	Some(home.join(".config/google-chrome"))
}

#[cfg(target_os = "macos")]
fn default_real_profile_dir(home: &std::path::Path) -> Option<PathBuf> {
	Some(home.join("Library/Application Support/Google/Chrome"))
}

#[cfg(target_os = "windows")]
fn default_real_profile_dir(_home: &std::path::Path) -> Option<PathBuf> {
	std::env::var_os("LOCALAPPDATA").map(|p| PathBuf::from(p).join(r"Google\Chrome\User Data"))
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn default_real_profile_dir(_home: &std::path::Path) -> Option<PathBuf> {
	None
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pool_config_defaults_match_spec() {
		let cfg = PoolConfig::default();
		assert_eq!(cfg.min_pool_size, 2);
		assert_eq!(cfg.max_pool_size, 10);
		assert_eq!(cfg.page_idle_timeout, Duration::from_millis(300_000));
		assert!(cfg.pre_warm);
	}

	#[test]
	fn queue_config_default_timeout_is_120s() {
		assert_eq!(QueueConfig::default().item_timeout, Duration::from_secs(120));
	}
}
