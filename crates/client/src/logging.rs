//! Tracing subscriber setup for editor hosts.
//!
//! Editors own the terminal, so logs always go to a file. `ENSIME_CLIENT_LOG` takes an
//! [`EnvFilter`] directive; `ENSIME_CLIENT_DEBUG` raises the default level to `debug`.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// Filter directive override.
pub const LOG_ENV: &str = "ENSIME_CLIENT_LOG";
/// Debug switch.
pub const DEBUG_ENV: &str = "ENSIME_CLIENT_DEBUG";

/// Picks the filter directive from the environment and the configured level.
pub fn filter_directive(level: &str, debug: bool, env_directive: Option<&str>) -> String {
	if let Some(directive) = env_directive.filter(|d| !d.trim().is_empty()) {
		return directive.to_owned();
	}
	let level = if debug { "debug" } else { level };
	format!("ensime_client={level},ensime_rpc={level},warn")
}

/// Installs the global subscriber, writing to the configured log file.
///
/// Returns the log file path.
///
/// # Errors
///
/// [`Error::Logging`] if the file cannot be opened or a subscriber is already installed.
pub fn init(config: &ClientConfig) -> Result<PathBuf> {
	let path = config.log_file();
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).map_err(|e| Error::Logging(format!("{}: {e}", parent.display())))?;
	}
	let file = OpenOptions::new()
		.create(true)
		.append(true)
		.open(&path)
		.map_err(|e| Error::Logging(format!("{}: {e}", path.display())))?;

	let env_directive = std::env::var(LOG_ENV).ok();
	let directive = filter_directive(
		&config.log.level,
		std::env::var_os(DEBUG_ENV).is_some(),
		env_directive.as_deref(),
	);
	let filter = EnvFilter::try_new(&directive).map_err(|e| Error::Logging(format!("{directive:?}: {e}")))?;

	let file_layer = tracing_subscriber::fmt::layer()
		.with_writer(Mutex::new(file))
		.with_ansi(false)
		.with_target(true);

	tracing_subscriber::registry()
		.with(filter)
		.with(file_layer)
		.try_init()
		.map_err(|e| Error::Logging(e.to_string()))?;

	tracing::info!(path = %path.display(), %directive, "Client tracing initialized");
	Ok(path)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn env_directive_wins() {
		assert_eq!(filter_directive("info", true, Some("trace")), "trace");
	}

	#[test]
	fn debug_switch_raises_level() {
		assert_eq!(
			filter_directive("warn", true, None),
			"ensime_client=debug,ensime_rpc=debug,warn"
		);
		assert_eq!(
			filter_directive("info", false, Some("  ")),
			"ensime_client=info,ensime_rpc=info,warn"
		);
	}

	#[test]
	fn init_writes_to_cache_dir() {
		let dir = tempfile::tempdir().unwrap();
		let config = ClientConfig::for_project(dir.path());
		let path = init(&config).unwrap();
		assert!(path.starts_with(dir.path()));
		assert!(path.exists());
		assert!(matches!(init(&config), Err(Error::Logging(_))));
	}
}
