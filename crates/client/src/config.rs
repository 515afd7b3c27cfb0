//! Client configuration.
//!
//! Loaded from TOML; every field has a default so an empty file is valid. Relative paths are
//! resolved against the directory of the configuration file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ensime_rpc::{Endpoint, ServerCommand};
use serde::Deserialize;

/// File the server writes its protocol port to.
pub const PORT_FILE: &str = "port";
/// File the server writes its documentation HTTP port to.
pub const HTTP_FILE: &str = "http";
/// Log file name inside the cache directory.
pub const LOG_FILE: &str = "ensime-client.log";

/// Configuration failures.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
	/// Reading a file failed.
	#[error("cannot read {}: {source}", path.display())]
	Io {
		/// File involved.
		path: PathBuf,
		/// Underlying error.
		#[source]
		source: std::io::Error,
	},
	/// The TOML did not parse.
	#[error("invalid configuration {}: {source}", path.display())]
	Parse {
		/// File involved.
		path: PathBuf,
		/// Underlying error.
		#[source]
		source: toml::de::Error,
	},
	/// The port file does not hold a port number.
	#[error("invalid port file {}: {contents:?}", path.display())]
	BadPortFile {
		/// File involved.
		path: PathBuf,
		/// What it contained.
		contents: String,
	},
	/// No address, no server command, and no port file.
	#[error("no server address configured and no port file at {}", .0.display())]
	NoEndpoint(PathBuf),
}

/// Command used to spawn the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerCommandConfig {
	/// Executable.
	pub program: PathBuf,
	/// Arguments.
	pub args: Vec<String>,
	/// Extra environment.
	pub env: HashMap<String, String>,
	/// Working directory.
	pub cwd: Option<PathBuf>,
}

/// Logging options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
	/// Default level directive (`info`, `debug`, ...).
	pub level: String,
	/// Log file; defaults to `<cache_dir>/ensime-client.log`.
	pub file: Option<PathBuf>,
}

impl Default for LogConfig {
	fn default() -> Self {
		Self {
			level: "info".into(),
			file: None,
		}
	}
}

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
	/// Directory where the server publishes its port files.
	pub cache_dir: PathBuf,
	/// Explicit `host:port` of a running server.
	pub address: Option<String>,
	/// Server to spawn when no address is given.
	pub server_command: Option<ServerCommandConfig>,
	/// Base URL of the documentation server.
	pub doc_address: Option<String>,
	/// Default deadline for requests, in seconds.
	pub request_timeout_secs: u64,
	/// Deadline for completion requests, in seconds.
	pub completion_timeout_secs: u64,
	/// Deadline for establishing the connection, in seconds.
	pub connect_timeout_secs: u64,
	/// Interval between transport polls, in milliseconds.
	pub poll_interval_ms: u64,
	/// Delay before echoing the diagnostic under the cursor, in milliseconds.
	pub hint_delay_ms: u64,
	/// Maximum completion candidates requested.
	pub max_completions: u32,
	/// Start with fully qualified type names.
	pub full_types: bool,
	/// Leave the server running when the editor exits.
	pub keep_alive: bool,
	/// Ask before applying refactorings.
	pub confirm_refactorings: bool,
	/// Default debugger host.
	pub debug_host: String,
	/// Default debugger port.
	pub debug_port: u16,
	/// Logging.
	pub log: LogConfig,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			cache_dir: PathBuf::from(".ensime_cache"),
			address: None,
			server_command: None,
			doc_address: None,
			request_timeout_secs: 30,
			completion_timeout_secs: 10,
			connect_timeout_secs: 5,
			poll_interval_ms: 250,
			hint_delay_ms: 500,
			max_completions: 100,
			full_types: false,
			keep_alive: false,
			confirm_refactorings: false,
			debug_host: "localhost".into(),
			debug_port: 5005,
			log: LogConfig::default(),
		}
	}
}

impl ClientConfig {
	/// Reads and parses `path`.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
			path: path.to_path_buf(),
			source,
		})?;
		let mut config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
			path: path.to_path_buf(),
			source,
		})?;
		if let Some(base) = path.parent() {
			config.rebase(base);
		}
		tracing::debug!(path = %path.display(), "Loaded client configuration");
		Ok(config)
	}

	/// Parses TOML without touching the filesystem.
	pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
		toml::from_str(text).map_err(|source| ConfigError::Parse {
			path: PathBuf::from("<string>"),
			source,
		})
	}

	/// Defaults for a project rooted at `root`.
	pub fn for_project(root: &Path) -> Self {
		let mut config = Self::default();
		config.rebase(root);
		config
	}

	fn rebase(&mut self, base: &Path) {
		if self.cache_dir.is_relative() {
			self.cache_dir = base.join(&self.cache_dir);
		}
		if let Some(file) = self.log.file.as_mut().filter(|f| f.is_relative()) {
			*file = base.join(&*file);
		}
	}

	/// Default request deadline.
	pub fn request_timeout(&self) -> Duration {
		Duration::from_secs(self.request_timeout_secs)
	}

	/// Completion request deadline.
	pub fn completion_timeout(&self) -> Duration {
		Duration::from_secs(self.completion_timeout_secs)
	}

	/// Connection deadline.
	pub fn connect_timeout(&self) -> Duration {
		Duration::from_secs(self.connect_timeout_secs)
	}

	/// Transport poll interval.
	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}

	/// Diagnostic hint delay.
	pub fn hint_delay(&self) -> Duration {
		Duration::from_millis(self.hint_delay_ms)
	}

	/// Path of the client log.
	pub fn log_file(&self) -> PathBuf {
		self.log.file.clone().unwrap_or_else(|| self.cache_dir.join(LOG_FILE))
	}

	/// Picks the server endpoint: explicit address, then server command, then port file.
	pub fn resolve_endpoint(&self) -> Result<Endpoint, ConfigError> {
		if let Some(address) = &self.address {
			return Ok(Endpoint::Tcp(address.clone()));
		}
		if let Some(cmd) = &self.server_command {
			let mut command = ServerCommand::new(&cmd.program)
				.args(cmd.args.iter().cloned())
				.env(cmd.env.clone());
			if let Some(cwd) = &cmd.cwd {
				command = command.cwd(cwd);
			}
			return Ok(Endpoint::Process(command));
		}

		let path = self.cache_dir.join(PORT_FILE);
		match read_port(&path)? {
			Some(port) => Ok(Endpoint::Tcp(format!("127.0.0.1:{port}"))),
			None => Err(ConfigError::NoEndpoint(path)),
		}
	}

	/// Base URL of the documentation server, from `doc_address` or the http port file.
	pub fn resolve_doc_address(&self) -> Option<String> {
		if let Some(address) = &self.doc_address {
			return Some(address.trim_end_matches('/').to_owned());
		}
		match read_port(&self.cache_dir.join(HTTP_FILE)) {
			Ok(Some(port)) => Some(format!("http://127.0.0.1:{port}")),
			Ok(None) => None,
			Err(e) => {
				tracing::warn!(error = %e, "Ignoring documentation port file");
				None
			}
		}
	}
}

/// Reads a port file; a missing file is not an error.
fn read_port(path: &Path) -> Result<Option<u16>, ConfigError> {
	let contents = match std::fs::read_to_string(path) {
		Ok(contents) => contents,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
		Err(source) => {
			return Err(ConfigError::Io {
				path: path.to_path_buf(),
				source,
			});
		}
	};
	contents
		.trim()
		.parse()
		.map(Some)
		.map_err(|_| ConfigError::BadPortFile {
			path: path.to_path_buf(),
			contents,
		})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_toml_gives_defaults() {
		let config = ClientConfig::from_toml_str("").unwrap();
		assert_eq!(config, ClientConfig::default());
		assert_eq!(config.request_timeout(), Duration::from_secs(30));
		assert_eq!(config.completion_timeout(), Duration::from_secs(10));
		assert_eq!(config.poll_interval(), Duration::from_millis(250));
		assert_eq!(config.max_completions, 100);
	}

	#[test]
	fn parses_overrides() {
		let config = ClientConfig::from_toml_str(
			r#"
			address = "10.0.0.2:4444"
			full_types = true
			request_timeout_secs = 5

			[log]
			level = "debug"
			"#,
		)
		.unwrap();
		assert_eq!(config.address.as_deref(), Some("10.0.0.2:4444"));
		assert!(config.full_types);
		assert_eq!(config.request_timeout(), Duration::from_secs(5));
		assert_eq!(config.log.level, "debug");
		assert_eq!(config.resolve_endpoint().unwrap(), Endpoint::Tcp("10.0.0.2:4444".into()));
	}

	#[test]
	fn rejects_bad_toml() {
		assert!(matches!(ClientConfig::from_toml_str("full_types = 3"), Err(ConfigError::Parse { .. })));
	}

	#[test]
	fn load_resolves_relative_paths() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("ensime-client.toml");
		std::fs::write(&path, "cache_dir = \"cache\"\n").unwrap();

		let config = ClientConfig::load(&path).unwrap();
		assert_eq!(config.cache_dir, dir.path().join("cache"));
		assert_eq!(config.log_file(), dir.path().join("cache").join(LOG_FILE));
	}

	#[test]
	fn server_command_beats_port_file() {
		let dir = tempfile::tempdir().unwrap();
		let mut config = ClientConfig::for_project(dir.path());
		std::fs::create_dir_all(&config.cache_dir).unwrap();
		std::fs::write(config.cache_dir.join(PORT_FILE), "4321\n").unwrap();
		assert_eq!(config.resolve_endpoint().unwrap(), Endpoint::Tcp("127.0.0.1:4321".into()));

		config.server_command = Some(ServerCommandConfig {
			program: "ensime-server".into(),
			args: vec!["--stdio".into()],
			..Default::default()
		});
		let Endpoint::Process(cmd) = config.resolve_endpoint().unwrap() else {
			panic!("expected a process endpoint");
		};
		assert_eq!(cmd.args, ["--stdio"]);
	}

	#[test]
	fn missing_port_file_is_no_endpoint() {
		let dir = tempfile::tempdir().unwrap();
		let config = ClientConfig::for_project(dir.path());
		assert!(matches!(config.resolve_endpoint(), Err(ConfigError::NoEndpoint(_))));
	}

	#[test]
	fn garbage_port_file_is_reported() {
		let dir = tempfile::tempdir().unwrap();
		let config = ClientConfig::for_project(dir.path());
		std::fs::create_dir_all(&config.cache_dir).unwrap();
		std::fs::write(config.cache_dir.join(PORT_FILE), "soon").unwrap();
		assert!(matches!(config.resolve_endpoint(), Err(ConfigError::BadPortFile { .. })));
	}

	#[test]
	fn doc_address_falls_back_to_http_file() {
		let dir = tempfile::tempdir().unwrap();
		let mut config = ClientConfig::for_project(dir.path());
		assert_eq!(config.resolve_doc_address(), None);

		std::fs::create_dir_all(&config.cache_dir).unwrap();
		std::fs::write(config.cache_dir.join(HTTP_FILE), "8080").unwrap();
		assert_eq!(config.resolve_doc_address().as_deref(), Some("http://127.0.0.1:8080"));

		config.doc_address = Some("http://docs.local/".into());
		assert_eq!(config.resolve_doc_address().as_deref(), Some("http://docs.local"));
	}
}
