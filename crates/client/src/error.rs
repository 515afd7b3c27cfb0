//! Client error taxonomy.

use crate::command::Command;
use crate::config::ConfigError;
use crate::session::{SessionEvent, SessionState};

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the client core.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The command needs a session state the client is not in.
	#[error("{command} is not available while the session is {state}")]
	NotReady {
		/// Rejected command.
		command: Command,
		/// State at the time of the call.
		state: SessionState,
	},
	/// The editor context cannot support the command (no symbol under the cursor, missing
	/// argument, no suspended thread, ...).
	#[error("{0}")]
	InvalidContext(String),
	/// The session state machine refused an event.
	#[error("invalid session transition: {event} while {from}")]
	InvalidTransition {
		/// State the event was applied to.
		from: SessionState,
		/// Offending event.
		event: SessionEvent,
	},
	/// No command with this name exists.
	#[error("unknown command {0:?}")]
	UnknownCommand(String),
	/// Transport, correlation or server failure.
	#[error(transparent)]
	Rpc(#[from] ensime_rpc::Error),
	/// Configuration could not be loaded or resolved.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// The tracing subscriber could not be installed.
	#[error("logging setup failed: {0}")]
	Logging(String),
}

impl Error {
	/// Shorthand for [`Error::InvalidContext`].
	pub(crate) fn context(message: impl Into<String>) -> Self {
		Self::InvalidContext(message.into())
	}

	/// Shorthand for a malformed success payload.
	pub(crate) fn malformed(typehint: &str, field: &str) -> Self {
		Self::Rpc(ensime_rpc::Error::Protocol(format!("{typehint} without {field}")))
	}
}
