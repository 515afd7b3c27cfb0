//! Wire-level error taxonomy.

use crate::correlation::CallId;

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by the transport and the correlation registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The transport could not be established (refused, spawn failure, timeout).
	#[error("cannot connect to {endpoint}: {reason}")]
	Connection {
		/// Human readable endpoint description.
		endpoint: String,
		/// Why the attempt failed.
		reason: String,
	},
	/// Send or receive failure on an established (or not yet established) connection.
	#[error("transport error: {0}")]
	Transport(String),
	/// No response arrived before the request deadline.
	#[error("request {id} ({command}) timed out")]
	Timeout {
		/// The expired request.
		id: CallId,
		/// Request typehint, for the user-facing message.
		command: String,
	},
	/// The connection went away while the request was pending.
	#[error("connection lost: {reason}")]
	ConnectionLost {
		/// Why the connection was torn down.
		reason: String,
	},
	/// The server answered with an explicit error payload.
	#[error("server error: {0}")]
	Server(ServerError),
	/// The peer sent something that violates the message format.
	#[error("protocol error: {0}")]
	Protocol(String),
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Self::Protocol(err.to_string())
	}
}

/// Error payload carried by a failed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
	/// Optional numeric code (`RpcError` only).
	pub code: Option<i64>,
	/// Description supplied by the server.
	pub message: String,
}

impl std::fmt::Display for ServerError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.code {
			Some(code) => write!(f, "{} (code {code})", self.message),
			None => f.write_str(&self.message),
		}
	}
}
