//! Session lifecycle state machine and command gating.

use crate::command::Command;
use crate::error::{Error, Result};

/// Lifecycle state of the connection to the analysis server.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum SessionState {
	/// Client created; no server contact yet.
	#[default]
	NotStarted,
	/// Transport opening, handshake in flight.
	Starting,
	/// Handshake acknowledged.
	Connected,
	/// Server reported background indexing.
	Indexing,
	/// Analyzer ready; every command is available.
	Ready,
	/// Connection closed (peer EOF, shutdown, or failed connect).
	Disconnected,
	/// Connection failed mid-session (I/O error or protocol violation).
	Crashed,
}

impl SessionState {
	/// Returns true once the handshake has been acknowledged and until the connection drops.
	pub fn is_connected(self) -> bool {
		matches!(self, Self::Connected | Self::Indexing | Self::Ready)
	}

	/// Returns true while a transport is expected to exist.
	pub fn is_live(self) -> bool {
		self == Self::Starting || self.is_connected()
	}
}

/// Inputs that drive [`SessionState`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum SessionEvent {
	/// The user (or host) asked for a session.
	Start,
	/// The server answered the handshake.
	ConnectAck,
	/// The server reported background work.
	Indexing,
	/// The analyzer finished loading.
	AnalyzerReady,
	/// The connection closed.
	Disconnect,
	/// The connection failed.
	FatalError,
}

/// Minimum session state a command needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
	/// Full semantic analysis.
	Ready,
	/// An acknowledged connection, indexing or not.
	Connected,
	/// No requirement.
	Any,
}

/// Current state plus the bookkeeping transitions need.
#[derive(Debug, Default)]
pub struct Session {
	state: SessionState,
	/// Analyzer-ready seen before the handshake was acknowledged.
	ready_early: bool,
}

impl Session {
	/// Creates a session in [`SessionState::NotStarted`].
	pub fn new() -> Self {
		Self::default()
	}

	#[cfg(test)]
	pub(crate) fn with_state(state: SessionState) -> Self {
		Self {
			state,
			ready_early: false,
		}
	}

	/// Current state.
	pub fn state(&self) -> SessionState {
		self.state
	}

	/// Applies `event` and returns the resulting state.
	///
	/// # Errors
	///
	/// [`Error::InvalidTransition`] leaves the state unchanged.
	pub fn apply(&mut self, event: SessionEvent) -> Result<SessionState> {
		use SessionEvent as Ev;
		use SessionState as St;

		let next = match (self.state, event) {
			(St::NotStarted | St::Disconnected | St::Crashed, Ev::Start) => {
				self.ready_early = false;
				St::Starting
			}
			(St::Starting, Ev::ConnectAck) => {
				if std::mem::take(&mut self.ready_early) {
					St::Ready
				} else {
					St::Connected
				}
			}
			(St::Starting, Ev::AnalyzerReady) => {
				self.ready_early = true;
				St::Starting
			}
			(St::Connected | St::Indexing, Ev::Indexing) => St::Indexing,
			(St::Ready, Ev::Indexing) => St::Ready,
			(St::Connected | St::Indexing, Ev::AnalyzerReady) => St::Ready,
			(_, Ev::Disconnect) => St::Disconnected,
			(_, Ev::FatalError) => St::Crashed,
			(from, event) => {
				tracing::debug!(%from, %event, "Rejected session transition");
				return Err(Error::InvalidTransition { from, event });
			}
		};

		if next != self.state {
			tracing::info!(from = %self.state, to = %next, %event, "Session state changed");
		}
		self.state = next;
		Ok(next)
	}

	/// Returns true if a command behind `gate` may run now.
	pub fn admits(&self, gate: Gate) -> bool {
		match gate {
			Gate::Ready => self.state == SessionState::Ready,
			Gate::Connected => self.state.is_connected(),
			Gate::Any => true,
		}
	}

	/// Checks `command` against its gate.
	///
	/// # Errors
	///
	/// [`Error::NotReady`] when the gate is closed.
	pub fn check(&self, command: Command) -> Result<()> {
		if self.admits(command.gate()) {
			Ok(())
		} else {
			Err(Error::NotReady {
				command,
				state: self.state,
			})
		}
	}
}

#[cfg(test)]
mod tests {
	use strum::IntoEnumIterator;

	use super::*;

	fn started() -> Session {
		let mut s = Session::new();
		s.apply(SessionEvent::Start).unwrap();
		s
	}

	#[test]
	fn happy_path_reaches_ready() {
		let mut s = started();
		assert_eq!(s.apply(SessionEvent::ConnectAck).unwrap(), SessionState::Connected);
		assert_eq!(s.apply(SessionEvent::Indexing).unwrap(), SessionState::Indexing);
		assert_eq!(s.apply(SessionEvent::AnalyzerReady).unwrap(), SessionState::Ready);
	}

	#[test]
	fn indexing_never_downgrades_ready() {
		let mut s = started();
		s.apply(SessionEvent::ConnectAck).unwrap();
		s.apply(SessionEvent::AnalyzerReady).unwrap();
		assert_eq!(s.apply(SessionEvent::Indexing).unwrap(), SessionState::Ready);
	}

	#[test]
	fn early_analyzer_ready_applies_after_ack() {
		let mut s = started();
		assert_eq!(s.apply(SessionEvent::AnalyzerReady).unwrap(), SessionState::Starting);
		assert_eq!(s.apply(SessionEvent::ConnectAck).unwrap(), SessionState::Ready);
	}

	#[test]
	fn early_ready_does_not_survive_restart() {
		let mut s = started();
		s.apply(SessionEvent::AnalyzerReady).unwrap();
		s.apply(SessionEvent::Disconnect).unwrap();
		s.apply(SessionEvent::Start).unwrap();
		assert_eq!(s.apply(SessionEvent::ConnectAck).unwrap(), SessionState::Connected);
	}

	#[test]
	fn disconnect_and_crash_from_anywhere() {
		for state in SessionState::iter() {
			let mut s = Session::with_state(state);
			assert_eq!(s.apply(SessionEvent::Disconnect).unwrap(), SessionState::Disconnected);
			let mut s = Session::with_state(state);
			assert_eq!(s.apply(SessionEvent::FatalError).unwrap(), SessionState::Crashed);
		}
	}

	#[test]
	fn invalid_transitions_leave_state_unchanged() {
		let mut s = Session::new();
		assert!(matches!(
			s.apply(SessionEvent::ConnectAck),
			Err(Error::InvalidTransition {
				from: SessionState::NotStarted,
				event: SessionEvent::ConnectAck
			})
		));
		assert_eq!(s.state(), SessionState::NotStarted);

		let mut s = Session::with_state(SessionState::Ready);
		assert!(s.apply(SessionEvent::Start).is_err());
		assert_eq!(s.state(), SessionState::Ready);
	}

	#[test]
	fn ready_gated_commands_need_ready() {
		for command in Command::iter().filter(|c| c.gate() == Gate::Ready) {
			for state in SessionState::iter() {
				let result = Session::with_state(state).check(command);
				if state == SessionState::Ready {
					assert!(result.is_ok(), "{command} rejected in Ready");
				} else {
					assert!(
						matches!(result, Err(Error::NotReady { state: s, .. }) if s == state),
						"{command} admitted in {state}"
					);
				}
			}
		}
	}

	#[test]
	fn connected_gate_admits_indexing() {
		let s = Session::with_state(SessionState::Indexing);
		assert!(s.admits(Gate::Connected));
		assert!(!s.admits(Gate::Ready));
		assert!(!Session::with_state(SessionState::Starting).admits(Gate::Connected));
		assert!(Session::with_state(SessionState::Crashed).admits(Gate::Any));
	}
}
