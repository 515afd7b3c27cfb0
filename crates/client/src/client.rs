//! The per-project client context object.
//!
//! [`Client`] owns the session state, the transport, the pending-request table, diagnostics and
//! breakpoints. It is driven entirely through `&mut self`: commands from the host, idle ticks,
//! and (for async hosts) [`Client::pump`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use ensime_rpc::{CallId, CorrelationRegistry, DisconnectReason, Request, Transport, TransportEvent};
use serde_json::Value as JsonValue;
use tokio::runtime::Handle;

use crate::breakpoints::BreakpointSet;
use crate::config::ClientConfig;
use crate::diagnostics::DiagnosticStore;
use crate::dispatch::{Pending, Supersede};
use crate::editor::{EditorAdapter, IdleHandle, IdleTask};
use crate::error::{Error, Result};
use crate::request;
use crate::session::{Session, SessionEvent, SessionState};

/// Prefix of every user-visible message.
pub(crate) const PREFIX: &str = "[ensime]";

/// Editor-side client for one analysis server.
pub struct Client<E> {
	pub(crate) config: ClientConfig,
	pub(crate) editor: E,
	runtime: Handle,
	pub(crate) session: Session,
	pub(crate) transport: Option<Transport>,
	pub(crate) pending: CorrelationRegistry<Pending>,
	pub(crate) superseding: HashMap<Supersede, CallId>,
	pub(crate) diagnostics: DiagnosticStore,
	pub(crate) breakpoints: BreakpointSet,
	/// Thread suspended by the last break/step/exception event.
	pub(crate) debug_thread: Option<JsonValue>,
	pub(crate) full_types: bool,
	pub(crate) keep_alive: bool,
	pub(crate) next_proc_id: u64,
	poll_handle: Option<IdleHandle>,
	hint_handle: Option<IdleHandle>,
}

impl<E> std::fmt::Debug for Client<E> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Client")
			.field("state", &self.session.state())
			.field("pending", &self.pending.len())
			.field("diagnostics", &self.diagnostics.len())
			.field("breakpoints", &self.breakpoints.len())
			.finish_non_exhaustive()
	}
}

impl<E: EditorAdapter> Client<E> {
	/// Creates a client in [`SessionState::NotStarted`].
	///
	/// `runtime` runs the transport's socket I/O; the client itself never blocks on it.
	pub fn new(config: ClientConfig, editor: E, runtime: Handle) -> Self {
		Self {
			full_types: config.full_types,
			keep_alive: config.keep_alive,
			config,
			editor,
			runtime,
			session: Session::new(),
			transport: None,
			pending: CorrelationRegistry::new(),
			superseding: HashMap::new(),
			diagnostics: DiagnosticStore::new(),
			breakpoints: BreakpointSet::new(),
			debug_thread: None,
			next_proc_id: 1,
			poll_handle: None,
			hint_handle: None,
		}
	}

	/// Current session state.
	pub fn state(&self) -> SessionState {
		self.session.state()
	}

	/// The editor adapter.
	pub fn editor(&self) -> &E {
		&self.editor
	}

	/// The editor adapter, mutably.
	pub fn editor_mut(&mut self) -> &mut E {
		&mut self.editor
	}

	/// Active configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Known diagnostics.
	pub fn diagnostics(&self) -> &DiagnosticStore {
		&self.diagnostics
	}

	/// Breakpoints set in the editor.
	pub fn breakpoints(&self) -> &BreakpointSet {
		&self.breakpoints
	}

	/// Number of requests awaiting a response.
	pub fn pending_len(&self) -> usize {
		self.pending.len()
	}

	/// Whether types are shown fully qualified.
	pub fn full_types(&self) -> bool {
		self.full_types
	}

	/// Whether the server outlives the editor.
	pub fn keep_alive(&self) -> bool {
		self.keep_alive
	}

	/// Connects to the configured endpoint.
	///
	/// Does nothing if a session is already live.
	pub fn start(&mut self) -> Result<()> {
		if self.session.state().is_live() {
			tracing::debug!(state = %self.session.state(), "Start ignored; session is live");
			return Ok(());
		}
		let endpoint = self.config.resolve_endpoint()?;
		tracing::info!(%endpoint, "Starting session");
		let transport = Transport::open(endpoint, &self.runtime, self.config.connect_timeout());
		self.attach(transport)
	}

	/// Starts a session over an already opened transport.
	pub fn attach(&mut self, transport: Transport) -> Result<()> {
		self.session.apply(SessionEvent::Start)?;
		self.transport = Some(transport);
		self.schedule_poll();
		Ok(())
	}

	/// Shuts the server down now, regardless of keep-alive.
	pub fn stop(&mut self) {
		self.close(false, "client stopped");
	}

	/// Releases the session on editor exit; the server keeps running if keep-alive is on.
	pub fn teardown(&mut self) {
		let detach = self.keep_alive;
		self.close(detach, "editor exiting");
		if let Some(handle) = self.hint_handle.take() {
			self.editor.cancel_idle(handle);
		}
	}

	fn close(&mut self, detach: bool, reason: &str) {
		let Some(mut transport) = self.transport.take() else {
			return;
		};
		tracing::info!(detach, reason, "Closing session");
		transport.shutdown(detach);
		self.enter_down(SessionEvent::Disconnect, reason);
	}

	/// Drains every event already received, then expires overdue requests.
	///
	/// Never blocks. Returns the number of transport events handled.
	pub fn tick(&mut self, now: Instant) -> usize {
		let mut handled = 0;
		while let Some(event) = self.transport.as_mut().and_then(Transport::try_recv) {
			self.handle_transport_event(event, now);
			handled += 1;
		}
		self.expire(now);
		handled
	}

	/// Waits for the next transport event and handles it.
	///
	/// Returns false when there is no live transport.
	pub async fn pump(&mut self) -> bool {
		let Some(transport) = self.transport.as_mut() else {
			return false;
		};
		let Some(event) = transport.recv().await else {
			return false;
		};
		let now = Instant::now();
		self.handle_transport_event(event, now);
		self.expire(now);
		true
	}

	/// Runs an idle callback scheduled through [`EditorAdapter::schedule_idle`].
	pub fn on_idle(&mut self, task: IdleTask, now: Instant) {
		match task {
			IdleTask::Poll => {
				self.poll_handle = None;
				self.tick(now);
				if self.transport.is_some() {
					self.schedule_poll();
				}
			}
			IdleTask::DiagnosticHint => {
				self.hint_handle = None;
				self.show_diagnostic_at_cursor();
			}
		}
	}

	/// Host notification that the cursor moved; re-arms the diagnostic hint.
	pub fn cursor_moved(&mut self) {
		if let Some(handle) = self.hint_handle.take() {
			self.editor.cancel_idle(handle);
		}
		if !self.diagnostics.is_empty() {
			let delay = self.config.hint_delay();
			self.hint_handle = Some(self.editor.schedule_idle(delay, IdleTask::DiagnosticHint));
		}
	}

	fn show_diagnostic_at_cursor(&mut self) {
		let Some(file) = self.editor.current_file() else {
			return;
		};
		let (line, col) = self.editor.cursor_position();
		let width = self.editor.window_width().saturating_sub(1);
		if let Some(summary) = self.diagnostics.at(&file, line, col).map(|d| d.summary(width)) {
			self.editor.echo(&summary);
		}
	}

	fn schedule_poll(&mut self) {
		if self.poll_handle.is_none() {
			let delay = self.config.poll_interval();
			self.poll_handle = Some(self.editor.schedule_idle(delay, IdleTask::Poll));
		}
	}

	pub(crate) fn handle_transport_event(&mut self, event: TransportEvent, now: Instant) {
		match event {
			TransportEvent::Connected => {
				if let Err(e) = self.submit(request::connection_info(), Pending::Handshake, now) {
					self.report(&e);
				}
			}
			TransportEvent::Message(msg) => self.route(msg, now),
			TransportEvent::Disconnected(reason) => {
				self.transport = None;
				self.on_disconnected(&reason);
			}
		}
	}

	fn on_disconnected(&mut self, reason: &DisconnectReason) {
		tracing::warn!(%reason, "Transport disconnected");
		let event = if reason.is_crash() {
			SessionEvent::FatalError
		} else {
			SessionEvent::Disconnect
		};
		if let DisconnectReason::ConnectFailed(e) | DisconnectReason::Failed(e) = reason {
			self.echo(&e.to_string());
		}
		self.enter_down(event, &reason.to_string());
	}

	/// Moves to Disconnected/Crashed: fails every pending request and clears diagnostics.
	fn enter_down(&mut self, event: SessionEvent, reason: &str) {
		if let Err(e) = self.session.apply(event) {
			tracing::warn!(error = %e, "Session did not accept disconnect");
		}
		for (entry, err) in self.pending.cancel_all(reason) {
			self.report_failure(&entry.command, &Error::Rpc(err));
		}
		self.superseding.clear();
		self.debug_thread = None;
		for file in self.diagnostics.clear_all() {
			self.editor.clear_markers(&file);
		}
		if let Some(handle) = self.poll_handle.take() {
			self.editor.cancel_idle(handle);
		}
		self.editor.set_status(&self.session.state().to_string());
	}

	fn expire(&mut self, now: Instant) {
		let mut handshake_lost = false;
		for (entry, err) in self.pending.expire(now) {
			self.forget_superseding(entry.id);
			handshake_lost |= matches!(entry.context, Pending::Handshake);
			self.report_failure(&entry.command, &Error::Rpc(err));
		}
		if handshake_lost {
			self.abort_session("handshake timed out");
		}
	}

	/// Drops a session whose handshake failed; `start` may reconnect afterwards.
	pub(crate) fn abort_session(&mut self, reason: &str) {
		if let Some(mut transport) = self.transport.take() {
			transport.shutdown(false);
		}
		tracing::warn!(reason, "Session handshake failed");
		self.enter_down(SessionEvent::FatalError, reason);
	}

	/// Registers and sends `req`, cancelling the request it supersedes.
	pub(crate) fn submit(&mut self, mut req: Request, pending: Pending, now: Instant) -> Result<CallId> {
		let Some(transport) = self.transport.as_ref() else {
			return Err(Error::Rpc(ensime_rpc::Error::Transport("no active session".into())));
		};

		let supersede = pending.supersede();
		let timeout = self.timeout_for(&pending);
		let id = self.pending.allocate(req.typehint.clone(), pending, now, Some(timeout));
		req.id = id;
		if let Err(e) = transport.send(&req) {
			self.pending.cancel(id);
			return Err(e.into());
		}
		if let Some(previous) = supersede.and_then(|key| self.superseding.insert(key, id)) {
			self.pending.cancel(previous);
		}
		Ok(id)
	}

	fn timeout_for(&self, pending: &Pending) -> Duration {
		match pending {
			Pending::Completion { .. } => self.config.completion_timeout(),
			_ => self.config.request_timeout(),
		}
	}

	pub(crate) fn forget_superseding(&mut self, id: CallId) {
		self.superseding.retain(|_, current| *current != id);
	}

	/// Echoes a prefixed single-line message.
	pub(crate) fn echo(&mut self, message: &str) {
		let line = message.lines().map(str::trim).collect::<Vec<_>>().join(" ");
		self.editor.echo(&format!("{PREFIX} {line}"));
	}

	/// Reports a command failure to the user.
	pub(crate) fn report(&mut self, err: &Error) {
		tracing::debug!(error = %err, "Reporting error");
		self.echo(&err.to_string());
	}

	pub(crate) fn report_failure(&mut self, command: &str, err: &Error) {
		tracing::info!(command, error = %err, "Request failed");
		self.echo(&format!("{command}: {err}"));
	}
}

impl<E> Drop for Client<E> {
	fn drop(&mut self) {
		if let Some(transport) = self.transport.as_mut() {
			transport.shutdown(self.keep_alive);
		}
	}
}
