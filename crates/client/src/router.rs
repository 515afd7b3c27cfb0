//! Routing of inbound messages: responses to their pending context, events to the
//! notification table.

use std::path::PathBuf;
use std::time::Instant;

use ensime_rpc::{Event, Inbound};
use serde_json::Value as JsonValue;

use crate::client::Client;
use crate::editor::{EditorAdapter, Jump, Split};
use crate::error::Error;
use crate::session::{SessionEvent, SessionState};

impl<E: EditorAdapter> Client<E> {
	pub(crate) fn route(&mut self, msg: Inbound, now: Instant) {
		match msg {
			Inbound::Response(resp) => {
				if !self.pending.contains(resp.id) {
					tracing::debug!(call_id = %resp.id, "Dropping response for unknown id");
					return;
				}
				self.handle_response(resp, now);
			}
			Inbound::Event(event) => self.handle_event(&event),
		}
	}

	fn handle_event(&mut self, event: &Event) {
		let payload = &event.payload;
		tracing::trace!(typehint = %payload.typehint, "rpc.event");
		match event.kind() {
			"NewScalaNotesEvent" | "NewJavaNotesEvent" => self.render_notes(payload.array("notes")),
			"ClearAllScalaNotesEvent" | "ClearAllJavaNotesEvent" => {
				for file in self.diagnostics.clear_all() {
					self.editor.clear_markers(&file);
				}
			}
			"FullTypeCheckCompleteEvent" => self.editor.set_status("Typecheck complete"),
			"SendBackgroundMessageEvent" => {
				let detail = payload.str("detail").unwrap_or_default();
				self.editor.set_status(detail);
				if let Err(e) = self.session.apply(SessionEvent::Indexing) {
					tracing::debug!(error = %e, "Background message outside a connected session");
				}
			}
			"IndexerReadyEvent" => {
				self.editor.set_status("Indexer is ready");
				self.echo("Indexer is ready");
			}
			"AnalyzerReadyEvent" => match self.session.apply(SessionEvent::AnalyzerReady) {
				Ok(SessionState::Ready) => {
					self.editor.set_status(&SessionState::Ready.to_string());
					self.echo("Analyzer is ready");
				}
				Ok(state) => tracing::debug!(%state, "Analyzer ready before handshake"),
				Err(e) => tracing::debug!(error = %e, "Analyzer ready ignored"),
			},
			"DebugBreakEvent" => {
				if let Some((file, line)) = self.suspend_at(&payload.body) {
					self.echo(&format!("Execution breaked at {} {line}", file.display()));
				}
			}
			"DebugStepEvent" => {
				self.suspend_at(&payload.body);
			}
			"DebugOutputEvent" => self.editor.append_console(payload.str("body").unwrap_or_default()),
			"DebugVmStartEvent" => self.echo("Debug VM started"),
			"DebugVmDisconnectEvent" => {
				self.debug_thread = None;
				self.echo("Debug VM disconnected");
			}
			"DebugExceptionEvent" => {
				self.debug_thread = payload.get("threadId").cloned();
				let name = payload.str("exceptionName").unwrap_or("exception");
				let thread = payload.str("threadName").unwrap_or("unknown thread");
				self.echo(&format!("Exception {name} in {thread}"));
			}
			other => tracing::debug!(typehint = other, "Ignoring event"),
		}
	}

	/// Replaces the diagnostics of every file named by `notes` and redraws their markers.
	fn render_notes(&mut self, notes: &[JsonValue]) {
		for file in self.diagnostics.apply_notes(notes) {
			self.editor.clear_markers(&file);
			let marks: Vec<_> = self
				.diagnostics
				.get(&file)
				.iter()
				.map(|d| (d.line, d.severity, d.message.clone()))
				.collect();
			for (line, severity, message) in marks {
				self.editor.place_marker(&file, line, severity, &message);
			}
		}
	}

	/// Remembers the suspended thread and shows where it stopped.
	fn suspend_at(&mut self, body: &JsonValue) -> Option<(PathBuf, u32)> {
		self.debug_thread = body.get("threadId").cloned();
		let file = body.get("file").and_then(JsonValue::as_str).map(PathBuf::from);
		let line = body
			.get("line")
			.and_then(JsonValue::as_u64)
			.and_then(|l| u32::try_from(l).ok());
		let (Some(file), Some(line)) = (file, line) else {
			self.report(&Error::malformed("debug event", "file:line"));
			return None;
		};
		self.editor.open_split(&file, Jump::Line(line), Split::None);
		Some((file, line))
	}
}

#[cfg(test)]
mod tests {
	use std::path::Path;

	use ensime_rpc::Payload;
	use serde_json::json;

	use super::*;
	use crate::config::ClientConfig;
	use crate::editor::Severity;
	use crate::testing::{EditorCall, RecordingEditor};

	fn client() -> Client<RecordingEditor> {
		Client::new(ClientConfig::default(), RecordingEditor::new(), tokio::runtime::Handle::current())
	}

	fn event(body: JsonValue) -> Inbound {
		Inbound::Event(Event {
			payload: Payload::from_json(body).unwrap(),
		})
	}

	fn note(file: &str, line: u64, msg: &str) -> JsonValue {
		json!({"file": file, "msg": msg, "line": line, "col": 1, "beg": -1, "end": -1,
			"severity": {"typehint": "NoteError"}})
	}

	#[tokio::test]
	async fn notes_replace_the_named_file() {
		let mut c = client();
		let now = Instant::now();
		c.route(event(json!({"typehint": "NewScalaNotesEvent", "isFull": false,
			"notes": [note("/p/B.scala", 1, "old")]})), now);
		c.route(event(json!({"typehint": "NewScalaNotesEvent", "isFull": false,
			"notes": [note("/p/B.scala", 3, "x"), note("/p/B.scala", 7, "y")]})), now);

		let b = Path::new("/p/B.scala");
		let lines: Vec<_> = c.diagnostics().get(b).iter().map(|d| d.line).collect();
		assert_eq!(lines, [3, 7]);
		let placed: Vec<_> = c
			.editor()
			.calls()
			.iter()
			.filter_map(|call| match call {
				EditorCall::PlaceMarker { line, severity, .. } => Some((*line, *severity)),
				_ => None,
			})
			.collect();
		assert_eq!(placed, [(1, Severity::Error), (3, Severity::Error), (7, Severity::Error)]);
	}

	#[tokio::test]
	async fn clear_all_removes_markers() {
		let mut c = client();
		let now = Instant::now();
		c.route(event(json!({"typehint": "NewJavaNotesEvent", "notes": [note("/p/A.java", 2, "e")]})), now);
		c.route(event(json!({"typehint": "ClearAllJavaNotesEvent"})), now);
		assert!(c.diagnostics().is_empty());
		assert!(c.editor().calls().contains(&EditorCall::ClearMarkers(PathBuf::from("/p/A.java"))));
	}

	#[tokio::test]
	async fn break_event_moves_the_cursor() {
		let mut c = client();
		c.route(event(json!({"typehint": "DebugBreakEvent", "threadId": "3", "threadName": "main",
			"file": "/p/Main.scala", "line": 12})), Instant::now());
		assert_eq!(c.debug_thread, Some(json!("3")));
		assert!(c.editor().calls().contains(&EditorCall::OpenSplit {
			file: PathBuf::from("/p/Main.scala"),
			jump: Jump::Line(12),
			split: Split::None,
		}));
		assert_eq!(c.editor().echoes(), ["[ensime] Execution breaked at /p/Main.scala 12"]);

		c.route(event(json!({"typehint": "DebugVmDisconnectEvent"})), Instant::now());
		assert_eq!(c.debug_thread, None);
	}

	#[tokio::test]
	async fn output_goes_to_the_console() {
		let mut c = client();
		c.route(event(json!({"typehint": "DebugOutputEvent", "body": "hello\n"})), Instant::now());
		assert_eq!(c.editor().calls(), [EditorCall::AppendConsole("hello\n".into())]);
	}

	#[tokio::test]
	async fn unknown_events_and_responses_are_dropped() {
		let mut c = client();
		c.route(event(json!({"typehint": "CompilerRestartedEvent"})), Instant::now());
		let resp = Inbound::decode(br#"{"callId": 42, "payload": {"typehint": "TrueResponse"}}"#).unwrap();
		c.route(resp, Instant::now());
		assert!(c.editor().calls().is_empty());
	}

	#[tokio::test]
	async fn analyzer_ready_before_handshake_is_deferred() {
		let mut c = client();
		c.session.apply(SessionEvent::Start).unwrap();
		c.route(event(json!({"typehint": "AnalyzerReadyEvent"})), Instant::now());
		assert_eq!(c.state(), SessionState::Starting);
		assert!(c.editor().echoes().is_empty());
		assert_eq!(c.session.apply(SessionEvent::ConnectAck).unwrap(), SessionState::Ready);
	}
}
