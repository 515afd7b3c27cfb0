//! Test doubles: an editor that records every adapter call and an in-memory fake server.
//!
//! Enabled by the `testing` feature.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use ensime_rpc::{FrameCodec, Transport};
use futures::{SinkExt, StreamExt};
use serde_json::{Value as JsonValue, json};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::runtime::Handle;
use tokio_util::codec::Framed;

use crate::client::Client;
use crate::config::ClientConfig;
use crate::editor::{CompletionItem, EditorAdapter, IdleHandle, IdleTask, Jump, QuickfixItem, Severity, Split};

/// One recorded [`EditorAdapter`] call.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorCall {
	PlaceMarker {
		file: PathBuf,
		line: u32,
		severity: Severity,
		message: String,
	},
	ClearMarkers(PathBuf),
	OpenSplit {
		file: PathBuf,
		jump: Jump,
		split: Split,
	},
	ScheduleIdle {
		handle: IdleHandle,
		delay: Duration,
		task: IdleTask,
	},
	CancelIdle(IdleHandle),
	PromptUser(String),
	Echo(String),
	SetStatus(String),
	SetQuickfix(Vec<QuickfixItem>),
	ReplaceBuffer {
		file: PathBuf,
		text: String,
	},
	AppendConsole(String),
	ShowScratch {
		title: String,
		lines: Vec<String>,
	},
	ShowCompletions {
		start_col: u32,
		items: Vec<CompletionItem>,
	},
	AskInput(String),
	Choose {
		prompt: String,
		choices: Vec<String>,
	},
	SaveCurrent,
	ApplyRefactoring {
		file: PathBuf,
		diff: PathBuf,
	},
	OpenUrl(String),
}

/// Scriptable editor that records every call made to it.
#[derive(Debug, Clone)]
pub struct RecordingEditor {
	file: Option<PathBuf>,
	lines: Vec<String>,
	cursor: (u32, u32),
	width: usize,
	prompt_answer: bool,
	inputs: VecDeque<String>,
	choice: Option<usize>,
	refactor_ok: bool,
	url_ok: bool,
	next_idle: u64,
	calls: Vec<EditorCall>,
}

impl Default for RecordingEditor {
	fn default() -> Self {
		Self {
			file: None,
			lines: Vec::new(),
			cursor: (1, 0),
			width: 80,
			prompt_answer: true,
			inputs: VecDeque::new(),
			choice: None,
			refactor_ok: true,
			url_ok: false,
			next_idle: 1,
			calls: Vec::new(),
		}
	}
}

impl RecordingEditor {
	/// An editor with no buffer open.
	pub fn new() -> Self {
		Self::default()
	}

	/// Opens `file` with the given contents.
	#[must_use]
	pub fn with_buffer(mut self, file: impl Into<PathBuf>, lines: &[&str]) -> Self {
		self.file = Some(file.into());
		self.lines = lines.iter().map(|l| (*l).to_owned()).collect();
		self
	}

	/// Places the cursor at 1-based `line`, 0-based `col`.
	#[must_use]
	pub fn at(mut self, line: u32, col: u32) -> Self {
		self.cursor = (line, col);
		self
	}

	/// Moves the cursor.
	pub fn move_to(&mut self, line: u32, col: u32) {
		self.cursor = (line, col);
	}

	/// Answer given to [`EditorAdapter::prompt_user`].
	#[must_use]
	pub fn answering(mut self, yes: bool) -> Self {
		self.prompt_answer = yes;
		self
	}

	/// Queues a reply for [`EditorAdapter::ask_input`].
	#[must_use]
	pub fn with_input(mut self, input: impl Into<String>) -> Self {
		self.inputs.push_back(input.into());
		self
	}

	/// Index picked by [`EditorAdapter::choose`].
	#[must_use]
	pub fn choosing(mut self, choice: Option<usize>) -> Self {
		self.choice = choice;
		self
	}

	/// Whether refactoring diffs apply cleanly.
	#[must_use]
	pub fn applying_refactors(mut self, ok: bool) -> Self {
		self.refactor_ok = ok;
		self
	}

	/// Whether a browser can be opened.
	#[must_use]
	pub fn with_browser(mut self, ok: bool) -> Self {
		self.url_ok = ok;
		self
	}

	/// Window width reported to the client.
	#[must_use]
	pub fn with_width(mut self, width: usize) -> Self {
		self.width = width;
		self
	}

	/// Every call so far, oldest first.
	pub fn calls(&self) -> &[EditorCall] {
		&self.calls
	}

	/// Drains the recorded calls.
	pub fn take_calls(&mut self) -> Vec<EditorCall> {
		std::mem::take(&mut self.calls)
	}

	/// Echoed messages, oldest first.
	pub fn echoes(&self) -> Vec<String> {
		self.calls
			.iter()
			.filter_map(|c| match c {
				EditorCall::Echo(msg) => Some(msg.clone()),
				_ => None,
			})
			.collect()
	}

	/// Last status text set.
	pub fn status(&self) -> Option<&str> {
		self.calls.iter().rev().find_map(|c| match c {
			EditorCall::SetStatus(text) => Some(text.as_str()),
			_ => None,
		})
	}

	/// Idle tasks scheduled and not cancelled.
	pub fn scheduled(&self) -> Vec<(IdleHandle, IdleTask)> {
		let mut live = Vec::new();
		for call in &self.calls {
			match call {
				EditorCall::ScheduleIdle { handle, task, .. } => live.push((*handle, *task)),
				EditorCall::CancelIdle(handle) => live.retain(|(h, _)| h != handle),
				_ => {}
			}
		}
		live
	}
}

impl EditorAdapter for RecordingEditor {
	fn current_file(&self) -> Option<PathBuf> {
		self.file.clone()
	}

	fn cursor_position(&self) -> (u32, u32) {
		self.cursor
	}

	fn place_marker(&mut self, file: &Path, line: u32, severity: Severity, message: &str) {
		self.calls.push(EditorCall::PlaceMarker {
			file: file.to_owned(),
			line,
			severity,
			message: message.to_owned(),
		});
	}

	fn clear_markers(&mut self, file: &Path) {
		self.calls.push(EditorCall::ClearMarkers(file.to_owned()));
	}

	fn open_split(&mut self, file: &Path, jump: Jump, split: Split) {
		self.calls.push(EditorCall::OpenSplit {
			file: file.to_owned(),
			jump,
			split,
		});
	}

	fn schedule_idle(&mut self, delay: Duration, task: IdleTask) -> IdleHandle {
		let handle = IdleHandle(self.next_idle);
		self.next_idle += 1;
		self.calls.push(EditorCall::ScheduleIdle { handle, delay, task });
		handle
	}

	fn cancel_idle(&mut self, handle: IdleHandle) {
		self.calls.push(EditorCall::CancelIdle(handle));
	}

	fn prompt_user(&mut self, message: &str) -> bool {
		self.calls.push(EditorCall::PromptUser(message.to_owned()));
		self.prompt_answer
	}

	fn buffer_lines(&self) -> Vec<String> {
		self.lines.clone()
	}

	fn window_width(&self) -> usize {
		self.width
	}

	fn echo(&mut self, message: &str) {
		self.calls.push(EditorCall::Echo(message.to_owned()));
	}

	fn set_status(&mut self, text: &str) {
		self.calls.push(EditorCall::SetStatus(text.to_owned()));
	}

	fn set_quickfix(&mut self, items: Vec<QuickfixItem>) {
		self.calls.push(EditorCall::SetQuickfix(items));
	}

	fn replace_buffer(&mut self, file: &Path, text: &str) {
		self.calls.push(EditorCall::ReplaceBuffer {
			file: file.to_owned(),
			text: text.to_owned(),
		});
	}

	fn append_console(&mut self, text: &str) {
		self.calls.push(EditorCall::AppendConsole(text.to_owned()));
	}

	fn show_scratch(&mut self, title: &str, lines: Vec<String>) {
		self.calls.push(EditorCall::ShowScratch {
			title: title.to_owned(),
			lines,
		});
	}

	fn show_completions(&mut self, start_col: u32, items: Vec<CompletionItem>) {
		self.calls.push(EditorCall::ShowCompletions { start_col, items });
	}

	fn ask_input(&mut self, prompt: &str) -> Option<String> {
		self.calls.push(EditorCall::AskInput(prompt.to_owned()));
		self.inputs.pop_front()
	}

	fn choose(&mut self, prompt: &str, choices: &[String]) -> Option<usize> {
		self.calls.push(EditorCall::Choose {
			prompt: prompt.to_owned(),
			choices: choices.to_vec(),
		});
		self.choice
	}

	fn save_current(&mut self) {
		self.calls.push(EditorCall::SaveCurrent);
	}

	fn apply_refactoring(&mut self, file: &Path, diff: &Path) -> bool {
		self.calls.push(EditorCall::ApplyRefactoring {
			file: file.to_owned(),
			diff: diff.to_owned(),
		});
		self.refactor_ok
	}

	fn open_url(&mut self, url: &str) -> bool {
		self.calls.push(EditorCall::OpenUrl(url.to_owned()));
		self.url_ok
	}
}

/// Server end of an in-memory connection.
#[derive(Debug)]
pub struct FakeServer {
	frames: Framed<DuplexStream, FrameCodec>,
}

impl FakeServer {
	/// Reads the next request and returns its call id and `req` object.
	///
	/// # Panics
	///
	/// If the connection closes or the frame is not a request.
	pub async fn expect_request(&mut self) -> (u64, JsonValue) {
		let frame = self
			.frames
			.next()
			.await
			.expect("connection closed while waiting for a request")
			.expect("bad frame from client");
		let mut msg: JsonValue = serde_json::from_slice(&frame).expect("request is not JSON");
		let id = msg["callId"].as_u64().expect("request without callId");
		(id, msg["req"].take())
	}

	/// Like [`Self::expect_request`], also checking the typehint.
	///
	/// # Panics
	///
	/// If the next request has another typehint.
	pub async fn expect(&mut self, typehint: &str) -> (u64, JsonValue) {
		let (id, req) = self.expect_request().await;
		assert_eq!(req["typehint"], typehint, "unexpected request {req}");
		(id, req)
	}

	/// Sends a response payload for `id`.
	///
	/// # Panics
	///
	/// If the connection is gone.
	pub async fn reply(&mut self, id: u64, payload: JsonValue) {
		self.send(json!({ "callId": id, "payload": payload })).await;
	}

	/// Pushes an event payload.
	///
	/// # Panics
	///
	/// If the connection is gone.
	pub async fn event(&mut self, payload: JsonValue) {
		self.send(json!({ "payload": payload })).await;
	}

	/// Writes `bytes` to the client unframed.
	///
	/// # Panics
	///
	/// If the connection is gone.
	pub async fn write_raw(&mut self, bytes: &[u8]) {
		self.frames.get_mut().write_all(bytes).await.expect("client hung up");
	}

	async fn send(&mut self, msg: JsonValue) {
		let body = serde_json::to_vec(&msg).expect("serializable message");
		self.frames.send(Bytes::from(body)).await.expect("client hung up");
	}
}

/// Connects a client to a [`FakeServer`] over an in-memory pipe; the session is `Starting`.
///
/// Must run inside a tokio runtime.
///
/// # Panics
///
/// If the session refuses to start.
pub fn connect_pair<E: EditorAdapter>(config: ClientConfig, editor: E) -> (Client<E>, FakeServer) {
	let (client_io, server_io) = tokio::io::duplex(64 * 1024);
	let (reader, writer) = tokio::io::split(client_io);
	let runtime = Handle::current();
	let transport = Transport::from_io(reader, writer, &runtime);
	let mut client = Client::new(config, editor, runtime);
	client.attach(transport).expect("fresh client accepts start");
	let server = FakeServer {
		frames: Framed::new(server_io, FrameCodec::new()),
	};
	(client, server)
}

/// Like [`connect_pair`], then completes the handshake and announces the analyzer.
///
/// The handshake consumes call id 1.
///
/// # Panics
///
/// If the client does not reach `Ready`.
pub async fn ready_pair<E: EditorAdapter>(config: ClientConfig, editor: E) -> (Client<E>, FakeServer) {
	let (mut client, mut server) = connect_pair(config, editor);
	assert!(client.pump().await, "transport closed before connecting");
	let (id, _) = server.expect("ConnectionInfoReq").await;
	server
		.reply(id, json!({"typehint": "ConnectionInfo", "implementation": {"name": "ENSIME"}, "version": "1.0"}))
		.await;
	assert!(client.pump().await);
	server.event(json!({"typehint": "AnalyzerReadyEvent"})).await;
	assert!(client.pump().await);
	assert_eq!(client.state(), crate::session::SessionState::Ready);
	(client, server)
}
