//! Capability interface the host editor implements.
//!
//! The client never touches editor state directly: everything it reads (current file, cursor,
//! buffer text) and everything it shows (markers, messages, splits, menus) goes through
//! [`EditorAdapter`]. One implementation exists per host.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Severity of a compiler note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
pub enum Severity {
	/// Compilation error.
	Error,
	/// Warning.
	Warning,
	/// Informational note.
	Info,
}

impl Severity {
	/// Maps a note severity typehint (`NoteError`, `NoteWarn`, `NoteInfo`).
	pub fn from_typehint(typehint: &str) -> Self {
		match typehint {
			"NoteError" => Self::Error,
			"NoteWarn" => Self::Warning,
			_ => Self::Info,
		}
	}
}

/// Where to place the cursor after opening a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jump {
	/// Start of a 1-based line.
	Line(u32),
	/// 0-based character offset into the file.
	Offset(usize),
}

/// Window arrangement for [`EditorAdapter::open_split`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Split {
	/// Reuse the current window.
	#[default]
	None,
	/// Split above/below.
	Horizontal,
	/// Split side by side.
	Vertical,
}

/// Entry of the editor's location list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickfixItem {
	/// File the entry points at.
	pub file: PathBuf,
	/// Position within the file.
	pub jump: Jump,
	/// Description.
	pub text: String,
	/// Entry kind.
	pub severity: Severity,
}

/// A completion candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionItem {
	/// Text to insert.
	pub word: String,
	/// Type shown next to the candidate.
	pub detail: String,
	/// Whether the candidate is a method.
	pub callable: bool,
}

/// Opaque handle for a scheduled idle callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdleHandle(pub u64);

/// Work the client asks the host to run later, on its UI thread.
///
/// The host calls [`crate::Client::on_idle`] with the task once the delay has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdleTask {
	/// Drain transport events and expire overdue requests.
	Poll,
	/// Echo the diagnostic under the cursor.
	DiagnosticHint,
}

/// Editor capabilities used by the client.
///
/// Positions follow the usual editor convention: lines are 1-based, columns 0-based.
pub trait EditorAdapter {
	/// Path of the file in the focused buffer.
	fn current_file(&self) -> Option<PathBuf>;

	/// Cursor position as `(line, column)`.
	fn cursor_position(&self) -> (u32, u32);

	/// Highlights a diagnostic.
	fn place_marker(&mut self, file: &Path, line: u32, severity: Severity, message: &str);

	/// Removes every marker in `file`.
	fn clear_markers(&mut self, file: &Path);

	/// Opens `file` and moves the cursor.
	fn open_split(&mut self, file: &Path, jump: Jump, split: Split);

	/// Runs `task` after `delay`.
	fn schedule_idle(&mut self, delay: Duration, task: IdleTask) -> IdleHandle;

	/// Cancels a callback scheduled by [`Self::schedule_idle`].
	fn cancel_idle(&mut self, handle: IdleHandle);

	/// Asks a yes/no question.
	fn prompt_user(&mut self, message: &str) -> bool;

	/// Lines of the focused buffer.
	fn buffer_lines(&self) -> Vec<String> {
		Vec::new()
	}

	/// Usable width of the message area.
	fn window_width(&self) -> usize {
		80
	}

	/// Shows a one-line message.
	fn echo(&mut self, _message: &str) {}

	/// Updates the status indicator.
	fn set_status(&mut self, _text: &str) {}

	/// Replaces the location list and opens it.
	fn set_quickfix(&mut self, _items: Vec<QuickfixItem>) {}

	/// Replaces the contents of `file`'s buffer.
	fn replace_buffer(&mut self, _file: &Path, _text: &str) {}

	/// Appends debugger output.
	fn append_console(&mut self, _text: &str) {}

	/// Shows read-only lines in a scratch window.
	fn show_scratch(&mut self, _title: &str, _lines: Vec<String>) {}

	/// Shows a completion popup anchored at `start_col`.
	fn show_completions(&mut self, _start_col: u32, _items: Vec<CompletionItem>) {}

	/// Asks for free-form input.
	fn ask_input(&mut self, _prompt: &str) -> Option<String> {
		None
	}

	/// Lets the user pick one of `choices`.
	fn choose(&mut self, _prompt: &str, _choices: &[String]) -> Option<usize> {
		None
	}

	/// Writes the focused buffer to disk.
	fn save_current(&mut self) {}

	/// Applies the unified diff at `diff` to `file` and reloads it.
	fn apply_refactoring(&mut self, _file: &Path, _diff: &Path) -> bool {
		false
	}

	/// Opens `url` in a browser.
	fn open_url(&mut self, _url: &str) -> bool {
		false
	}
}
