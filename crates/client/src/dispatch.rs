//! Command dispatch: gate, validate editor context, build the request, submit.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use ensime_rpc::CallId;

use crate::client::Client;
use crate::command::{Command, CommandArgs};
use crate::editor::{EditorAdapter, Split};
use crate::error::{Error, Result};
use crate::request::{self, DebugStep, RefactorDesc};
use crate::session::Gate;
use crate::text;

/// Candidates requested by a symbol search.
const SYMBOL_SEARCH_MAX: u32 = 25;
/// Candidates requested by an import suggestion.
const IMPORT_SUGGESTIONS_MAX: u32 = 10;

/// What to do with a `SymbolInfo` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SymbolAction {
	/// Echo the declaring file.
	Display,
	/// Open the declaration.
	Open(Split),
}

/// Context stored with each pending request, consumed when the response arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Pending {
	Handshake,
	TypeCheck,
	TypeAtCursor,
	InspectType,
	Symbol(SymbolAction),
	Usages,
	SymbolSearch,
	DocUri { browse: bool },
	Format { file: PathBuf },
	Package,
	ImportSuggestions,
	Refactor { file: PathBuf, kind: &'static str },
	Breakpoint { file: PathBuf, line: u32 },
	ClearBreakpoints,
	DebugAttach,
	DebugControl,
	Backtrace,
	Completion { start_col: u32 },
}

/// Request families where a newer request replaces the one in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Supersede {
	Completion,
	SymbolSearch,
	TypeAtCursor,
	InspectType,
	DocLookup,
}

impl Pending {
	pub(crate) fn supersede(&self) -> Option<Supersede> {
		match self {
			Self::Completion { .. } => Some(Supersede::Completion),
			Self::SymbolSearch => Some(Supersede::SymbolSearch),
			Self::TypeAtCursor => Some(Supersede::TypeAtCursor),
			Self::InspectType => Some(Supersede::InspectType),
			Self::DocUri { .. } => Some(Supersede::DocLookup),
			_ => None,
		}
	}
}

/// Editor context captured at invocation time.
struct Cursor {
	file: PathBuf,
	lines: Vec<String>,
	line: u32,
	col: u32,
}

impl Cursor {
	fn current_line(&self) -> &str {
		self.lines
			.get(self.line.saturating_sub(1) as usize)
			.map_or("", String::as_str)
	}

	fn offset(&self) -> usize {
		text::offset(&self.lines, self.line, self.col)
	}

	/// Offsets of the first and last character of the word under the cursor.
	fn word_offsets(&self) -> Result<(usize, usize)> {
		let (start, end) = text::word_bounds(self.current_line(), self.col)
			.ok_or_else(|| Error::context("cursor is not on a symbol"))?;
		Ok((
			text::offset(&self.lines, self.line, start),
			text::offset(&self.lines, self.line, end),
		))
	}

	fn word(&self) -> Result<String> {
		text::word_at(self.current_line(), self.col).ok_or_else(|| Error::context("cursor is not on a symbol"))
	}

	fn contents(&self) -> String {
		self.lines.join("\n")
	}
}

impl<E: EditorAdapter> Client<E> {
	/// Runs the command named `name` (kebab-case).
	pub fn run(&mut self, name: &str, args: CommandArgs) -> Result<()> {
		let command = match Command::from_str(name) {
			Ok(command) => command,
			Err(_) => {
				let err = Error::UnknownCommand(name.to_owned());
				self.report(&err);
				return Err(err);
			}
		};
		self.execute(command, args)
	}

	/// Runs `command`; failures are echoed to the user and returned.
	pub fn execute(&mut self, command: Command, args: CommandArgs) -> Result<()> {
		let now = Instant::now();
		let result = self.session.check(command).and_then(|()| self.dispatch(command, &args, now));
		if let Err(e) = &result {
			tracing::debug!(%command, error = %e, "Command failed");
			self.report(e);
		}
		result
	}

	/// Requests completions at the cursor and returns the column the candidates replace from.
	pub fn complete(&mut self) -> Result<u32> {
		let result = self.request_completions(Instant::now());
		if let Err(e) = &result {
			self.report(e);
		}
		result
	}

	fn request_completions(&mut self, now: Instant) -> Result<u32> {
		if !self.session.admits(Gate::Ready) {
			return Err(Error::context("completion needs a ready analyzer"));
		}
		let cur = self.cursor()?;
		let start_col = text::completion_start(cur.current_line(), cur.col);
		let req = request::completions(&cur.file, &cur.contents(), cur.offset(), self.config.max_completions);
		self.submit(req, Pending::Completion { start_col }, now)?;
		Ok(start_col)
	}

	fn cursor(&self) -> Result<Cursor> {
		let file = self
			.editor
			.current_file()
			.ok_or_else(|| Error::context("no file in the current buffer"))?;
		let (line, col) = self.editor.cursor_position();
		Ok(Cursor {
			file,
			lines: self.editor.buffer_lines(),
			line,
			col,
		})
	}

	fn dispatch(&mut self, command: Command, args: &CommandArgs, now: Instant) -> Result<()> {
		match command {
			Command::Start => self.start(),
			Command::Stop => {
				self.stop();
				Ok(())
			}
			Command::ListClients => {
				let line = format!("{}: {}", self.config.cache_dir.display(), self.session.state());
				self.editor.echo(&line);
				Ok(())
			}
			Command::ToggleFullTypeDisplay => {
				self.full_types = !self.full_types;
				let msg = if self.full_types {
					"Qualified type display enabled"
				} else {
					"Qualified type display disabled"
				};
				self.echo(msg);
				Ok(())
			}
			Command::ToggleTeardown => {
				self.keep_alive = !self.keep_alive;
				let msg = if self.keep_alive {
					"Server will keep running after exit"
				} else {
					"Server will be stopped on exit"
				};
				self.echo(msg);
				Ok(())
			}
			Command::TypeCheck => {
				let cur = self.cursor()?;
				self.submit(request::typecheck_files(&[cur.file.as_path()]), Pending::TypeCheck, now)?;
				if self.diagnostics.clear(&cur.file) {
					self.editor.clear_markers(&cur.file);
				}
				self.echo("Typechecking...");
				Ok(())
			}
			Command::TypeAtCursor => {
				let cur = self.cursor()?;
				let (start, last) = cur.word_offsets()?;
				let from = start + 1;
				let to = from + (last - start);
				self.send(request::type_at_point(&cur.file, from, to), Pending::TypeAtCursor, now)
			}
			Command::InspectType => {
				let cur = self.cursor()?;
				self.send(request::inspect_type_at_point(&cur.file, cur.offset()), Pending::InspectType, now)
			}
			Command::SymbolAtCursor => self.symbol_at_point(SymbolAction::Display, now),
			Command::GoToDeclaration => {
				let split = match args.arg(0) {
					Some("v") => Split::Vertical,
					Some("h") => Split::Horizontal,
					_ => Split::None,
				};
				self.symbol_at_point(SymbolAction::Open(split), now)
			}
			Command::SymbolByName => {
				let name = args
					.arg(0)
					.ok_or_else(|| Error::context("Must provide a fully-qualified symbol name"))?;
				let req = request::symbol_by_name(name, args.arg(1));
				self.send(req, Pending::Symbol(SymbolAction::Open(Split::Vertical)), now)
			}
			Command::FindUsages => {
				let cur = self.cursor()?;
				cur.word()?;
				self.send(request::uses_of_symbol_at_point(&cur.file, cur.offset() + 1), Pending::Usages, now)
			}
			Command::SymbolSearch => {
				if args.is_empty() {
					return Err(Error::context("Must provide symbols to search for"));
				}
				let keywords: Vec<String> = args.args.iter().filter(|a| !a.trim().is_empty()).cloned().collect();
				self.send(request::public_symbol_search(&keywords, SYMBOL_SEARCH_MAX), Pending::SymbolSearch, now)
			}
			Command::FormatSource => {
				let cur = self.cursor()?;
				let req = request::format_one_source(&cur.file, &cur.contents());
				self.send(req, Pending::Format { file: cur.file }, now)
			}
			Command::ShowPackage => {
				let path = match args.arg(0) {
					Some(path) => path.to_owned(),
					None => {
						let lines = self.editor.buffer_lines();
						let path = text::package_name(&lines)
							.ok_or_else(|| Error::context("no package declaration in the current buffer"))?;
						self.echo("Using currently focused package");
						path
					}
				};
				self.send(request::inspect_package_by_path(&path), Pending::Package, now)
			}
			Command::DocLookup | Command::DocBrowse => {
				let cur = self.cursor()?;
				let (start, last) = cur.word_offsets()?;
				let from = start + 1;
				let to = from + (last - start);
				let browse = command == Command::DocBrowse;
				self.send(request::doc_uri_at_point(&cur.file, from, to), Pending::DocUri { browse }, now)
			}
			Command::SuggestImport => {
				let cur = self.cursor()?;
				let word = cur.word()?;
				let req = request::import_suggestions(&cur.file, cur.offset(), &[word], IMPORT_SUGGESTIONS_MAX);
				self.send(req, Pending::ImportSuggestions, now)
			}
			Command::Rename => {
				let cur = self.cursor()?;
				let (start, last) = cur.word_offsets()?;
				let new_name = self.argument_or_input(args, "Rename to: ")?;
				let desc = RefactorDesc::Rename {
					file: cur.file.to_string_lossy().into_owned(),
					start,
					end: last + 1,
					new_name,
				};
				self.refactor(cur.file, desc, now)
			}
			Command::Inline => {
				let cur = self.cursor()?;
				let (start, last) = cur.word_offsets()?;
				let desc = RefactorDesc::InlineLocal {
					file: cur.file.to_string_lossy().into_owned(),
					start,
					end: last + 1,
				};
				self.refactor(cur.file, desc, now)
			}
			Command::OrganizeImports => {
				let cur = self.cursor()?;
				let desc = RefactorDesc::OrganiseImports {
					file: cur.file.to_string_lossy().into_owned(),
				};
				self.refactor(cur.file, desc, now)
			}
			Command::AddImport => {
				let name = self.argument_or_input(args, "Qualified name to import: ")?;
				self.add_import(name, now)
			}
			Command::SetBreakpoint => self.set_breakpoint(args, now),
			Command::ClearBreakpoints => {
				if self.session.state().is_connected() {
					self.send(request::debug_clear_all_breaks(), Pending::ClearBreakpoints, now)?;
				}
				let cleared = self.breakpoints.clear();
				self.echo(&format!("Cleared {cleared} breakpoint(s)"));
				Ok(())
			}
			Command::DebugStart => {
				let (host, port) = match (args.arg(0), args.arg(1)) {
					(Some(host), Some(port)) => (host.to_owned(), port.to_owned()),
					_ => (self.config.debug_host.clone(), self.config.debug_port.to_string()),
				};
				self.send(request::debug_attach(&host, &port), Pending::DebugAttach, now)
			}
			Command::DebugContinue => self.debug_step(DebugStep::Continue, now),
			Command::DebugStep => self.debug_step(DebugStep::Step, now),
			Command::DebugNext => self.debug_step(DebugStep::Next, now),
			Command::DebugStepOut => self.debug_step(DebugStep::StepOut, now),
			Command::Backtrace => {
				let thread = self.suspended_thread()?;
				self.send(request::debug_backtrace(&thread), Pending::Backtrace, now)
			}
		}
	}

	fn send(&mut self, req: ensime_rpc::Request, pending: Pending, now: Instant) -> Result<()> {
		let id: CallId = self.submit(req, pending, now)?;
		tracing::trace!(call_id = %id, "Command submitted");
		Ok(())
	}

	fn symbol_at_point(&mut self, action: SymbolAction, now: Instant) -> Result<()> {
		let cur = self.cursor()?;
		self.send(request::symbol_at_point(&cur.file, cur.offset() + 1), Pending::Symbol(action), now)
	}

	fn argument_or_input(&mut self, args: &CommandArgs, prompt: &str) -> Result<String> {
		if let Some(arg) = args.arg(0) {
			return Ok(arg.to_owned());
		}
		self.editor
			.ask_input(prompt)
			.map(|s| s.trim().to_owned())
			.filter(|s| !s.is_empty())
			.ok_or_else(|| Error::context("no name given"))
	}

	pub(crate) fn add_import(&mut self, qualified_name: String, now: Instant) -> Result<()> {
		let file = self
			.editor
			.current_file()
			.ok_or_else(|| Error::context("no file in the current buffer"))?;
		let desc = RefactorDesc::AddImport {
			file: file.to_string_lossy().into_owned(),
			qualified_name,
		};
		self.refactor(file, desc, now)
	}

	fn refactor(&mut self, file: PathBuf, desc: RefactorDesc, now: Instant) -> Result<()> {
		self.editor.save_current();
		let proc_id = self.next_proc_id;
		self.next_proc_id += 1;
		let kind = desc.kind();
		self.send(request::refactor(proc_id, &desc), Pending::Refactor { file, kind }, now)
	}

	fn set_breakpoint(&mut self, args: &CommandArgs, now: Instant) -> Result<()> {
		let file = self
			.editor
			.current_file()
			.ok_or_else(|| Error::context("no file in the current buffer"))?;
		let line = args.range.map_or_else(|| self.editor.cursor_position().0, |r| r.start);
		if !self.breakpoints.insert(&file, line) {
			self.echo(&format!("Breakpoint already set at {}:{line}", file.display()));
			return Ok(());
		}
		if self.session.state().is_connected() {
			self.send(request::debug_set_break(&file, line), Pending::Breakpoint { file, line }, now)
		} else {
			self.echo(&format!("Breakpoint at {}:{line} will be set on connect", file.display()));
			Ok(())
		}
	}

	/// Sends every known breakpoint; run after the handshake.
	pub(crate) fn sync_breakpoints(&mut self, now: Instant) {
		let points: Vec<_> = self.breakpoints.iter().cloned().collect();
		for bp in points {
			let req = request::debug_set_break(&bp.file, bp.line);
			let pending = Pending::Breakpoint {
				file: bp.file,
				line: bp.line,
			};
			if let Err(e) = self.submit(req, pending, now) {
				self.report(&e);
				return;
			}
		}
	}

	fn suspended_thread(&self) -> Result<serde_json::Value> {
		self.debug_thread
			.clone()
			.ok_or_else(|| Error::context("no suspended debug thread"))
	}

	fn debug_step(&mut self, step: DebugStep, now: Instant) -> Result<()> {
		let thread = self.suspended_thread()?;
		self.send(request::debug_step(step, &thread), Pending::DebugControl, now)
	}
}
