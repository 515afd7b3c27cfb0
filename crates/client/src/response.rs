//! Applies response payloads to the context stored with their request.

use std::path::{Path, PathBuf};
use std::time::Instant;

use ensime_rpc::{Payload, Response};
use serde_json::Value as JsonValue;

use crate::client::Client;
use crate::dispatch::{Pending, SymbolAction};
use crate::editor::{CompletionItem, EditorAdapter, Jump, QuickfixItem, Severity};
use crate::error::{Error, Result};
use crate::session::{SessionEvent, SessionState};

/// Refactoring families the client knows how to apply.
const SUPPORTED_REFACTORINGS: [&str; 4] = ["Rename", "InlineLocal", "AddImport", "OrganizeImports"];
/// Depth limit of the package tree view.
const PACKAGE_DEPTH: usize = 4;

/// Where a source position points.
fn jump_of(pos: &JsonValue) -> Option<(PathBuf, Jump)> {
	let file = PathBuf::from(pos.get("file")?.as_str()?);
	let jump = match pos.get("typehint").and_then(JsonValue::as_str) {
		Some("LineSourcePosition") => Jump::Line(u32::try_from(pos.get("line")?.as_u64()?).ok()?),
		_ => Jump::Offset(usize::try_from(pos.get("offset")?.as_u64()?).ok()?),
	};
	Some((file, jump))
}

fn required<'a>(payload: &'a Payload, key: &str) -> Result<&'a JsonValue> {
	payload.get(key).ok_or_else(|| Error::malformed(&payload.typehint, key))
}

impl<E: EditorAdapter> Client<E> {
	pub(crate) fn handle_response(&mut self, resp: Response, now: Instant) {
		let Some(entry) = self.pending.resolve(resp.id) else {
			return;
		};
		self.forget_superseding(entry.id);
		tracing::debug!(
			call_id = %entry.id,
			command = %entry.command,
			elapsed_ms = now.saturating_duration_since(entry.issued_at).as_millis() as u64,
			"rpc.response"
		);

		let handshake = matches!(entry.context, Pending::Handshake);
		let outcome = match resp.result {
			Ok(payload) => self.apply(entry.context, &payload, now),
			Err(server) => Err(Error::Rpc(ensime_rpc::Error::Server(server))),
		};
		if let Err(e) = outcome {
			self.report_failure(&entry.command, &e);
			if handshake {
				self.abort_session(&e.to_string());
			}
		}
	}

	fn apply(&mut self, context: Pending, payload: &Payload, now: Instant) -> Result<()> {
		let typehint = payload.typehint.as_str();
		match (context, typehint) {
			(Pending::Handshake, "ConnectionInfo") => self.on_connect_ack(payload, now),
			(Pending::Handshake, other) => Err(Error::Rpc(ensime_rpc::Error::Protocol(format!(
				"unexpected handshake reply {other}"
			)))),
			(Pending::TypeCheck | Pending::ClearBreakpoints | Pending::DebugControl, _) => Ok(()),
			(Pending::TypeAtCursor, "BasicTypeInfo" | "ArrowTypeInfo") => {
				let name = self.type_name(&payload.body)?;
				tracing::info!(%name, "Displayed type");
				self.editor.echo(&name);
				Ok(())
			}
			(Pending::InspectType, "TypeInspectInfo") => {
				let interfaces = payload
					.array("interfaces")
					.iter()
					.filter_map(|i| i.get("type"))
					.map(|t| self.type_name(t))
					.collect::<Result<Vec<_>>>()?;
				let tpe = self.type_name(required(payload, "type")?)?;
				self.editor.echo(&format!("( {} ) => {tpe}", interfaces.join(", ")));
				Ok(())
			}
			(Pending::Symbol(action), "SymbolInfo") => self.on_symbol_info(action, payload),
			(Pending::Usages, "ERangePositions" | "SourcePositions") => {
				let items = payload
					.array("positions")
					.iter()
					.filter_map(jump_of)
					.map(|(file, jump)| QuickfixItem {
						text: file.display().to_string(),
						file,
						jump,
						severity: Severity::Info,
					})
					.collect();
				self.editor.set_quickfix(items);
				Ok(())
			}
			(Pending::SymbolSearch, "SymbolSearchResults") => {
				let items = payload
					.array("syms")
					.iter()
					.filter_map(|sym| {
						let (file, jump) = jump_of(sym.get("pos")?)?;
						let name = sym.get("name").and_then(JsonValue::as_str).unwrap_or_default();
						Some(QuickfixItem {
							file,
							jump,
							text: name.to_owned(),
							severity: Severity::Info,
						})
					})
					.collect();
				self.editor.set_quickfix(items);
				Ok(())
			}
			(Pending::DocUri { browse }, "StringResponse") => {
				let text = required(payload, "text")?.as_str().unwrap_or_default();
				let url = self.doc_url(text);
				if !browse {
					self.editor.echo(&url);
				} else if self.editor.open_url(&url) {
					tracing::info!(%url, "Opened documentation");
				} else {
					self.echo(&format!("Go to {url}"));
				}
				Ok(())
			}
			(Pending::Format { file }, "StringResponse") => {
				let text = required(payload, "text")?.as_str().unwrap_or_default();
				self.editor.replace_buffer(&file, text);
				Ok(())
			}
			(Pending::Package, "PackageInfo") => {
				let root = payload.str("fullName").unwrap_or_default();
				let mut lines = vec![root.to_owned()];
				for member in payload.array("members") {
					package_lines(member, 1, &mut lines);
				}
				self.editor.show_scratch("package_info", lines);
				Ok(())
			}
			(Pending::ImportSuggestions, "ImportSuggestions") => self.on_import_suggestions(payload, now),
			(Pending::Refactor { file, kind }, "RefactorDiffEffect") => self.on_refactor_diff(&file, kind, payload),
			(Pending::Refactor { .. }, "RefactorFailure") => {
				let reason = payload.str("reason").unwrap_or("unknown reason");
				Err(Error::context(format!("The refactoring failed: {reason}")))
			}
			(Pending::Breakpoint { file, line }, "TrueResponse") => {
				tracing::debug!(file = %file.display(), line, "Breakpoint acknowledged");
				Ok(())
			}
			(Pending::Breakpoint { file, line }, "FalseResponse") => {
				self.echo(&format!("Breakpoint at {}:{line} is pending until its class loads", file.display()));
				Ok(())
			}
			(Pending::DebugAttach, "DebugVmSuccess") => {
				self.echo("Debugger attached");
				Ok(())
			}
			(Pending::DebugAttach, "DebugVmError") => {
				let details = payload.str("details").unwrap_or("check the server log");
				Err(Error::context(format!("Debugger attach failed: {details}")))
			}
			(Pending::Backtrace, "DebugBacktrace") => {
				let frames = required(payload, "frames")?;
				let pretty = serde_json::to_string_pretty(frames).map_err(ensime_rpc::Error::from)?;
				self.editor.show_scratch("backtrace.json", pretty.lines().map(str::to_owned).collect());
				Ok(())
			}
			(Pending::Completion { start_col }, "CompletionInfoList") => {
				let items = payload
					.array("completions")
					.iter()
					.filter(|c| c.get("typeInfo").is_some())
					.filter_map(completion_item)
					.collect();
				self.editor.show_completions(start_col, items);
				Ok(())
			}
			(context, _) => {
				tracing::warn!(?context, typehint, "Response has not been handled");
				Ok(())
			}
		}
	}

	fn on_connect_ack(&mut self, payload: &Payload, now: Instant) -> Result<()> {
		let version = payload.str("implementation").or_else(|| payload.str("version")).unwrap_or("unknown");
		tracing::info!(version, "Handshake acknowledged");
		let state = self.session.apply(SessionEvent::ConnectAck)?;
		self.sync_breakpoints(now);
		self.echo("Server has been started...");
		self.editor.set_status(&state.to_string());
		if state == SessionState::Ready {
			self.echo("Analyzer is ready");
		}
		Ok(())
	}

	/// `name` or `fullName` of a type, per the display toggle.
	fn type_name(&self, tpe: &JsonValue) -> Result<String> {
		let key = if self.full_types { "fullName" } else { "name" };
		tpe.get(key)
			.or_else(|| tpe.get("name"))
			.and_then(JsonValue::as_str)
			.map(str::to_owned)
			.ok_or_else(|| Error::malformed("type info", key))
	}

	fn on_symbol_info(&mut self, action: SymbolAction, payload: &Payload) -> Result<()> {
		let Some((file, jump)) = payload.get("declPos").and_then(jump_of) else {
			self.echo("Symbol not found");
			return Ok(());
		};
		match action {
			SymbolAction::Display => self.editor.echo(&file.display().to_string()),
			SymbolAction::Open(split) => self.editor.open_split(&file, jump, split),
		}
		Ok(())
	}

	/// Absolute documentation URL; relative paths are served by the doc server.
	fn doc_url(&self, text: &str) -> String {
		if text.starts_with("http") {
			return text.to_owned();
		}
		match self.config.resolve_doc_address() {
			Some(base) => format!("{base}/{}", text.trim_start_matches('/')),
			None => text.to_owned(),
		}
	}

	fn on_import_suggestions(&mut self, payload: &Payload, now: Instant) -> Result<()> {
		let mut names: Vec<String> = payload
			.array("symLists")
			.iter()
			.filter_map(JsonValue::as_array)
			.flatten()
			.filter_map(|s| s.get("name").and_then(JsonValue::as_str))
			.map(|n| n.replace('$', "."))
			.collect();
		names.sort();
		names.dedup();

		if names.is_empty() {
			self.echo("No import suggestions found.");
			return Ok(());
		}
		match self.editor.choose("Select class to import:", &names) {
			Some(index) if index < names.len() => {
				let name = names.swap_remove(index);
				self.add_import(name, now)
			}
			_ => Ok(()),
		}
	}

	fn on_refactor_diff(&mut self, file: &Path, kind: &str, payload: &Payload) -> Result<()> {
		let applied_kind = payload
			.get("refactorType")
			.and_then(|t| t.get("typehint"))
			.and_then(JsonValue::as_str)
			.unwrap_or(kind);
		if !SUPPORTED_REFACTORINGS.contains(&applied_kind) {
			return Err(Error::context(format!("unsupported refactoring {applied_kind}")));
		}
		let diff = PathBuf::from(required(payload, "diff")?.as_str().unwrap_or_default());

		if self.config.confirm_refactorings
			&& !self.editor.prompt_user(&format!("Apply {applied_kind} to {}?", file.display()))
		{
			self.echo("Refactoring cancelled");
			return Ok(());
		}
		if self.editor.apply_refactoring(file, &diff) {
			tracing::info!(file = %file.display(), kind = applied_kind, "Applied refactoring");
			Ok(())
		} else {
			Err(Error::context("The refactoring could not be applied (more info at logs)"))
		}
	}
}

fn package_lines(member: &JsonValue, depth: usize, out: &mut Vec<String>) {
	let name = member.get("name").and_then(JsonValue::as_str).unwrap_or_default();
	let decl = if member.get("typehint").and_then(JsonValue::as_str) == Some("BasicTypeInfo") {
		member
			.pointer("/declAs/typehint")
			.and_then(JsonValue::as_str)
			.unwrap_or_default()
	} else {
		""
	};
	out.push(format!("{}{decl}: {name}", "  ".repeat(depth)));
	if depth < PACKAGE_DEPTH {
		for child in member.get("members").and_then(JsonValue::as_array).into_iter().flatten() {
			package_lines(child, depth + 1, out);
		}
	}
}

fn completion_item(c: &JsonValue) -> Option<CompletionItem> {
	let word = c.get("name")?.as_str()?.to_owned();
	let type_info = c.get("typeInfo")?;
	Some(CompletionItem {
		word,
		detail: type_info.get("name").and_then(JsonValue::as_str).unwrap_or_default().to_owned(),
		callable: type_info.get("typehint").and_then(JsonValue::as_str) == Some("ArrowTypeInfo"),
	})
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn positions_map_to_jumps() {
		assert_eq!(
			jump_of(&json!({"typehint": "LineSourcePosition", "file": "/p/A.scala", "line": 4})),
			Some((PathBuf::from("/p/A.scala"), Jump::Line(4)))
		);
		assert_eq!(
			jump_of(&json!({"typehint": "OffsetSourcePosition", "file": "/p/A.scala", "offset": 120})),
			Some((PathBuf::from("/p/A.scala"), Jump::Offset(120)))
		);
		assert_eq!(jump_of(&json!({"typehint": "EmptySourcePosition"})), None);
	}

	#[test]
	fn package_tree_is_indented_and_bounded() {
		let mut deep = json!({"typehint": "BasicTypeInfo", "name": "L5", "declAs": {"typehint": "Class"}, "members": []});
		for level in (1..=4).rev() {
			deep = json!({"typehint": "PackageInfo", "name": format!("L{level}"), "members": [deep]});
		}
		let mut lines = Vec::new();
		package_lines(&deep, 1, &mut lines);
		assert_eq!(lines, ["  : L1", "    : L2", "      : L3", "        : L4"]);

		let mut lines = Vec::new();
		package_lines(&json!({"typehint": "BasicTypeInfo", "name": "Foo", "declAs": {"typehint": "Trait"}}), 2, &mut lines);
		assert_eq!(lines, ["    Trait: Foo"]);
	}

	#[test]
	fn completion_items_need_a_type() {
		let item = completion_item(&json!({"name": "map", "typeInfo": {"typehint": "ArrowTypeInfo", "name": "(f: A => B)List[B]"}})).unwrap();
		assert_eq!(item.word, "map");
		assert!(item.callable);
		assert!(completion_item(&json!({"name": "x"})).is_none());
	}
}
