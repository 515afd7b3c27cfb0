//! Request builders for the server vocabulary.

use std::path::Path;

use ensime_rpc::Request;
use serde_json::{Value as JsonValue, json};

fn path_str(path: &Path) -> String {
	path.to_string_lossy().into_owned()
}

fn range(from: usize, to: usize) -> JsonValue {
	json!({ "from": from, "to": to })
}

/// Handshake.
pub fn connection_info() -> Request {
	Request::new("ConnectionInfoReq")
}

/// Type check `files`.
pub fn typecheck_files(files: &[&Path]) -> Request {
	let files: Vec<String> = files.iter().map(|f| path_str(f)).collect();
	Request::new("TypecheckFilesReq").param("files", files)
}

/// Type of the symbol spanning `from..to`.
pub fn type_at_point(file: &Path, from: usize, to: usize) -> Request {
	Request::new("TypeAtPointReq")
		.param("file", path_str(file))
		.param("range", range(from, to))
}

/// Type and interfaces at `point`.
pub fn inspect_type_at_point(file: &Path, point: usize) -> Request {
	Request::new("InspectTypeAtPointReq")
		.param("file", path_str(file))
		.param("range", range(point, point))
}

/// Symbol at `point`.
pub fn symbol_at_point(file: &Path, point: usize) -> Request {
	Request::new("SymbolAtPointReq")
		.param("file", path_str(file))
		.param("point", point)
}

/// Symbol by fully qualified type name, optionally a member of it.
pub fn symbol_by_name(type_full_name: &str, member: Option<&str>) -> Request {
	let req = Request::new("SymbolByNameReq").param("typeFullName", type_full_name);
	match member {
		Some(member) => req.param("memberName", member),
		None => req,
	}
}

/// Uses of the symbol at `point`.
pub fn uses_of_symbol_at_point(file: &Path, point: usize) -> Request {
	Request::new("UsesOfSymbolAtPointReq")
		.param("file", path_str(file))
		.param("point", point)
}

/// Public symbol search.
pub fn public_symbol_search(keywords: &[String], max_results: u32) -> Request {
	Request::new("PublicSymbolSearchReq")
		.param("keywords", keywords.to_vec())
		.param("maxResults", max_results)
}

/// Documentation URI for the symbol spanning `from..to`.
pub fn doc_uri_at_point(file: &Path, from: usize, to: usize) -> Request {
	Request::new("DocUriAtPointReq")
		.param("file", path_str(file))
		.param("point", range(from, to))
}

/// Format `contents` as the source of `file`.
pub fn format_one_source(file: &Path, contents: &str) -> Request {
	Request::new("FormatOneSourceReq").param("file", json!({ "file": path_str(file), "contents": contents }))
}

/// Members of a package.
pub fn inspect_package_by_path(path: &str) -> Request {
	Request::new("InspectPackageByPathReq").param("path", path)
}

/// Import candidates for `names`.
pub fn import_suggestions(file: &Path, point: usize, names: &[String], max_results: u32) -> Request {
	Request::new("ImportSuggestionsReq")
		.param("file", path_str(file))
		.param("point", point)
		.param("names", names.to_vec())
		.param("maxResults", max_results)
}

/// Completions at `point` for the given unsaved contents.
pub fn completions(file: &Path, contents: &str, point: usize, max_results: u32) -> Request {
	Request::new("CompletionsReq")
		.param("fileInfo", json!({ "file": path_str(file), "contents": contents }))
		.param("point", point)
		.param("maxResults", max_results)
		.param("caseSens", true)
		.param("reload", false)
}

/// Refactoring description sent inside a `RefactorReq`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefactorDesc {
	/// Rename the symbol spanning `start..end`.
	Rename {
		/// Target file.
		file: String,
		/// Start offset.
		start: usize,
		/// End offset (exclusive).
		end: usize,
		/// Replacement name.
		new_name: String,
	},
	/// Inline the local spanning `start..end`.
	InlineLocal {
		/// Target file.
		file: String,
		/// Start offset.
		start: usize,
		/// End offset (exclusive).
		end: usize,
	},
	/// Sort and prune imports.
	OrganiseImports {
		/// Target file.
		file: String,
	},
	/// Add one import.
	AddImport {
		/// Target file.
		file: String,
		/// Fully qualified name.
		qualified_name: String,
	},
}

impl RefactorDesc {
	/// Refactoring family as the server names it in `refactorType`.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Rename { .. } => "Rename",
			Self::InlineLocal { .. } => "InlineLocal",
			Self::OrganiseImports { .. } => "OrganizeImports",
			Self::AddImport { .. } => "AddImport",
		}
	}

	fn to_json(&self) -> JsonValue {
		match self {
			Self::Rename {
				file,
				start,
				end,
				new_name,
			} => json!({
				"typehint": "RenameRefactorDesc",
				"newName": new_name,
				"start": start,
				"end": end,
				"file": file,
			}),
			Self::InlineLocal { file, start, end } => json!({
				"typehint": "InlineLocalRefactorDesc",
				"start": start,
				"end": end,
				"file": file,
			}),
			Self::OrganiseImports { file } => json!({
				"typehint": "OrganiseImportsRefactorDesc",
				"file": file,
			}),
			Self::AddImport { file, qualified_name } => json!({
				"typehint": "AddImportRefactorDesc",
				"file": file,
				"qualifiedName": qualified_name,
			}),
		}
	}
}

/// Non-interactive refactoring.
pub fn refactor(proc_id: u64, desc: &RefactorDesc) -> Request {
	Request::new("RefactorReq")
		.param("procId", proc_id)
		.param("params", desc.to_json())
		.param("interactive", false)
}

/// Breakpoint at `file:line`.
pub fn debug_set_break(file: &Path, line: u32) -> Request {
	Request::new("DebugSetBreakReq")
		.param("file", path_str(file))
		.param("line", line)
		.param("maxResults", 10)
}

/// Remove all breakpoints.
pub fn debug_clear_all_breaks() -> Request {
	Request::new("DebugClearAllBreaksReq")
}

/// Attach to a JVM debug port.
pub fn debug_attach(hostname: &str, port: &str) -> Request {
	Request::new("DebugAttachReq")
		.param("hostname", hostname)
		.param("port", port)
}

/// Execution control on a suspended thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugStep {
	/// Resume.
	Continue,
	/// Step into.
	Step,
	/// Step over.
	Next,
	/// Step out.
	StepOut,
}

/// `Debug{Continue,Step,Next,StepOut}Req` for `thread_id`.
pub fn debug_step(step: DebugStep, thread_id: &JsonValue) -> Request {
	let typehint = match step {
		DebugStep::Continue => "DebugContinueReq",
		DebugStep::Step => "DebugStepReq",
		DebugStep::Next => "DebugNextReq",
		DebugStep::StepOut => "DebugStepOutReq",
	};
	Request::new(typehint).param("threadId", thread_id.clone())
}

/// First frames of `thread_id`'s stack.
pub fn debug_backtrace(thread_id: &JsonValue) -> Request {
	Request::new("DebugBacktraceReq")
		.param("threadId", thread_id.clone())
		.param("index", 0)
		.param("count", 100)
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	fn req_json(req: &Request) -> JsonValue {
		req.to_json()["req"].clone()
	}

	#[test]
	fn at_point_requests() {
		let file = Path::new("/p/A.scala");
		assert_eq!(
			req_json(&type_at_point(file, 11, 14)),
			json!({"typehint": "TypeAtPointReq", "file": "/p/A.scala", "range": {"from": 11, "to": 14}})
		);
		assert_eq!(
			req_json(&doc_uri_at_point(file, 3, 5)),
			json!({"typehint": "DocUriAtPointReq", "file": "/p/A.scala", "point": {"from": 3, "to": 5}})
		);
		assert_eq!(
			req_json(&symbol_at_point(file, 8)),
			json!({"typehint": "SymbolAtPointReq", "file": "/p/A.scala", "point": 8})
		);
	}

	#[test]
	fn rename_refactor_shape() {
		let desc = RefactorDesc::Rename {
			file: "/p/A.scala".into(),
			start: 4,
			end: 7,
			new_name: "bar".into(),
		};
		assert_eq!(
			req_json(&refactor(2, &desc)),
			json!({
				"typehint": "RefactorReq",
				"procId": 2,
				"interactive": false,
				"params": {
					"typehint": "RenameRefactorDesc",
					"newName": "bar",
					"start": 4,
					"end": 7,
					"file": "/p/A.scala",
				}
			})
		);
		assert_eq!(desc.kind(), "Rename");
	}

	#[test]
	fn symbol_by_name_member_is_optional() {
		assert_eq!(
			req_json(&symbol_by_name("scala.Option", None)),
			json!({"typehint": "SymbolByNameReq", "typeFullName": "scala.Option"})
		);
		assert_eq!(req_json(&symbol_by_name("scala.Option", Some("map")))["memberName"], "map");
	}

	#[test]
	fn completions_carry_file_contents() {
		let req = req_json(&completions(Path::new("/p/A.scala"), "object A", 7, 100));
		assert_eq!(req["fileInfo"], json!({"file": "/p/A.scala", "contents": "object A"}));
		assert_eq!(req["caseSens"], true);
		assert_eq!(req["reload"], false);
	}

	#[test]
	fn debug_requests_echo_thread_id() {
		let tid = json!("7");
		assert_eq!(
			req_json(&debug_step(DebugStep::StepOut, &tid)),
			json!({"typehint": "DebugStepOutReq", "threadId": "7"})
		);
		assert_eq!(
			req_json(&debug_backtrace(&tid)),
			json!({"typehint": "DebugBacktraceReq", "threadId": "7", "index": 0, "count": 100})
		);
	}
}
