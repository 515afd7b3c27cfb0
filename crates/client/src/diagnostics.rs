//! Compiler diagnostics, grouped by file.
//!
//! A notes event naming a file supersedes every diagnostic previously known for that file.

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

use serde_json::Value as JsonValue;

use crate::editor::Severity;
use crate::text;

/// One compiler note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
	/// File the note belongs to.
	pub file: PathBuf,
	/// 1-based line.
	pub line: u32,
	/// 1-based column.
	pub column: u32,
	/// Note severity.
	pub severity: Severity,
	/// Compiler message.
	pub message: String,
	/// Character range in the file, when the server knows it.
	pub span: Option<Range<usize>>,
}

impl Diagnostic {
	/// Parses a server note (`{file, msg, line, col, beg, end, severity: {typehint}}`).
	pub fn from_note(note: &JsonValue) -> Option<Self> {
		let file = note.get("file")?.as_str()?;
		let line = note.get("line")?.as_u64()?;
		let column = note.get("col").and_then(JsonValue::as_u64).unwrap_or(1);
		let severity = note
			.pointer("/severity/typehint")
			.and_then(JsonValue::as_str)
			.map_or(Severity::Info, Severity::from_typehint);
		let message = note.get("msg").and_then(JsonValue::as_str).unwrap_or_default();

		let beg = note.get("beg").and_then(JsonValue::as_i64).unwrap_or(-1);
		let end = note.get("end").and_then(JsonValue::as_i64).unwrap_or(-1);
		let span = match (usize::try_from(beg), usize::try_from(end)) {
			(Ok(beg), Ok(end)) if end >= beg => Some(beg..end.saturating_add(1)),
			_ => None,
		};

		Some(Self {
			file: PathBuf::from(file),
			line: u32::try_from(line).ok()?,
			column: u32::try_from(column).ok()?,
			severity,
			message: message.to_owned(),
			span,
		})
	}

	/// Returns true if the 0-based cursor column `col` on `line` falls inside the note.
	pub fn covers(&self, line: u32, col: u32) -> bool {
		if line != self.line {
			return false;
		}
		let start = self.column.saturating_sub(1);
		let len = self
			.span
			.as_ref()
			.map_or(1, |s| u32::try_from(s.len()).unwrap_or(u32::MAX));
		(start..start.saturating_add(len.max(1))).contains(&col)
	}

	/// Message fitted to `width` columns.
	pub fn summary(&self, width: usize) -> String {
		text::truncate(&self.message, width)
	}
}

/// Diagnostics currently shown, per file.
#[derive(Debug, Default)]
pub struct DiagnosticStore {
	by_file: BTreeMap<PathBuf, Vec<Diagnostic>>,
}

impl DiagnosticStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Replaces the set for `file`; an empty set forgets the file.
	pub fn replace(&mut self, file: PathBuf, diagnostics: Vec<Diagnostic>) {
		if diagnostics.is_empty() {
			self.by_file.remove(&file);
		} else {
			self.by_file.insert(file, diagnostics);
		}
	}

	/// Groups `notes` by file and replaces each named file's set.
	///
	/// Returns the files that were touched.
	pub fn apply_notes(&mut self, notes: &[JsonValue]) -> Vec<PathBuf> {
		let mut grouped: BTreeMap<PathBuf, Vec<Diagnostic>> = BTreeMap::new();
		for note in notes {
			match Diagnostic::from_note(note) {
				Some(d) => grouped.entry(d.file.clone()).or_default().push(d),
				None => tracing::debug!(?note, "Skipping malformed note"),
			}
		}
		let files: Vec<PathBuf> = grouped.keys().cloned().collect();
		for (file, diagnostics) in grouped {
			self.replace(file, diagnostics);
		}
		files
	}

	/// Forgets everything and returns the files that had diagnostics.
	pub fn clear_all(&mut self) -> Vec<PathBuf> {
		std::mem::take(&mut self.by_file).into_keys().collect()
	}

	/// Forgets `file`.
	pub fn clear(&mut self, file: &Path) -> bool {
		self.by_file.remove(file).is_some()
	}

	/// Diagnostics for `file`.
	pub fn get(&self, file: &Path) -> &[Diagnostic] {
		self.by_file.get(file).map(Vec::as_slice).unwrap_or_default()
	}

	/// First diagnostic in `file` covering the cursor.
	pub fn at(&self, file: &Path, line: u32, col: u32) -> Option<&Diagnostic> {
		self.get(file).iter().find(|d| d.covers(line, col))
	}

	/// Total number of diagnostics.
	pub fn len(&self) -> usize {
		self.by_file.values().map(Vec::len).sum()
	}

	/// Returns true when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.by_file.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn note(file: &str, line: u64, msg: &str) -> JsonValue {
		json!({
			"file": file, "msg": msg, "line": line, "col": 5, "beg": 40, "end": 43,
			"severity": {"typehint": "NoteError"}
		})
	}

	#[test]
	fn notes_replace_per_file() {
		let mut store = DiagnosticStore::new();
		store.apply_notes(&[note("/p/B.scala", 1, "old"), note("/p/A.scala", 2, "keep")]);

		let touched = store.apply_notes(&[note("/p/B.scala", 3, "one"), note("/p/B.scala", 4, "two")]);
		assert_eq!(touched, vec![PathBuf::from("/p/B.scala")]);

		let b: Vec<_> = store.get(Path::new("/p/B.scala")).iter().map(|d| d.message.as_str()).collect();
		assert_eq!(b, ["one", "two"]);
		assert_eq!(store.get(Path::new("/p/A.scala")).len(), 1);
		assert_eq!(store.len(), 3);
	}

	#[test]
	fn parses_span_and_severity() {
		let d = Diagnostic::from_note(&note("/p/A.scala", 7, "boom")).unwrap();
		assert_eq!(d.severity, Severity::Error);
		assert_eq!(d.span, Some(40..44));
		assert!(d.covers(7, 4));
		assert!(d.covers(7, 7));
		assert!(!d.covers(7, 8));
		assert!(!d.covers(6, 4));
	}

	#[test]
	fn missing_offsets_cover_one_column() {
		let d = Diagnostic::from_note(&json!({
			"file": "/p/A.scala", "msg": "w", "line": 1, "col": 2, "beg": -1, "end": -1,
			"severity": {"typehint": "NoteWarn"}
		}))
		.unwrap();
		assert_eq!(d.severity, Severity::Warning);
		assert_eq!(d.span, None);
		assert!(d.covers(1, 1));
		assert!(!d.covers(1, 2));
	}

	#[test]
	fn oversized_positions_do_not_overflow() {
		let d = Diagnostic::from_note(&json!({
			"file": "/p/A.scala", "msg": "far", "line": 1, "col": u32::MAX,
			"beg": 0, "end": i64::MAX, "severity": {"typehint": "NoteError"}
		}))
		.unwrap();
		assert!(d.covers(1, u32::MAX - 1));
		assert!(!d.covers(1, 0));

		let wide = Diagnostic {
			column: 1,
			..d
		};
		assert!(wide.covers(1, 0));
		assert!(wide.covers(1, u32::MAX - 1));
	}

	#[test]
	fn clear_all_reports_files() {
		let mut store = DiagnosticStore::new();
		store.apply_notes(&[note("/p/A.scala", 1, "a"), note("/p/B.scala", 1, "b")]);
		assert_eq!(store.clear_all().len(), 2);
		assert!(store.is_empty());
	}
}
