//! Editor-local breakpoint set.

use std::path::{Path, PathBuf};

/// A line breakpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Breakpoint {
	/// Source file.
	pub file: PathBuf,
	/// 1-based line.
	pub line: u32,
}

impl std::fmt::Display for Breakpoint {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{}", self.file.display(), self.line)
	}
}

/// Breakpoints in the order they were set, without duplicates.
#[derive(Debug, Default)]
pub struct BreakpointSet {
	points: Vec<Breakpoint>,
}

impl BreakpointSet {
	/// Creates an empty set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a breakpoint; returns false if it was already set.
	pub fn insert(&mut self, file: &Path, line: u32) -> bool {
		if self.contains(file, line) {
			return false;
		}
		self.points.push(Breakpoint {
			file: file.to_path_buf(),
			line,
		});
		true
	}

	/// Returns true if `file:line` is set.
	pub fn contains(&self, file: &Path, line: u32) -> bool {
		self.points.iter().any(|b| b.line == line && b.file == file)
	}

	/// Removes everything; returns how many were set.
	pub fn clear(&mut self) -> usize {
		std::mem::take(&mut self.points).len()
	}

	/// Breakpoints in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
		self.points.iter()
	}

	/// Number of breakpoints.
	pub fn len(&self) -> usize {
		self.points.len()
	}

	/// Returns true if no breakpoint is set.
	pub fn is_empty(&self) -> bool {
		self.points.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keeps_insertion_order_without_duplicates() {
		let mut set = BreakpointSet::new();
		assert!(set.insert(Path::new("/p/B.scala"), 9));
		assert!(set.insert(Path::new("/p/A.scala"), 3));
		assert!(!set.insert(Path::new("/p/B.scala"), 9));

		let lines: Vec<_> = set.iter().map(ToString::to_string).collect();
		assert_eq!(lines, ["/p/B.scala:9", "/p/A.scala:3"]);
		assert_eq!(set.clear(), 2);
		assert!(set.is_empty());
	}
}
