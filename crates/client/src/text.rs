//! Buffer text helpers: offsets, words under the cursor, package clauses.
//!
//! Offsets count characters, with one extra per line for the newline.

/// Character offset of `(line, col)`; `line` is 1-based, `col` 0-based.
pub fn offset(lines: &[String], line: u32, col: u32) -> usize {
	let before = (line.saturating_sub(1) as usize).min(lines.len());
	let preceding: usize = lines[..before].iter().map(|l| l.chars().count() + 1).sum();
	preceding + col as usize
}

fn is_ident(c: char) -> bool {
	c.is_alphanumeric() || c == '_' || c == '$'
}

/// Columns of the first and last character of the identifier at `col`.
pub fn word_bounds(line: &str, col: u32) -> Option<(u32, u32)> {
	let chars: Vec<char> = line.chars().collect();
	let col = col as usize;
	if !chars.get(col).copied().is_some_and(is_ident) {
		return None;
	}
	let start = chars[..col].iter().rposition(|c| !is_ident(*c)).map_or(0, |i| i + 1);
	let end = chars[col..].iter().position(|c| !is_ident(*c)).map_or(chars.len(), |i| col + i) - 1;
	Some((start as u32, end as u32))
}

/// The identifier at `col`.
pub fn word_at(line: &str, col: u32) -> Option<String> {
	let (start, end) = word_bounds(line, col)?;
	Some(line.chars().skip(start as usize).take((end - start + 1) as usize).collect())
}

/// Column where the completion prefix ending at `col` starts.
pub fn completion_start(line: &str, col: u32) -> u32 {
	let chars: Vec<char> = line.chars().take(col as usize).collect();
	chars.iter().rposition(|c| *c == ' ' || *c == '.').map_or(0, |i| i as u32 + 1)
}

/// Package declared by the buffer; chained clauses are joined.
pub fn package_name(lines: &[String]) -> Option<String> {
	let parts: Vec<&str> = lines
		.iter()
		.filter_map(|l| l.trim_start().strip_prefix("package "))
		.map(|rest| rest.trim().trim_end_matches(';').trim())
		.filter(|p| !p.is_empty() && !p.starts_with("object"))
		.collect();
	if parts.is_empty() { None } else { Some(parts.join(".")) }
}

/// Shortens `message` to `width` characters.
pub fn truncate(message: &str, width: usize) -> String {
	let single: String = message.split_whitespace().collect::<Vec<_>>().join(" ");
	if single.chars().count() <= width {
		return single;
	}
	let keep = width.saturating_sub(3);
	let mut out: String = single.chars().take(keep).collect();
	out.push_str("...");
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn lines(text: &str) -> Vec<String> {
		text.lines().map(str::to_owned).collect()
	}

	#[test]
	fn offset_counts_newlines() {
		let buf = lines("ab\ncdé\nx");
		assert_eq!(offset(&buf, 1, 0), 0);
		assert_eq!(offset(&buf, 2, 1), 4);
		assert_eq!(offset(&buf, 3, 0), 7);
	}

	#[test]
	fn word_bounds_cover_identifier() {
		assert_eq!(word_bounds("val foo_bar = 1", 5), Some((4, 10)));
		assert_eq!(word_bounds("foo", 0), Some((0, 2)));
		assert_eq!(word_bounds("a.b", 1), None);
		assert_eq!(word_bounds("x", 4), None);
		assert_eq!(word_at("  List(1)", 3).as_deref(), Some("List"));
	}

	#[test]
	fn completion_start_stops_at_dot_or_space() {
		assert_eq!(completion_start("  xs.ma", 7), 5);
		assert_eq!(completion_start("foo", 3), 0);
		assert_eq!(completion_start("a b", 3), 2);
	}

	#[test]
	fn package_clauses_are_joined() {
		assert_eq!(package_name(&lines("package com.example\npackage util\n\nobject A")).as_deref(), Some("com.example.util"));
		assert_eq!(package_name(&lines("package a.b;\nclass C")).as_deref(), Some("a.b"));
		assert_eq!(package_name(&lines("object A")), None);
	}

	#[test]
	fn truncate_marks_cut_messages() {
		assert_eq!(truncate("short", 10), "short");
		assert_eq!(truncate("type mismatch;\n found: Int", 12), "type mism...");
	}
}
