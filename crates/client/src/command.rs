//! User-facing command surface.
//!
//! Commands are addressable by their kebab-case name (`type-at-cursor`, `symbol-search`, ...) so
//! hosts can bind them to whatever keybinding or command-line syntax they use.

use crate::session::Gate;

/// Every command a host can route to the client.
#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	Hash,
	strum::Display,
	strum::EnumString,
	strum::IntoStaticStr,
	strum::EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
pub enum Command {
	/// Connect to (or spawn) the analysis server.
	Start,
	/// Shut the session down now.
	Stop,
	/// Show the session this client manages.
	ListClients,
	/// Type check the current file.
	TypeCheck,
	/// Echo the type of the symbol under the cursor.
	TypeAtCursor,
	/// Echo the file declaring the symbol under the cursor.
	SymbolAtCursor,
	/// Open the declaration of a fully qualified name.
	SymbolByName,
	/// Search public symbols by keyword.
	SymbolSearch,
	/// Reformat the current buffer.
	FormatSource,
	/// Show the members of a package.
	ShowPackage,
	/// Jump to the declaration of the symbol under the cursor.
	GoToDeclaration,
	/// List the uses of the symbol under the cursor.
	FindUsages,
	/// Rename the symbol under the cursor.
	Rename,
	/// Inline the local under the cursor.
	Inline,
	/// Echo the type and interfaces of the symbol under the cursor.
	InspectType,
	/// Echo the documentation URL for the symbol under the cursor.
	DocLookup,
	/// Open the documentation for the symbol under the cursor.
	DocBrowse,
	/// Offer imports for the word under the cursor.
	SuggestImport,
	/// Organize the imports of the current file.
	OrganizeImports,
	/// Add an import to the current file.
	AddImport,
	/// Add a breakpoint at the cursor line.
	SetBreakpoint,
	/// Remove every breakpoint.
	ClearBreakpoints,
	/// Attach the debugger to a JVM.
	DebugStart,
	/// Resume the suspended thread.
	DebugContinue,
	/// Step into.
	DebugStep,
	/// Step over.
	DebugNext,
	/// Step out.
	DebugStepOut,
	/// Show the backtrace of the suspended thread.
	Backtrace,
	/// Toggle between simple and fully qualified type names.
	ToggleFullTypeDisplay,
	/// Toggle whether the server outlives the editor.
	ToggleTeardown,
}

impl Command {
	/// Minimum session state for this command.
	pub fn gate(self) -> Gate {
		match self {
			Self::Start
			| Self::Stop
			| Self::ListClients
			| Self::ToggleFullTypeDisplay
			| Self::ToggleTeardown
			| Self::SetBreakpoint
			| Self::ClearBreakpoints => Gate::Any,
			Self::SymbolSearch
			| Self::ShowPackage
			| Self::DebugStart
			| Self::DebugContinue
			| Self::DebugStep
			| Self::DebugNext
			| Self::DebugStepOut
			| Self::Backtrace => Gate::Connected,
			Self::TypeCheck
			| Self::TypeAtCursor
			| Self::SymbolAtCursor
			| Self::SymbolByName
			| Self::FormatSource
			| Self::GoToDeclaration
			| Self::FindUsages
			| Self::Rename
			| Self::Inline
			| Self::InspectType
			| Self::DocLookup
			| Self::DocBrowse
			| Self::SuggestImport
			| Self::OrganizeImports
			| Self::AddImport => Gate::Ready,
		}
	}

	/// Command name as hosts address it.
	pub fn name(self) -> &'static str {
		self.into()
	}
}

/// Inclusive line range the command was invoked on (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
	/// First line.
	pub start: u32,
	/// Last line.
	pub end: u32,
}

/// Positional arguments and optional range of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
	/// Positional arguments, as typed.
	pub args: Vec<String>,
	/// Selected range, if the host passed one.
	pub range: Option<LineRange>,
}

impl CommandArgs {
	/// Arguments without a range.
	pub fn new(args: impl IntoIterator<Item = impl Into<String>>) -> Self {
		Self {
			args: args.into_iter().map(Into::into).collect(),
			range: None,
		}
	}

	/// Sets the range.
	#[must_use]
	pub fn with_range(mut self, start: u32, end: u32) -> Self {
		self.range = Some(LineRange { start, end });
		self
	}

	/// Argument at `index`, ignoring blank entries.
	pub fn arg(&self, index: usize) -> Option<&str> {
		self.args
			.get(index)
			.map(|a| a.trim())
			.filter(|a| !a.is_empty())
	}

	/// Returns true if no argument was given.
	pub fn is_empty(&self) -> bool {
		self.args.iter().all(|a| a.trim().is_empty())
	}
}

#[cfg(test)]
mod tests {
	use std::str::FromStr;

	use strum::IntoEnumIterator;

	use super::*;

	#[test]
	fn names_are_kebab_case() {
		assert_eq!(Command::from_str("type-at-cursor").unwrap(), Command::TypeAtCursor);
		assert_eq!(Command::from_str("toggle-full-type-display").unwrap(), Command::ToggleFullTypeDisplay);
		assert_eq!(Command::DebugStepOut.name(), "debug-step-out");
		assert!(Command::from_str("typeAtCursor").is_err());
	}

	#[test]
	fn names_round_trip() {
		for command in Command::iter() {
			assert_eq!(Command::from_str(command.name()).unwrap(), command);
		}
	}

	#[test]
	fn gates_follow_command_families() {
		assert_eq!(Command::Start.gate(), Gate::Any);
		assert_eq!(Command::SetBreakpoint.gate(), Gate::Any);
		assert_eq!(Command::SymbolSearch.gate(), Gate::Connected);
		assert_eq!(Command::Backtrace.gate(), Gate::Connected);
		assert_eq!(Command::Rename.gate(), Gate::Ready);
		assert_eq!(Command::TypeCheck.gate(), Gate::Ready);
	}

	#[test]
	fn blank_args_are_absent() {
		let args = CommandArgs::new(["", "  "]);
		assert!(args.is_empty());
		assert_eq!(args.arg(0), None);
		assert_eq!(CommandArgs::new(["v"]).arg(0), Some("v"));
	}
}
