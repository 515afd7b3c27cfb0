#![cfg_attr(test, allow(unused_crate_dependencies))]
//! Editor-agnostic client core for ENSIME analysis servers.
//!
//! A host editor implements [`EditorAdapter`] once, creates one [`Client`] per project and feeds
//! it commands, idle ticks and cursor moves. The client owns everything else:
//! * the session lifecycle ([`SessionState`]) and command gating
//! * request correlation, supersession and timeouts
//! * compiler diagnostics and debugger breakpoints
//!
//! Transport and framing live in [`ensime_rpc`].

#![warn(missing_docs)]

pub mod breakpoints;
mod client;
pub mod command;
pub mod config;
pub mod diagnostics;
mod dispatch;
pub mod editor;
pub mod error;
pub mod logging;
pub mod request;
mod response;
mod router;
pub mod session;
mod shared;
#[cfg(feature = "testing")]
pub mod testing;
pub mod text;

pub use breakpoints::{Breakpoint, BreakpointSet};
pub use client::Client;
pub use command::{Command, CommandArgs, LineRange};
pub use config::{ClientConfig, ConfigError};
pub use diagnostics::{Diagnostic, DiagnosticStore};
pub use editor::{CompletionItem, EditorAdapter, IdleHandle, IdleTask, Jump, QuickfixItem, Severity, Split};
pub use error::{Error, Result};
pub use session::{Gate, SessionEvent, SessionState};
pub use shared::SharedClient;
