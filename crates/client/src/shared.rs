//! Cloneable handle for hosts whose callbacks live on several threads.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, MutexGuard};

use crate::client::Client;
use crate::command::{Command, CommandArgs};
use crate::editor::{EditorAdapter, IdleTask};
use crate::error::Result;

/// A [`Client`] behind a mutex.
///
/// Every method locks for the duration of one synchronous call. There is no shared `pump`;
/// such hosts drive the client with [`SharedClient::tick`].
pub struct SharedClient<E>(Arc<Mutex<Client<E>>>);

impl<E> Clone for SharedClient<E> {
	fn clone(&self) -> Self {
		Self(Arc::clone(&self.0))
	}
}

impl<E> std::fmt::Debug for SharedClient<E> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("SharedClient").field(&*self.0.lock()).finish()
	}
}

impl<E: EditorAdapter> SharedClient<E> {
	/// Wraps `client`.
	pub fn new(client: Client<E>) -> Self {
		Self(Arc::new(Mutex::new(client)))
	}

	/// Locks the client for a sequence of calls.
	pub fn lock(&self) -> MutexGuard<'_, Client<E>> {
		self.0.lock()
	}

	/// See [`Client::execute`].
	pub fn execute(&self, command: Command, args: CommandArgs) -> Result<()> {
		self.0.lock().execute(command, args)
	}

	/// See [`Client::run`].
	pub fn run(&self, name: &str, args: CommandArgs) -> Result<()> {
		self.0.lock().run(name, args)
	}

	/// See [`Client::complete`].
	pub fn complete(&self) -> Result<u32> {
		self.0.lock().complete()
	}

	/// See [`Client::tick`].
	pub fn tick(&self, now: Instant) -> usize {
		self.0.lock().tick(now)
	}

	/// See [`Client::on_idle`].
	pub fn on_idle(&self, task: IdleTask, now: Instant) {
		self.0.lock().on_idle(task, now);
	}

	/// See [`Client::cursor_moved`].
	pub fn cursor_moved(&self) {
		self.0.lock().cursor_moved();
	}

	/// See [`Client::teardown`].
	pub fn teardown(&self) {
		self.0.lock().teardown();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::ClientConfig;
	use crate::error::Error;
	use crate::session::SessionState;
	use crate::testing::RecordingEditor;

	#[tokio::test]
	async fn clones_share_one_client() {
		let client = Client::new(ClientConfig::default(), RecordingEditor::new(), tokio::runtime::Handle::current());
		let shared = SharedClient::new(client);
		let other = shared.clone();

		let err = other.execute(Command::TypeAtCursor, CommandArgs::default()).unwrap_err();
		assert!(matches!(err, Error::NotReady { state: SessionState::NotStarted, .. }));
		assert_eq!(
			shared.lock().editor().echoes(),
			["[ensime] type-at-cursor is not available while the session is NotStarted"]
		);
	}
}
