//! Pending-request table keyed by correlation id.
//!
//! The registry owns every [`PendingRequest`] from allocation until it is resolved, cancelled,
//! or expired. Each id is removed exactly once, so a second resolution attempt (a late or
//! duplicate response) finds nothing and is dropped.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::Error;

/// Correlation id linking a request to its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(pub u64);

impl std::fmt::Display for CallId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Simple counter-based id generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct CallIdGen(pub u64);

impl CallIdGen {
	/// Creates a new counter starting at 1.
	#[must_use]
	pub const fn new() -> Self {
		Self(1)
	}

	/// Returns the current value and advances, wrapping at `u64::MAX`.
	#[allow(clippy::should_implement_trait, reason = "convention")]
	pub fn next(&mut self) -> CallId {
		let id = CallId(self.0);
		self.0 = self.0.wrapping_add(1);
		id
	}
}

/// A request awaiting its response.
#[derive(Debug)]
pub struct PendingRequest<C> {
	/// Correlation id.
	pub id: CallId,
	/// Request typehint, kept for diagnostics and error messages.
	pub command: String,
	/// When the request was handed to the transport.
	pub issued_at: Instant,
	/// Data needed to apply the eventual response.
	pub context: C,
	/// Deadline after which the request fails with [`Error::Timeout`].
	pub timeout_at: Option<Instant>,
}

/// Tracks outstanding requests for one connection.
#[derive(Debug)]
pub struct CorrelationRegistry<C> {
	ids: CallIdGen,
	pending: HashMap<CallId, PendingRequest<C>>,
}

impl<C> Default for CorrelationRegistry<C> {
	fn default() -> Self {
		Self::new()
	}
}

impl<C> CorrelationRegistry<C> {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::starting_at(CallIdGen::new())
	}

	/// Creates an empty registry whose first id comes from `ids`.
	pub fn starting_at(ids: CallIdGen) -> Self {
		Self {
			ids,
			pending: HashMap::new(),
		}
	}

	/// Registers a new pending request and returns its id.
	///
	/// Ids increase monotonically; after wrapping, ids still outstanding are skipped.
	pub fn allocate(
		&mut self,
		command: impl Into<String>,
		context: C,
		now: Instant,
		timeout: Option<Duration>,
	) -> CallId {
		let id = loop {
			let id = self.ids.next();
			if !self.pending.contains_key(&id) {
				break id;
			}
		};
		let command = command.into();
		tracing::trace!(call_id = %id, command = %command, "rpc.allocate");
		self.pending.insert(
			id,
			PendingRequest {
				id,
				command,
				issued_at: now,
				context,
				timeout_at: timeout.and_then(|t| now.checked_add(t)),
			},
		);
		id
	}

	/// Removes the entry for `id` so its response can be applied.
	///
	/// Returns `None` for unknown ids (late, duplicate, superseded or foreign responses).
	pub fn resolve(&mut self, id: CallId) -> Option<PendingRequest<C>> {
		let entry = self.pending.remove(&id);
		if entry.is_none() {
			tracing::debug!(call_id = %id, "Dropping response for unknown call id");
		}
		entry
	}

	/// Cancels one request without failing it; its late response will be dropped.
	pub fn cancel(&mut self, id: CallId) -> Option<PendingRequest<C>> {
		let entry = self.pending.remove(&id);
		if let Some(entry) = &entry {
			tracing::debug!(call_id = %id, command = %entry.command, "rpc.cancel");
		}
		entry
	}

	/// Fails every pending request with [`Error::ConnectionLost`], in id order.
	pub fn cancel_all(&mut self, reason: &str) -> Vec<(PendingRequest<C>, Error)> {
		let mut drained: Vec<_> = self.pending.drain().map(|(_, p)| p).collect();
		drained.sort_by_key(|p| p.id);
		if !drained.is_empty() {
			tracing::info!(count = drained.len(), reason, "Cancelling pending requests");
		}
		drained
			.into_iter()
			.map(|p| {
				let err = Error::ConnectionLost {
					reason: reason.to_owned(),
				};
				(p, err)
			})
			.collect()
	}

	/// Fails every request whose deadline is at or before `now` with [`Error::Timeout`].
	pub fn expire(&mut self, now: Instant) -> Vec<(PendingRequest<C>, Error)> {
		let mut overdue: Vec<CallId> = self
			.pending
			.values()
			.filter(|p| p.timeout_at.is_some_and(|t| t <= now))
			.map(|p| p.id)
			.collect();
		overdue.sort();

		overdue
			.into_iter()
			.filter_map(|id| self.pending.remove(&id))
			.map(|p| {
				tracing::warn!(call_id = %p.id, command = %p.command, "Request timed out");
				let err = Error::Timeout {
					id: p.id,
					command: p.command.clone(),
				};
				(p, err)
			})
			.collect()
	}

	/// Earliest deadline among pending requests.
	pub fn next_deadline(&self) -> Option<Instant> {
		self.pending.values().filter_map(|p| p.timeout_at).min()
	}

	/// Returns true if `id` is outstanding.
	pub fn contains(&self, id: CallId) -> bool {
		self.pending.contains_key(&id)
	}

	/// Context of an outstanding request.
	pub fn get(&self, id: CallId) -> Option<&PendingRequest<C>> {
		self.pending.get(&id)
	}

	/// Number of outstanding requests.
	pub fn len(&self) -> usize {
		self.pending.len()
	}

	/// Returns true if nothing is outstanding.
	pub fn is_empty(&self) -> bool {
		self.pending.is_empty()
	}
}

#[cfg(test)]
mod tests;
