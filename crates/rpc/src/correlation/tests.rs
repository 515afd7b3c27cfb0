use std::collections::HashSet;

use proptest::prelude::*;

use super::*;

fn registry() -> CorrelationRegistry<&'static str> {
	CorrelationRegistry::new()
}

#[test]
fn ids_increase_from_one() {
	let mut reg = registry();
	let now = Instant::now();
	assert_eq!(reg.allocate("A", "a", now, None), CallId(1));
	assert_eq!(reg.allocate("B", "b", now, None), CallId(2));
	assert_eq!(reg.len(), 2);
}

#[test]
fn resolve_is_at_most_once() {
	let mut reg = registry();
	let id = reg.allocate("TypeAtPointReq", "ctx", Instant::now(), None);

	let first = reg.resolve(id).unwrap();
	assert_eq!(first.context, "ctx");
	assert!(reg.resolve(id).is_none());
	assert!(reg.is_empty());
}

#[test]
fn resolve_after_cancel_all_is_noop() {
	let mut reg = registry();
	let now = Instant::now();
	let a = reg.allocate("TypecheckFilesReq", "a", now, None);
	let b = reg.allocate("RefactorReq", "b", now, None);

	let failed = reg.cancel_all("server exited");
	assert_eq!(failed.len(), 2);
	assert!(failed.iter().all(|(_, e)| matches!(e, Error::ConnectionLost { .. })));
	assert_eq!(failed[0].0.id, a);
	assert_eq!(failed[1].0.id, b);

	assert!(reg.resolve(a).is_none());
	assert!(reg.resolve(b).is_none());
}

#[test]
fn cancelled_request_ignores_late_response() {
	let mut reg = registry();
	let id = reg.allocate("PublicSymbolSearchReq", "old", Instant::now(), None);
	assert!(reg.cancel(id).is_some());
	assert!(reg.resolve(id).is_none());
}

#[test]
fn expire_fails_only_overdue_requests() {
	let mut reg = registry();
	let now = Instant::now();
	let short = reg.allocate("CompletionsReq", "short", now, Some(Duration::from_secs(1)));
	let long = reg.allocate("TypecheckFilesReq", "long", now, Some(Duration::from_secs(30)));
	let open = reg.allocate("DebugContinueReq", "open", now, None);

	assert!(reg.expire(now).is_empty());
	assert_eq!(reg.next_deadline(), now.checked_add(Duration::from_secs(1)));

	let expired = reg.expire(now + Duration::from_secs(2));
	assert_eq!(expired.len(), 1);
	assert_eq!(expired[0].0.id, short);
	assert!(matches!(&expired[0].1, Error::Timeout { id, command } if *id == short && command == "CompletionsReq"));

	assert!(reg.contains(long));
	assert!(reg.contains(open));
}

#[test]
fn wrapping_skips_outstanding_ids() {
	let mut reg = CorrelationRegistry::starting_at(CallIdGen(u64::MAX));
	let now = Instant::now();
	assert_eq!(reg.allocate("A", "max", now, None), CallId(u64::MAX));
	assert_eq!(reg.allocate("B", "zero", now, None), CallId(0));

	// Rewind the generator onto an id that is still outstanding.
	let mut reg2 = CorrelationRegistry::starting_at(CallIdGen(5));
	let five = reg2.allocate("A", "five", now, None);
	reg2.ids = CallIdGen(5);
	let next = reg2.allocate("B", "six", now, None);
	assert_eq!(five, CallId(5));
	assert_eq!(next, CallId(6));
}

proptest! {
	#[test]
	fn allocated_ids_are_pairwise_distinct(ops in proptest::collection::vec(any::<bool>(), 1..200)) {
		let mut reg = registry();
		let now = Instant::now();
		let mut seen = HashSet::new();
		let mut outstanding = Vec::new();

		for resolve in ops {
			if resolve && !outstanding.is_empty() {
				let id = outstanding.remove(0);
				prop_assert!(reg.resolve(id).is_some());
			} else {
				let id = reg.allocate("Req", "ctx", now, None);
				prop_assert!(seen.insert(id));
				outstanding.push(id);
			}
		}
	}
}
