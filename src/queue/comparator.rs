//! Dedup rule for two queued events about the same path (spec.md §4.1):
//! the one with the newer observed mtime wins; if mtimes are equal or
//! absent, the one with the later emission timestamp wins.

use crate::types::SyncEvent;
use std::cmp::Ordering;

/// Returns `Ordering::Greater` if `candidate` should replace `incumbent`
/// in the dedup slot, matching `Ord`-style semantics for a
/// `max_by`-style fold.
pub fn mtime_aware_cmp(incumbent: &SyncEvent, candidate: &SyncEvent) -> Ordering {
	let by_mtime = match (incumbent.metadata.mtime, candidate.metadata.mtime) {
		(Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
		_ => Ordering::Equal,
	};
	by_mtime.then_with(|| incumbent.timestamp.partial_cmp(&candidate.timestamp).unwrap_or(Ordering::Equal))
}

/// Given two events for the same path, pick the one that should survive
/// in the queue.
pub fn pick_surviving<'a>(incumbent: &'a SyncEvent, candidate: &'a SyncEvent) -> &'a SyncEvent {
	match mtime_aware_cmp(incumbent, candidate) {
		Ordering::Less => candidate,
		_ => incumbent,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{EventMetadata, EventSource, EventType, RelativePath};

	fn event(mtime: Option<f64>, timestamp: f64) -> SyncEvent {
		SyncEvent {
			id: 0,
			event_type: EventType::LocalModified,
			source: EventSource::Local,
			path: RelativePath::new("a.txt").unwrap(),
			timestamp,
			metadata: EventMetadata { mtime, ..Default::default() },
		}
	}

	#[test]
	fn newer_mtime_wins() {
		let older = event(Some(1.0), 5.0);
		let newer = event(Some(2.0), 1.0);
		assert!(std::ptr::eq(pick_surviving(&older, &newer), &newer));
	}

	#[test]
	fn ties_broken_by_timestamp() {
		let first = event(Some(1.0), 1.0);
		let second = event(Some(1.0), 2.0);
		assert!(std::ptr::eq(pick_surviving(&first, &second), &second));
	}

	#[test]
	fn when_only_one_side_has_mtime_timestamp_decides() {
		let no_mtime = event(None, 10.0);
		let has_mtime = event(Some(0.0), 0.0);
		assert!(std::ptr::eq(pick_surviving(&no_mtime, &has_mtime), &no_mtime));
	}
}

// vim: ts=4
