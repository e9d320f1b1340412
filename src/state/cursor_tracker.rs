//! Ties `change_cursor` persistence to batch completion (spec.md §4.6:
//! "`change_cursor` is advanced only after all events in a fetched batch
//! have reached a terminal outcome"). A poll registers the paths its
//! batch touched; every worker reports back through this tracker when
//! its transfer finishes, and the cursor is written once the last path
//! in the batch has reported in.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::warn;

use super::LocalStateStore;
use crate::types::RelativePath;

struct PendingBatch {
	next_cursor: u64,
	remaining: HashSet<RelativePath>,
}

pub struct ChangeCursorTracker {
	state: Arc<LocalStateStore>,
	pending: Mutex<Option<PendingBatch>>,
}

impl ChangeCursorTracker {
	pub fn new(state: Arc<LocalStateStore>) -> Self {
		ChangeCursorTracker { state, pending: Mutex::new(None) }
	}

	/// Register a freshly polled batch. An empty batch (nothing changed)
	/// advances the cursor immediately; otherwise the cursor is held
	/// until `notify_terminal` has been called for every path in it.
	///
	/// A batch registered while a previous one is still pending replaces
	/// it: the poll cadence never runs two batches concurrently, so this
	/// only happens if a prior batch's paths never finished, which
	/// shouldn't happen but must not wedge the cursor forever if it does.
	pub fn register(&self, next_cursor: u64, paths: impl IntoIterator<Item = RelativePath>) {
		let remaining: HashSet<RelativePath> = paths.into_iter().collect();
		if remaining.is_empty() {
			self.persist(next_cursor);
			return;
		}
		let mut pending = self.pending.lock().expect("change cursor tracker lock poisoned");
		*pending = Some(PendingBatch { next_cursor, remaining });
	}

	/// A path's dispatched transfer reached a terminal outcome. If this
	/// was the last outstanding path in the current batch, the cursor
	/// advances.
	pub fn notify_terminal(&self, path: &RelativePath) {
		let cursor_to_persist = {
			let mut pending = self.pending.lock().expect("change cursor tracker lock poisoned");
			match pending.as_mut() {
				Some(batch) => {
					batch.remaining.remove(path);
					if batch.remaining.is_empty() {
						let cursor = batch.next_cursor;
						*pending = None;
						Some(cursor)
					} else {
						None
					}
				}
				None => None,
			}
		};
		if let Some(cursor) = cursor_to_persist {
			self.persist(cursor);
		}
	}

	fn persist(&self, cursor: u64) {
		if let Err(e) = self.state.set_change_cursor(cursor) {
			warn!(error = %e, cursor, "failed to persist change cursor");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn tracker() -> (TempDir, ChangeCursorTracker) {
		let tmp = TempDir::new().unwrap();
		let state = Arc::new(LocalStateStore::open(&tmp.path().join("state.redb")).unwrap());
		let tracker = ChangeCursorTracker::new(state);
		(tmp, tracker)
	}

	fn path(s: &str) -> RelativePath {
		RelativePath::new(s).unwrap()
	}

	#[test]
	fn empty_batch_advances_immediately() {
		let (_tmp, tracker) = tracker();
		tracker.register(5, std::iter::empty());
		assert_eq!(tracker.state.get_change_cursor().unwrap(), Some(5));
	}

	#[test]
	fn cursor_holds_until_every_path_reports_terminal() {
		let (_tmp, tracker) = tracker();
		tracker.register(7, [path("a.txt"), path("b.txt")]);
		assert_eq!(tracker.state.get_change_cursor().unwrap(), None);

		tracker.notify_terminal(&path("a.txt"));
		assert_eq!(tracker.state.get_change_cursor().unwrap(), None);

		tracker.notify_terminal(&path("b.txt"));
		assert_eq!(tracker.state.get_change_cursor().unwrap(), Some(7));
	}

	#[test]
	fn unrelated_path_does_not_advance_the_cursor() {
		let (_tmp, tracker) = tracker();
		tracker.register(3, [path("a.txt")]);
		tracker.notify_terminal(&path("unrelated.txt"));
		assert_eq!(tracker.state.get_change_cursor().unwrap(), None);
	}
}

// vim: ts=4
