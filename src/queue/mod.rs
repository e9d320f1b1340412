//! Priority event queue feeding the coordinator thread (spec.md §4.1,
//! §5). Backed by a `Mutex`-guarded binary heap plus a `Condvar` rather
//! than an async channel, in keeping with the thread-per-role
//! concurrency model: watcher, scanner and coordinator all block on
//! plain OS primitives.

pub mod comparator;
pub mod priority;

pub use priority::{priority_for, Priority};

use std::collections::{BinaryHeap, HashMap};
use std::cmp::Ordering;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::types::{RelativePath, SyncEvent};

#[derive(Debug)]
struct QueuedEvent {
	priority: Priority,
	sequence: u64,
	event: SyncEvent,
}

impl PartialEq for QueuedEvent {
	fn eq(&self, other: &Self) -> bool {
		self.priority == other.priority && self.sequence == other.sequence
	}
}
impl Eq for QueuedEvent {}

impl Ord for QueuedEvent {
	fn cmp(&self, other: &Self) -> Ordering {
		// BinaryHeap is a max-heap; invert priority so the numerically
		// smallest (highest-urgency) value pops first, and break ties by
		// insertion order (earlier first).
		other.priority.cmp(&self.priority).then_with(|| other.sequence.cmp(&self.sequence))
	}
}
impl PartialOrd for QueuedEvent {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

struct Inner {
	heap: BinaryHeap<QueuedEvent>,
	/// Index by path so a second event for the same path can be folded
	/// into the one already queued instead of processed twice.
	by_path: HashMap<RelativePath, u64>,
	next_sequence: u64,
	closed: bool,
}

/// Thread-safe priority queue of `SyncEvent`s with same-path dedup.
pub struct EventQueue {
	inner: Mutex<Inner>,
	not_empty: Condvar,
}

impl EventQueue {
	pub fn new() -> Self {
		EventQueue {
			inner: Mutex::new(Inner {
				heap: BinaryHeap::new(),
				by_path: HashMap::new(),
				next_sequence: 0,
				closed: false,
			}),
			not_empty: Condvar::new(),
		}
	}

	/// Enqueue `event`. If another event for the same path is already
	/// queued, the two are compared with `comparator::pick_surviving`
	/// and only the winner stays queued, re-using the winner's priority.
	pub fn push(&self, event: SyncEvent) {
		let mut inner = self.inner.lock().expect("event queue lock poisoned");
		if inner.closed {
			return;
		}

		let priority = priority_for(event.event_type, event.source);

		if let Some(&existing_seq) = inner.by_path.get(&event.path) {
			let keep_new = match inner.heap.iter().find(|q| q.sequence == existing_seq) {
				Some(existing) => {
					comparator::mtime_aware_cmp(&existing.event, &event) == std::cmp::Ordering::Less
				}
				None => true,
			};
			if !keep_new {
				return;
			}
			inner.heap.retain(|q| q.sequence != existing_seq);
		}

		let sequence = inner.next_sequence;
		inner.next_sequence += 1;
		inner.by_path.insert(event.path.clone(), sequence);
		inner.heap.push(QueuedEvent { priority, sequence, event });
		self.not_empty.notify_one();
	}

	/// Block until an event is available or the queue is closed, then
	/// return it. Returns `None` once the queue is closed and drained.
	pub fn pop(&self) -> Option<SyncEvent> {
		let mut inner = self.inner.lock().expect("event queue lock poisoned");
		loop {
			if let Some(queued) = inner.heap.pop() {
				inner.by_path.remove(&queued.event.path);
				return Some(queued.event);
			}
			if inner.closed {
				return None;
			}
			inner = self.not_empty.wait(inner).expect("event queue lock poisoned");
		}
	}

	/// Like `pop`, but gives up after `timeout` and returns `None`
	/// without closing the queue — used by the coordinator's idle loop.
	pub fn pop_timeout(&self, timeout: Duration) -> Option<SyncEvent> {
		let mut inner = self.inner.lock().expect("event queue lock poisoned");
		loop {
			if let Some(queued) = inner.heap.pop() {
				inner.by_path.remove(&queued.event.path);
				return Some(queued.event);
			}
			if inner.closed {
				return None;
			}
			let (next, result) =
				self.not_empty.wait_timeout(inner, timeout).expect("event queue lock poisoned");
			inner = next;
			if result.timed_out() {
				return None;
			}
		}
	}

	pub fn len(&self) -> usize {
		self.inner.lock().expect("event queue lock poisoned").heap.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Wake every blocked `pop` with `None` and stop accepting pushes.
	pub fn close(&self) {
		let mut inner = self.inner.lock().expect("event queue lock poisoned");
		inner.closed = true;
		self.not_empty.notify_all();
	}
}

impl Default for EventQueue {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{EventMetadata, EventSource, EventType};

	fn event(event_type: EventType, path: &str) -> SyncEvent {
		SyncEvent::new(
			0,
			event_type,
			EventSource::Local,
			RelativePath::new(path).unwrap(),
			EventMetadata::default(),
		)
	}

	#[test]
	fn higher_priority_pops_first() {
		let queue = EventQueue::new();
		queue.push(event(EventType::LocalModified, "normal.txt"));
		queue.push(event(EventType::LocalDeleted, "critical.txt"));

		let first = queue.pop().unwrap();
		assert_eq!(first.path.as_str(), "critical.txt");
	}

	#[test]
	fn fifo_within_same_priority() {
		let queue = EventQueue::new();
		queue.push(event(EventType::LocalModified, "a.txt"));
		queue.push(event(EventType::LocalModified, "b.txt"));

		assert_eq!(queue.pop().unwrap().path.as_str(), "a.txt");
		assert_eq!(queue.pop().unwrap().path.as_str(), "b.txt");
	}

	#[test]
	fn second_event_for_same_path_replaces_first() {
		let queue = EventQueue::new();
		queue.push(event(EventType::LocalModified, "a.txt"));
		queue.push(event(EventType::LocalDeleted, "a.txt"));

		assert_eq!(queue.len(), 1);
		let popped = queue.pop().unwrap();
		assert_eq!(popped.event_type, EventType::LocalDeleted);
	}

	#[test]
	fn pop_timeout_returns_none_when_idle() {
		let queue = EventQueue::new();
		assert!(queue.pop_timeout(Duration::from_millis(10)).is_none());
	}

	#[test]
	fn close_unblocks_pop() {
		let queue = EventQueue::new();
		queue.close();
		assert!(queue.pop().is_none());
	}
}

// vim: ts=4
