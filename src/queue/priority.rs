//! Event priority levels (spec.md §4.1): lower numeric value sorts
//! first out of the queue.

use crate::types::{EventSource, EventType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(pub u8);

pub const CRITICAL: Priority = Priority(10);
pub const HIGH: Priority = Priority(20);
pub const NORMAL: Priority = Priority(30);
pub const LOW: Priority = Priority(90);

/// Deletes jump the queue; local edits (user work) outrank remote edits,
/// and internal TRANSFER_* bookkeeping events are lowest (spec.md §4.2:
/// HIGH=20 local, NORMAL=30 remote, LOW=90 internal).
pub fn priority_for(event_type: EventType, source: EventSource) -> Priority {
	match (event_type, source) {
		(EventType::RemoteDeleted, _) | (EventType::LocalDeleted, _) => CRITICAL,
		(EventType::LocalCreated, _) | (EventType::LocalModified, _) => HIGH,
		(EventType::RemoteCreated, _) | (EventType::RemoteModified, _) => NORMAL,
		(EventType::TransferComplete, _) | (EventType::TransferFailed, _) => LOW,
		(_, EventSource::Internal) => LOW,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn deletes_are_critical() {
		assert_eq!(priority_for(EventType::RemoteDeleted, EventSource::Remote), CRITICAL);
		assert_eq!(priority_for(EventType::LocalDeleted, EventSource::Local), CRITICAL);
	}

	#[test]
	fn critical_outranks_normal() {
		assert!(CRITICAL < NORMAL);
		assert!(NORMAL < LOW);
	}
}

// vim: ts=4
