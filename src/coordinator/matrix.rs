//! The Coordinator's decision matrix (spec.md §4.3): a small table of
//! `(event source/type, active transfer kind) -> action` rules, evaluated
//! by a single `decide()` function so new rows never touch the dispatch
//! loop — the same first-match-wins shape the teacher uses for its
//! exclusion/conflict rule sets.

use crate::types::{EventSource, EventType, TransferKind};

/// What the coordinator should do with an incoming event, given whatever
/// transfer (if any) is already active for that path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
	/// Cancel the active transfer and requeue this event to be
	/// re-dispatched once the cancellation completes.
	CancelAndRequeue,
	/// Drop the event; the active transfer already covers it.
	Ignore,
	/// Let the active upload continue; its commit will likely surface a
	/// version conflict, which the conflict subsystem then handles.
	MarkConflict,
	/// Preserve the local file as a conflict copy before the active
	/// upload proceeds.
	CreateConflictCopy,
	/// No transfer is active for this path; start one of the given kind.
	Dispatch(TransferKind),
}

/// Evaluate the decision matrix for one event against the (possibly
/// absent) kind of transfer currently active on that event's path.
pub fn decide(event_type: EventType, source: EventSource, active: Option<TransferKind>) -> Action {
	match (source, active) {
		(_, None) => match transfer_kind_for(event_type) {
			Some(kind) => Action::Dispatch(kind),
			None => Action::Ignore,
		},
		(EventSource::Local, Some(TransferKind::Download)) => Action::CancelAndRequeue,
		(EventSource::Local, Some(TransferKind::Upload)) => Action::Ignore,
		(EventSource::Local, Some(TransferKind::Delete)) => Action::Ignore,
		(EventSource::Remote, Some(TransferKind::Upload)) => match event_type {
			EventType::RemoteModified => Action::MarkConflict,
			EventType::RemoteDeleted => Action::CreateConflictCopy,
			_ => Action::Ignore,
		},
		(EventSource::Remote, Some(TransferKind::Download)) => Action::Ignore,
		(EventSource::Remote, Some(TransferKind::Delete)) => Action::Ignore,
		(EventSource::Internal, Some(_)) => Action::Ignore,
	}
}

/// The transfer kind an event would start, absent any active transfer.
/// Bookkeeping events (`TransferComplete`/`TransferFailed`) never start a
/// new transfer on their own.
fn transfer_kind_for(event_type: EventType) -> Option<TransferKind> {
	match event_type {
		EventType::LocalCreated | EventType::LocalModified => Some(TransferKind::Upload),
		EventType::LocalDeleted => Some(TransferKind::Delete),
		EventType::RemoteCreated | EventType::RemoteModified => Some(TransferKind::Download),
		EventType::RemoteDeleted => Some(TransferKind::Delete),
		EventType::TransferComplete | EventType::TransferFailed => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn no_active_transfer_dispatches_by_event_type() {
		assert_eq!(decide(EventType::LocalCreated, EventSource::Local, None), Action::Dispatch(TransferKind::Upload));
		assert_eq!(decide(EventType::RemoteDeleted, EventSource::Remote, None), Action::Dispatch(TransferKind::Delete));
	}

	#[test]
	fn local_event_cancels_active_download() {
		assert_eq!(
			decide(EventType::LocalModified, EventSource::Local, Some(TransferKind::Download)),
			Action::CancelAndRequeue
		);
	}

	#[test]
	fn local_event_ignored_during_active_upload() {
		assert_eq!(
			decide(EventType::LocalModified, EventSource::Local, Some(TransferKind::Upload)),
			Action::Ignore
		);
	}

	#[test]
	fn remote_modify_marks_conflict_during_upload() {
		assert_eq!(
			decide(EventType::RemoteModified, EventSource::Remote, Some(TransferKind::Upload)),
			Action::MarkConflict
		);
	}

	#[test]
	fn remote_delete_creates_conflict_copy_during_upload() {
		assert_eq!(
			decide(EventType::RemoteDeleted, EventSource::Remote, Some(TransferKind::Upload)),
			Action::CreateConflictCopy
		);
	}

	#[test]
	fn remote_event_ignored_during_active_download() {
		assert_eq!(
			decide(EventType::RemoteModified, EventSource::Remote, Some(TransferKind::Download)),
			Action::Ignore
		);
	}

	#[test]
	fn bookkeeping_events_with_no_active_transfer_are_ignored() {
		assert_eq!(decide(EventType::TransferComplete, EventSource::Internal, None), Action::Ignore);
	}
}

// vim: ts=4
