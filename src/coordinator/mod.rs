//! Coordinator: the single logical consumer of the `EventQueue` (spec.md
//! §4.3). Evaluates the decision matrix against whatever transfer is
//! already active on a path, then dispatches to the worker pool.

pub mod matrix;
pub mod transfer;

pub use matrix::{decide, Action};
pub use transfer::TransferTable;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::conflict::{resolve_conflict, ConflictContext, ConflictOutcome};
use crate::delete::DeleteProtection;
use crate::error::SyncError;
use crate::types::{SyncEvent, TransferKind};
use crate::workers::{WorkItem, WorkerContext, WorkerPool};

/// Drives events off the queue onto the worker pool for the lifetime of
/// the agent. Runs on its own thread via `run()`.
pub struct Coordinator {
	ctx: Arc<WorkerContext>,
	pool: WorkerPool,
	delete_protection: DeleteProtection,
	delete_streak: AtomicUsize,
}

impl Coordinator {
	pub fn new(worker_count: usize, ctx: Arc<WorkerContext>, delete_protection: DeleteProtection) -> Self {
		let pool = WorkerPool::spawn(worker_count, ctx.clone());
		Coordinator { ctx, pool, delete_protection, delete_streak: AtomicUsize::new(0) }
	}

	/// Blocks the calling thread, pulling events until the queue is
	/// closed (spec.md §5: the coordinator is its own thread).
	pub fn run(&self) {
		while let Some(event) = self.ctx.queue.pop_timeout(Duration::from_millis(500)) {
			self.handle_event(event);
		}
	}

	/// A full scan cycle completed; deletions observed in the next cycle
	/// are a fresh batch for mass-deletion protection purposes.
	pub fn reset_delete_streak(&self) {
		self.delete_streak.store(0, Ordering::SeqCst);
	}

	pub fn shutdown(self) {
		self.ctx.queue.close();
		self.pool.shutdown();
	}

	fn handle_event(&self, event: SyncEvent) {
		let active = self.ctx.transfer_table.active_kind(&event.path);
		match decide(event.event_type, event.source, active) {
			Action::Ignore => {}
			Action::CancelAndRequeue => {
				self.ctx.transfer_table.cancel(&event.path);
				// The worker notices `cancel` between chunks, not
				// instantly; this bounds the re-check spin rather than
				// busy-polling the queue.
				std::thread::sleep(Duration::from_millis(20));
				self.ctx.queue.push(event);
			}
			Action::MarkConflict => {
				// Let the active upload run to its commit step; a version
				// mismatch there is handled as a post-transfer conflict.
			}
			Action::CreateConflictCopy => self.create_conflict_copy(event),
			Action::Dispatch(kind) => self.dispatch(kind, event),
		}
	}

	fn create_conflict_copy(&self, event: SyncEvent) {
		let record = match self.ctx.state.get_record(&event.path) {
			Ok(r) => r,
			Err(e) => {
				self.ctx.callbacks.on_error(&e);
				return;
			}
		};
		let server_version = event.metadata.server_version.or(record.as_ref().map(|r| r.server_version)).unwrap_or(0);
		let conflict_ctx = ConflictContext {
			local_base_version: record.map(|r| r.server_version),
			server_version,
			local_modified: true,
		};
		match resolve_conflict(&self.ctx.sync_root, &event.path, &conflict_ctx, &self.ctx.machine_id) {
			Ok(ConflictOutcome::Resolved { renamed_to: Some(renamed) }) => {
				self.ctx.callbacks.on_conflict_resolved(&event.path, renamed.as_str());
			}
			Ok(ConflictOutcome::Resolved { renamed_to: None }) | Ok(ConflictOutcome::NoConflict) | Ok(ConflictOutcome::AlreadySynced) => {}
			Ok(ConflictOutcome::RetryNeeded) => {
				// The file was saved again mid-rename; requeue and let the
				// next pass of the decision matrix re-evaluate it.
				self.ctx.queue.push(event);
			}
			Ok(ConflictOutcome::Abort) => self.ctx.callbacks.on_error(&SyncError::Conflict(
				crate::error::ConflictError::Unresolvable {
					message: format!("could not find a free SafeRename sibling for {}", event.path),
				},
			)),
			Err(e) => self.ctx.callbacks.on_error(&SyncError::Conflict(e)),
		}
	}

	fn dispatch(&self, kind: TransferKind, event: SyncEvent) {
		if kind == TransferKind::Delete {
			let total = self.ctx.state.iter_records().map(|records| records.len()).unwrap_or(0).max(1);
			let streak = self.delete_streak.fetch_add(1, Ordering::SeqCst) + 1;
			if let Err(reason) = self.delete_protection.check_allowed(streak, total) {
				self.ctx.callbacks.on_error(&SyncError::Other {
					message: format!("deletion of {} blocked by delete-protection: {}", event.path, reason),
				});
				return;
			}
		} else {
			self.delete_streak.store(0, Ordering::SeqCst);
		}

		let base_version = event.metadata.parent_version.or(event.metadata.server_version);
		let path = event.path.clone();
		let cancel = self.ctx.transfer_table.start(path.clone(), kind, base_version);
		let item = WorkItem { path: path.clone(), kind, event, cancel };
		if self.pool.submit(item).is_err() {
			self.ctx.transfer_table.finish(&path);
		}
	}
}

// vim: ts=4
