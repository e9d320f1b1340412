//! Observability callbacks: the single reporter that drives tray-style
//! status updates (spec.md §7 — "a single reporter consumes all state
//! transitions; the agent itself never presents UI").

use crate::error::SyncError;
use crate::types::{RelativePath, TransferKind};
use std::time::Duration;

type ProgressFn = dyn Fn(ProgressStats) + Send + Sync;
type ConflictFn = dyn Fn(&RelativePath, &str) + Send + Sync;
type ErrorFn = dyn Fn(&SyncError) + Send + Sync;
type TransferFn = dyn Fn(&RelativePath, TransferKind) + Send + Sync;
type TransferFailedFn = dyn Fn(&RelativePath, TransferKind, &SyncError) + Send + Sync;

/// Overall phase the agent is in, surfaced to whatever displays status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentPhase {
	Idle,
	Scanning,
	Syncing,
	Offline,
}

/// Snapshot of progress, published periodically while `Syncing`.
#[derive(Debug, Clone)]
pub struct ProgressStats {
	pub phase: AgentPhase,
	pub files_processed: usize,
	pub files_total: usize,
	pub bytes_transferred: u64,
	pub bytes_total: u64,
	pub transfer_rate: f64,
	pub elapsed: Duration,
	pub eta: Duration,
}

/// Combined callback handler for all agent events. Every method has a
/// no-op default so implementors only override what they display.
pub trait SyncCallbacks: Send + Sync {
	fn on_progress(&self, _stats: ProgressStats) {}

	/// A conflict was detected and resolved automatically (Server-Wins +
	/// Local-Preserved); `renamed_to` is the SafeRename sibling holding
	/// the preserved local content.
	fn on_conflict_resolved(&self, _path: &RelativePath, _renamed_to: &str) {}

	/// A non-fatal error occurred and was handled internally (retried or
	/// parked) — surfaced for visibility, not for the caller to act on.
	fn on_error(&self, _error: &SyncError) {}

	fn on_transfer_started(&self, _path: &RelativePath, _kind: TransferKind) {}

	fn on_transfer_complete(&self, _path: &RelativePath, _kind: TransferKind) {}

	fn on_transfer_failed(&self, _path: &RelativePath, _kind: TransferKind, _error: &SyncError) {}
}

/// Default callback implementation that does nothing.
pub struct NoCallbacks;

impl SyncCallbacks for NoCallbacks {}

/// Builder for assembling `SyncCallbacks` out of individual closures,
/// for callers (tests, a thin CLI) that don't want a full trait impl.
#[derive(Default)]
pub struct CallbackBuilder {
	progress: Option<Box<ProgressFn>>,
	conflict: Option<Box<ConflictFn>>,
	error: Option<Box<ErrorFn>>,
	transfer_started: Option<Box<TransferFn>>,
	transfer_complete: Option<Box<TransferFn>>,
	transfer_failed: Option<Box<TransferFailedFn>>,
}

impl CallbackBuilder {
	pub fn new() -> Self {
		CallbackBuilder::default()
	}

	pub fn on_progress<F>(mut self, callback: F) -> Self
	where
		F: Fn(ProgressStats) + Send + Sync + 'static,
	{
		self.progress = Some(Box::new(callback));
		self
	}

	pub fn on_conflict_resolved<F>(mut self, callback: F) -> Self
	where
		F: Fn(&RelativePath, &str) + Send + Sync + 'static,
	{
		self.conflict = Some(Box::new(callback));
		self
	}

	pub fn on_error<F>(mut self, callback: F) -> Self
	where
		F: Fn(&SyncError) + Send + Sync + 'static,
	{
		self.error = Some(Box::new(callback));
		self
	}

	pub fn on_transfer_started<F>(mut self, callback: F) -> Self
	where
		F: Fn(&RelativePath, TransferKind) + Send + Sync + 'static,
	{
		self.transfer_started = Some(Box::new(callback));
		self
	}

	pub fn on_transfer_complete<F>(mut self, callback: F) -> Self
	where
		F: Fn(&RelativePath, TransferKind) + Send + Sync + 'static,
	{
		self.transfer_complete = Some(Box::new(callback));
		self
	}

	pub fn on_transfer_failed<F>(mut self, callback: F) -> Self
	where
		F: Fn(&RelativePath, TransferKind, &SyncError) + Send + Sync + 'static,
	{
		self.transfer_failed = Some(Box::new(callback));
		self
	}

	pub fn build(self) -> Box<dyn SyncCallbacks> {
		Box::new(CompositeCallbacks {
			progress: self.progress,
			conflict: self.conflict,
			error: self.error,
			transfer_started: self.transfer_started,
			transfer_complete: self.transfer_complete,
			transfer_failed: self.transfer_failed,
		})
	}
}

struct CompositeCallbacks {
	progress: Option<Box<ProgressFn>>,
	conflict: Option<Box<ConflictFn>>,
	error: Option<Box<ErrorFn>>,
	transfer_started: Option<Box<TransferFn>>,
	transfer_complete: Option<Box<TransferFn>>,
	transfer_failed: Option<Box<TransferFailedFn>>,
}

impl SyncCallbacks for CompositeCallbacks {
	fn on_progress(&self, stats: ProgressStats) {
		if let Some(ref callback) = self.progress {
			callback(stats);
		}
	}

	fn on_conflict_resolved(&self, path: &RelativePath, renamed_to: &str) {
		if let Some(ref callback) = self.conflict {
			callback(path, renamed_to);
		}
	}

	fn on_error(&self, error: &SyncError) {
		if let Some(ref callback) = self.error {
			callback(error);
		}
	}

	fn on_transfer_started(&self, path: &RelativePath, kind: TransferKind) {
		if let Some(ref callback) = self.transfer_started {
			callback(path, kind);
		}
	}

	fn on_transfer_complete(&self, path: &RelativePath, kind: TransferKind) {
		if let Some(ref callback) = self.transfer_complete {
			callback(path, kind);
		}
	}

	fn on_transfer_failed(&self, path: &RelativePath, kind: TransferKind, error: &SyncError) {
		if let Some(ref callback) = self.transfer_failed {
			callback(path, kind, error);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	#[test]
	fn no_callbacks_is_inert() {
		let cb = NoCallbacks;
		cb.on_progress(ProgressStats {
			phase: AgentPhase::Idle,
			files_processed: 0,
			files_total: 0,
			bytes_transferred: 0,
			bytes_total: 0,
			transfer_rate: 0.0,
			elapsed: Duration::ZERO,
			eta: Duration::ZERO,
		});
	}

	#[test]
	fn builder_invokes_only_registered_hooks() {
		let completions = Arc::new(AtomicUsize::new(0));
		let completions_clone = completions.clone();

		let cb = CallbackBuilder::new()
			.on_transfer_complete(move |_path, _kind| {
				completions_clone.fetch_add(1, Ordering::SeqCst);
			})
			.build();

		let path = RelativePath::new("a.txt").unwrap();
		cb.on_transfer_complete(&path, TransferKind::Upload);
		cb.on_transfer_started(&path, TransferKind::Upload);

		assert_eq!(completions.load(Ordering::SeqCst), 1);
	}
}

// vim: ts=4
