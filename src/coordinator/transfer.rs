//! Live transfer bookkeeping: at most one active `Transfer` per path, plus
//! the cancel flag a worker polls between chunks (spec.md §4.3/§4.4).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::types::{RelativePath, Transfer, TransferKind, TransferStatus};

struct ActiveTransfer {
	transfer: Transfer,
	cancel: Arc<AtomicBool>,
}

/// Table of transfers currently in flight, indexed by path. Cheap to
/// clone (an `Arc` around a mutex) so it can be shared between the
/// coordinator thread and every worker.
#[derive(Clone)]
pub struct TransferTable {
	inner: Arc<Mutex<HashMap<RelativePath, ActiveTransfer>>>,
}

impl TransferTable {
	pub fn new() -> Self {
		TransferTable { inner: Arc::new(Mutex::new(HashMap::new())) }
	}

	/// The kind of transfer currently active on `path`, if any.
	pub fn active_kind(&self, path: &RelativePath) -> Option<TransferKind> {
		self.inner.lock().expect("transfer table lock poisoned").get(path).map(|a| a.transfer.kind)
	}

	/// Register a new transfer for `path` and return the cancel handle the
	/// worker should poll. Overwrites any existing entry for the path —
	/// callers are responsible for only doing this when the matrix says
	/// there is no active transfer, or after `finish` has cleared one.
	pub fn start(&self, path: RelativePath, kind: TransferKind, base_version: Option<u64>) -> Arc<AtomicBool> {
		let cancel = Arc::new(AtomicBool::new(false));
		let transfer = Transfer {
			path: path.clone(),
			kind,
			status: TransferStatus::Pending,
			base_version,
			detected_server_version: None,
			has_conflict: false,
		};
		self.inner.lock().expect("transfer table lock poisoned").insert(path, ActiveTransfer { transfer, cancel: cancel.clone() });
		cancel
	}

	pub fn mark_in_progress(&self, path: &RelativePath) {
		if let Some(active) = self.inner.lock().expect("transfer table lock poisoned").get_mut(path) {
			active.transfer.status = TransferStatus::InProgress;
		}
	}

	/// Request cancellation of the transfer active on `path`, if any.
	/// Idempotent, and a no-op if nothing is active.
	pub fn cancel(&self, path: &RelativePath) {
		if let Some(active) = self.inner.lock().expect("transfer table lock poisoned").get(path) {
			active.cancel.store(true, Ordering::SeqCst);
		}
	}

	/// Remove the (necessarily terminal) transfer for `path`.
	pub fn finish(&self, path: &RelativePath) {
		self.inner.lock().expect("transfer table lock poisoned").remove(path);
	}

	pub fn len(&self) -> usize {
		self.inner.lock().expect("transfer table lock poisoned").len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl Default for TransferTable {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fresh_table_has_no_active_transfer() {
		let table = TransferTable::new();
		assert!(table.active_kind(&RelativePath::new("a.txt").unwrap()).is_none());
	}

	#[test]
	fn start_registers_kind_and_finish_clears_it() {
		let table = TransferTable::new();
		let path = RelativePath::new("a.txt").unwrap();
		table.start(path.clone(), TransferKind::Upload, None);

		assert_eq!(table.active_kind(&path), Some(TransferKind::Upload));
		table.finish(&path);
		assert!(table.active_kind(&path).is_none());
	}

	#[test]
	fn cancel_sets_the_flag_the_worker_observes() {
		let table = TransferTable::new();
		let path = RelativePath::new("a.txt").unwrap();
		let cancel = table.start(path.clone(), TransferKind::Download, None);

		assert!(!cancel.load(Ordering::SeqCst));
		table.cancel(&path);
		assert!(cancel.load(Ordering::SeqCst));
	}

	#[test]
	fn cancel_on_unknown_path_is_a_no_op() {
		let table = TransferTable::new();
		table.cancel(&RelativePath::new("nope.txt").unwrap());
	}
}

// vim: ts=4
