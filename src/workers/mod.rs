//! Thread-per-worker transfer execution (spec.md §4.4): a fixed pool of
//! OS threads, each running one `Transfer` at a time to completion,
//! blocking on local I/O and on the `RemoteApi` (invoked synchronously
//! via a small dedicated tokio runtime — see `pool::WorkerContext`).

pub mod delete;
pub mod download;
pub mod pool;
pub mod upload;

pub use pool::{WorkItem, WorkerContext, WorkerPool};

use crate::error::SyncError;

/// Terminal result of one worker running one `Transfer` to completion.
#[derive(Debug)]
pub enum TransferOutcome {
	Completed,
	Cancelled,
	Failed { retryable: bool, error: SyncError },
	/// A conflict was detected and already resolved (SafeRename performed,
	/// server content downloaded); not a failure.
	Conflict,
}

// vim: ts=4
