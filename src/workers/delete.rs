//! DeleteWorker (spec.md §4.4): idempotent local removal plus a remote
//! soft-delete call, then erase the local record.

use crate::error::SyncError;

use super::pool::{WorkItem, WorkerContext};
use super::TransferOutcome;

pub fn run(ctx: &WorkerContext, item: &WorkItem) -> TransferOutcome {
	match run_inner(ctx, item) {
		Ok(outcome) => outcome,
		Err(error) => {
			let retryable = error.is_retryable();
			TransferOutcome::Failed { retryable, error }
		}
	}
}

fn run_inner(ctx: &WorkerContext, item: &WorkItem) -> Result<TransferOutcome, SyncError> {
	let local_abs = ctx.sync_root.join(item.path.as_path());
	match std::fs::remove_file(&local_abs) {
		Ok(()) => {}
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
		Err(e) => return Err(SyncError::from(e)),
	}

	let record = ctx.state.get_record(&item.path)?;
	let base_version = record.as_ref().map(|r| r.server_version).unwrap_or(0);

	ctx.runtime.block_on(ctx.remote.delete_file(item.path.as_str(), base_version))?;
	ctx.state.delete_record(&item.path)?;
	ctx.state.delete_upload_progress(&item.path)?;

	Ok(TransferOutcome::Completed)
}

#[cfg(test)]
mod tests {
	// DeleteWorker needs a live RemoteApi + tokio runtime to exercise
	// end-to-end; covered by the integration tests in `tests/` rather
	// than a unit test here.
}

// vim: ts=4
