//! DownloadWorker (spec.md §4.4): fetch metadata, resolve any pending
//! conflict, stream chunks to a temp sibling, then atomically rename in.

use std::io::Write;
use std::sync::atomic::Ordering;

use crate::chunking::{crypto, hash};
use crate::conflict::{resolve_conflict, ConflictContext, ConflictOutcome};
use crate::error::SyncError;
use crate::types::{
	derive_status, now_secs, DerivedStatus, EventMetadata, EventSource, EventType, OnDiskFacts, SyncEvent,
	SyncedFileRecord,
};

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
	let info = match ctx.runtime.block_on(ctx.remote.get_file_info(item.path.as_str()))? {
		Some(info) => info,
		None => {
			return Err(SyncError::Other { message: format!("{} no longer exists on the server", item.path) })
		}
	};

	let local_abs = ctx.sync_root.join(item.path.as_path());
	let record = ctx.state.get_record(&item.path)?;
	let disk_at_conflict_check = stat(&local_abs);
	let status = derive_status(record.as_ref(), disk_at_conflict_check);
	let local_modified = matches!(status, DerivedStatus::New | DerivedStatus::Modified);

	if local_modified {
		let conflict_ctx = ConflictContext {
			local_base_version: record.as_ref().map(|r| r.server_version),
			server_version: info.version,
			local_modified,
		};
		match resolve_conflict(&ctx.sync_root, &item.path, &conflict_ctx, &ctx.machine_id)? {
			ConflictOutcome::Resolved { renamed_to: Some(renamed) } => {
				ctx.callbacks.on_conflict_resolved(&item.path, renamed.as_str());
				let id = ctx.next_event_id.fetch_add(1, Ordering::SeqCst);
				ctx.queue.push(SyncEvent::new(
					id,
					EventType::LocalCreated,
					EventSource::Internal,
					renamed,
					EventMetadata::default(),
				));
			}
			ConflictOutcome::Resolved { renamed_to: None } | ConflictOutcome::NoConflict | ConflictOutcome::AlreadySynced => {}
			ConflictOutcome::RetryNeeded => {
				return Err(SyncError::NetworkTransient {
					message: format!("{} was saved again mid-rename, retrying", item.path),
					source: None,
				});
			}
			ConflictOutcome::Abort => {
				return Err(SyncError::Conflict(crate::error::ConflictError::Unresolvable {
					message: format!("could not find a free SafeRename sibling for {}", item.path),
				}));
			}
		}
	}

	// Re-stat after any conflict-driven rename: that rename itself makes
	// `local_abs` disappear, which must not be mistaken for a concurrent
	// edit by the post-download recheck below.
	let disk_before = stat(&local_abs);

	let mut tmp_name = local_abs.file_name().unwrap_or_default().to_os_string();
	tmp_name.push(".syncagent-tmp");
	let tmp_path = local_abs.with_file_name(tmp_name);
	if let Some(parent) = local_abs.parent() {
		std::fs::create_dir_all(parent)?;
	}
	{
		let mut tmp_file = std::fs::File::create(&tmp_path)?;
		for chunk_hash in &info.chunk_hashes {
			if item.cancel.load(Ordering::SeqCst) {
				let _ = std::fs::remove_file(&tmp_path);
				return Ok(TransferOutcome::Cancelled);
			}

			let (nonce, ciphertext) = ctx.runtime.block_on(ctx.remote.download_chunk(chunk_hash))?;
			let nonce: [u8; 12] = nonce.as_slice().try_into().map_err(|_| SyncError::Integrity {
				path: item.path.as_str().to_string(),
				expected: "12-byte nonce".to_string(),
				actual: format!("{} bytes", nonce.len()),
			})?;
			let plaintext = crypto::decrypt(&ctx.key, &nonce, &ciphertext).map_err(SyncError::Chunk)?;

			let actual_hash = hash::content_hash(&plaintext);
			if &actual_hash != chunk_hash {
				let _ = std::fs::remove_file(&tmp_path);
				return Err(SyncError::Integrity {
					path: item.path.as_str().to_string(),
					expected: chunk_hash.clone(),
					actual: actual_hash,
				});
			}
			ctx.chunk_cache.mark_present(chunk_hash);

			tmp_file.write_all(&plaintext)?;
		}
	}

	let disk_after = stat(&local_abs);
	if facts_changed(disk_before, disk_after) {
		let _ = std::fs::remove_file(&tmp_path);
		return Err(SyncError::NetworkTransient {
			message: format!("{} was modified locally during download, retrying", item.path),
			source: None,
		});
	}

	std::fs::rename(&tmp_path, &local_abs)?;
	let final_meta = std::fs::metadata(&local_abs)?;
	let final_mtime = final_meta
		.modified()
		.ok()
		.and_then(|m| m.duration_since(std::time::UNIX_EPOCH).ok())
		.map(|d| d.as_secs_f64())
		.unwrap_or_else(now_secs);

	ctx.state.put_record(&SyncedFileRecord {
		path: item.path.clone(),
		local_mtime: final_mtime,
		local_size: final_meta.len(),
		server_version: info.version,
		chunk_hashes: info.chunk_hashes,
		synced_at: now_secs(),
	})?;

	Ok(TransferOutcome::Completed)
}

fn stat(path: &std::path::Path) -> Option<OnDiskFacts> {
	std::fs::metadata(path).ok().map(|m| OnDiskFacts {
		exists: true,
		mtime: m
			.modified()
			.ok()
			.and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
			.map(|d| d.as_secs_f64())
			.unwrap_or(0.0),
		size: m.len(),
	})
}

fn facts_changed(before: Option<OnDiskFacts>, after: Option<OnDiskFacts>) -> bool {
	match (before, after) {
		(None, None) => false,
		(Some(a), Some(b)) => (a.mtime - b.mtime).abs() > f64::EPSILON || a.size != b.size,
		_ => true,
	}
}

// vim: ts=4
