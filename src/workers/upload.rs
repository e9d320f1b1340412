//! UploadWorker (spec.md §4.4): chunk, dedup-check, upload, commit.

use std::collections::HashSet;
use std::sync::atomic::Ordering;

use crate::chunking::{cdc, crypto, hash};
use crate::conflict::{resolve_conflict, ConflictContext, ConflictOutcome};
use crate::error::SyncError;
use crate::types::{now_secs, EventMetadata, EventSource, EventType, SyncEvent, SyncedFileRecord, UploadProgress};

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
	let data = std::fs::read(&local_abs)?;
	let meta = std::fs::metadata(&local_abs)?;

	let raw_chunks = cdc::split(&data, &ctx.cdc)?;
	let fresh_hashes: Vec<String> = raw_chunks.iter().map(|c| hash::content_hash(&c.data)).collect();

	let existing_progress = ctx.state.get_upload_progress(&item.path)?;
	let mut uploaded: HashSet<String> = match &existing_progress {
		Some(p) if p.expected_chunk_hashes == fresh_hashes => p.uploaded_chunk_hashes.iter().cloned().collect(),
		Some(_) => {
			ctx.state.delete_upload_progress(&item.path)?;
			HashSet::new()
		}
		None => HashSet::new(),
	};
	let started_at = existing_progress.as_ref().map(|p| p.started_at).unwrap_or_else(now_secs);

	if let Some(parent_version) = item.event.metadata.parent_version {
		if let Some(info) = ctx.runtime.block_on(ctx.remote.get_file_info(item.path.as_str()))? {
			if info.version != parent_version {
				return handle_conflict(ctx, item, info.version, &fresh_hashes, meta.len());
			}
		}
	}

	for (raw, hash_hex) in raw_chunks.iter().zip(fresh_hashes.iter()) {
		if item.cancel.load(Ordering::SeqCst) {
			return Ok(TransferOutcome::Cancelled);
		}
		if uploaded.contains(hash_hex) {
			continue;
		}

		if !ctx.chunk_cache.is_present(hash_hex) {
			if ctx.runtime.block_on(ctx.remote.has_chunk(hash_hex))? {
				ctx.chunk_cache.mark_present(hash_hex);
			} else {
				let encrypted = crypto::encrypt(&ctx.key, &raw.data)?;
				ctx.runtime.block_on(ctx.remote.upload_chunk(hash_hex, &encrypted.nonce, &encrypted.ciphertext))?;
				ctx.chunk_cache.mark_present(hash_hex);
			}
		}

		uploaded.insert(hash_hex.clone());
		ctx.state.put_upload_progress(&UploadProgress {
			path: item.path.clone(),
			expected_chunk_hashes: fresh_hashes.clone(),
			uploaded_chunk_hashes: uploaded.iter().cloned().collect(),
			started_at,
		})?;
	}

	if item.cancel.load(Ordering::SeqCst) {
		return Ok(TransferOutcome::Cancelled);
	}

	let base_version = item.event.metadata.parent_version;
	match ctx.runtime.block_on(ctx.remote.commit_file(item.path.as_str(), &fresh_hashes, meta.len(), base_version)) {
		Ok(version) => {
			ctx.state.put_record(&SyncedFileRecord {
				path: item.path.clone(),
				local_mtime: item.event.metadata.mtime.unwrap_or_else(now_secs),
				local_size: meta.len(),
				server_version: version,
				chunk_hashes: fresh_hashes,
				synced_at: now_secs(),
			})?;
			ctx.state.delete_upload_progress(&item.path)?;
			Ok(TransferOutcome::Completed)
		}
		Err(SyncError::VersionConflict { current_version, .. }) => {
			handle_conflict(ctx, item, current_version, &fresh_hashes, meta.len())
		}
		Err(e) => Err(e),
	}
}

/// Upload conflict resolution (spec.md §4.5): compare the freshly computed
/// chunk list against what the server currently has. Identical -> the
/// server already has this content under a version we didn't know about
/// (`ALREADY_SYNCED`); otherwise SafeRename the local file aside, queue it
/// for its own upload under the new name, and download the server's
/// content into the original path.
///
/// If the server has no record of the path at all (it was soft-deleted
/// concurrently, spec.md §8 S6), there is nothing to diff against or
/// download: treat this as "create fresh" and commit with no base
/// version, same as a brand-new file.
fn handle_conflict(
	ctx: &WorkerContext,
	item: &WorkItem,
	server_version: u64,
	fresh_hashes: &[String],
	local_size: u64,
) -> Result<TransferOutcome, SyncError> {
	let remote_info = match ctx.runtime.block_on(ctx.remote.get_file_info(item.path.as_str()))? {
		Some(info) => info,
		None => return create_fresh(ctx, item, fresh_hashes, local_size),
	};

	let hash_outcome =
		if remote_info.chunk_hashes == fresh_hashes { ConflictOutcome::AlreadySynced } else { ConflictOutcome::NoConflict };

	if matches!(hash_outcome, ConflictOutcome::AlreadySynced) {
		ctx.state.put_record(&SyncedFileRecord {
			path: item.path.clone(),
			local_mtime: item.event.metadata.mtime.unwrap_or_else(now_secs),
			local_size,
			server_version: remote_info.version,
			chunk_hashes: fresh_hashes.to_vec(),
			synced_at: now_secs(),
		})?;
		ctx.state.delete_upload_progress(&item.path)?;
		return Ok(TransferOutcome::Completed);
	}

	let conflict_ctx =
		ConflictContext { local_base_version: item.event.metadata.parent_version, server_version, local_modified: true };
	match resolve_conflict(&ctx.sync_root, &item.path, &conflict_ctx, &ctx.machine_id)? {
		ConflictOutcome::Resolved { renamed_to: Some(renamed) } => {
			ctx.callbacks.on_conflict_resolved(&item.path, renamed.as_str());
			let id = ctx.next_event_id.fetch_add(1, Ordering::SeqCst);
			ctx.queue.push(SyncEvent::new(id, EventType::LocalCreated, EventSource::Internal, renamed, EventMetadata::default()));
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

	let download_event = SyncEvent::new(
		ctx.next_event_id.fetch_add(1, Ordering::SeqCst),
		EventType::RemoteModified,
		EventSource::Internal,
		item.path.clone(),
		EventMetadata::default(),
	);
	let download_item =
		super::pool::WorkItem { path: item.path.clone(), kind: crate::types::TransferKind::Download, event: download_event, cancel: item.cancel.clone() };
	super::download::run(ctx, &download_item);

	ctx.state.delete_upload_progress(&item.path)?;
	Ok(TransferOutcome::Conflict)
}

/// Re-create a path the server no longer has any record of, committing
/// with `base_version: None` exactly as for a first-time upload.
fn create_fresh(
	ctx: &WorkerContext,
	item: &WorkItem,
	fresh_hashes: &[String],
	local_size: u64,
) -> Result<TransferOutcome, SyncError> {
	let version = ctx.runtime.block_on(ctx.remote.commit_file(item.path.as_str(), fresh_hashes, local_size, None))?;
	ctx.state.put_record(&SyncedFileRecord {
		path: item.path.clone(),
		local_mtime: item.event.metadata.mtime.unwrap_or_else(now_secs),
		local_size,
		server_version: version,
		chunk_hashes: fresh_hashes.to_vec(),
		synced_at: now_secs(),
	})?;
	ctx.state.delete_upload_progress(&item.path)?;
	Ok(TransferOutcome::Completed)
}

// vim: ts=4
